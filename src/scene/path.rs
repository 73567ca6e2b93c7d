//! Scene paths.
//!
//! A [`ScenePath`] is an absolute hierarchical path identifying either a
//! prim (`/World/Char`) or a property on a prim (`/World/Char.points`).
//! Paths are the addressing scheme for the layer field store and for clip
//! time-sample queries.

use std::fmt;

use crate::util::{Error, Result};

/// An absolute prim or property path.
///
/// Stored in normalized string form. Prim names are identifiers
/// (alphanumeric plus `_`); property names additionally allow `:` for
/// namespaced attributes. The absolute root path `/` is neither a prim
/// nor a property path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenePath {
    path: String,
}

fn is_prim_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

fn is_property_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

impl ScenePath {
    /// The absolute root path `/`.
    pub fn absolute_root() -> Self {
        Self { path: "/".to_string() }
    }

    /// Parse an absolute path string.
    ///
    /// Accepts `/`, `/A/B` and `/A/B.prop` forms. Anything else is an
    /// [`Error::InvalidPath`].
    pub fn parse(s: &str) -> Result<Self> {
        if s == "/" {
            return Ok(Self::absolute_root());
        }

        let Some(body) = s.strip_prefix('/') else {
            return Err(Error::InvalidPath(s.to_string()));
        };

        let (prim_part, property) = match body.split_once('.') {
            Some((prim, prop)) => (prim, Some(prop)),
            None => (body, None),
        };

        if prim_part.is_empty() || !prim_part.split('/').all(is_prim_name) {
            return Err(Error::InvalidPath(s.to_string()));
        }
        if let Some(prop) = property {
            if !is_property_name(prop) {
                return Err(Error::InvalidPath(s.to_string()));
            }
        }

        Ok(Self { path: s.to_string() })
    }

    /// Get the path as a string.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Check if this is the absolute root path.
    pub fn is_absolute_root(&self) -> bool {
        self.path == "/"
    }

    /// Check if this path identifies a prim.
    pub fn is_prim_path(&self) -> bool {
        !self.is_absolute_root() && !self.path.contains('.')
    }

    /// Check if this path identifies a property.
    pub fn is_property_path(&self) -> bool {
        self.path.contains('.')
    }

    /// Get the prim portion of the path (self for prim paths).
    pub fn prim_path(&self) -> ScenePath {
        match self.path.split_once('.') {
            Some((prim, _)) => Self { path: prim.to_string() },
            None => self.clone(),
        }
    }

    /// Get the property name, if this is a property path.
    pub fn property_name(&self) -> Option<&str> {
        self.path.split_once('.').map(|(_, prop)| prop)
    }

    /// Append a child prim name.
    pub fn append_child(&self, name: &str) -> Result<ScenePath> {
        if !is_prim_name(name) || self.is_property_path() {
            return Err(Error::InvalidPath(format!("{}/{}", self.path, name)));
        }
        let path = if self.is_absolute_root() {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.path, name)
        };
        Ok(Self { path })
    }

    /// Append a property name.
    pub fn append_property(&self, name: &str) -> Result<ScenePath> {
        if !is_property_name(name) || !self.is_prim_path() {
            return Err(Error::InvalidPath(format!("{}.{}", self.path, name)));
        }
        Ok(Self { path: format!("{}.{}", self.path, name) })
    }

    /// Replace a prefix of this path.
    ///
    /// If `old_prefix` is a prefix of this path (on a prim boundary), the
    /// matched portion is replaced with `new_prefix`; otherwise the path
    /// is returned unchanged. Used to translate query paths from the
    /// composed prim's namespace into a clip's own namespace.
    pub fn replace_prefix(&self, old_prefix: &ScenePath, new_prefix: &ScenePath) -> ScenePath {
        if old_prefix.is_absolute_root() {
            return self.clone();
        }
        if self.path == old_prefix.path {
            return new_prefix.clone();
        }
        if let Some(rest) = self.path.strip_prefix(&old_prefix.path) {
            if rest.starts_with('/') || rest.starts_with('.') {
                return ScenePath { path: format!("{}{}", new_prefix.path, rest) };
            }
        }
        self.clone()
    }
}

impl fmt::Display for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl fmt::Debug for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScenePath({})", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prim_path() {
        let p = ScenePath::parse("/World/Char").unwrap();
        assert!(p.is_prim_path());
        assert!(!p.is_property_path());
        assert_eq!(p.as_str(), "/World/Char");
    }

    #[test]
    fn test_parse_property_path() {
        let p = ScenePath::parse("/World/Char.points").unwrap();
        assert!(p.is_property_path());
        assert!(!p.is_prim_path());
        assert_eq!(p.property_name(), Some("points"));
        assert_eq!(p.prim_path().as_str(), "/World/Char");
    }

    #[test]
    fn test_parse_rejects_relative_and_malformed() {
        assert!(ScenePath::parse("relative").is_err());
        assert!(ScenePath::parse("/").is_ok());
        assert!(ScenePath::parse("//double").is_err());
        assert!(ScenePath::parse("/trailing/").is_err());
        assert!(ScenePath::parse("/a.b.c").is_err());
        assert!(ScenePath::parse("/1leading").is_err());
    }

    #[test]
    fn test_root_is_neither_prim_nor_property() {
        let root = ScenePath::absolute_root();
        assert!(root.is_absolute_root());
        assert!(!root.is_prim_path());
        assert!(!root.is_property_path());
    }

    #[test]
    fn test_append() {
        let p = ScenePath::absolute_root().append_child("World").unwrap();
        let p = p.append_child("Char").unwrap();
        let attr = p.append_property("xformOp:translate").unwrap();
        assert_eq!(attr.as_str(), "/World/Char.xformOp:translate");
        assert!(attr.append_child("Nope").is_err());
    }

    #[test]
    fn test_replace_prefix() {
        let query = ScenePath::parse("/World/Char.points").unwrap();
        let old = ScenePath::parse("/World/Char").unwrap();
        let new = ScenePath::parse("/Char").unwrap();
        assert_eq!(query.replace_prefix(&old, &new).as_str(), "/Char.points");

        // Non-boundary prefixes are not replaced
        let other = ScenePath::parse("/World/Character").unwrap();
        assert_eq!(other.replace_prefix(&old, &new).as_str(), "/World/Character");

        // Exact match replaces wholly
        assert_eq!(old.replace_prefix(&old, &new).as_str(), "/Char");
    }
}
