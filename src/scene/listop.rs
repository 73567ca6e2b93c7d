//! List-editing operations for string lists.
//!
//! The `clipSets` field on a prim is not a plain list but a list op: each
//! layer can add, remove, or reorder entries relative to the result
//! composed from weaker layers, or replace the list outright.

/// A list-editing operation over strings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringListOp {
    explicit_items: Option<Vec<String>>,
    added_items: Vec<String>,
    deleted_items: Vec<String>,
    ordered_items: Vec<String>,
}

impl StringListOp {
    /// Create an explicit list op that replaces any weaker result.
    pub fn explicit(items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            explicit_items: Some(items.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Create a list op that only adds items.
    pub fn with_added(items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            added_items: items.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn set_explicit_items(&mut self, items: Vec<String>) {
        self.explicit_items = Some(items);
    }

    pub fn set_added_items(&mut self, items: Vec<String>) {
        self.added_items = items;
    }

    pub fn set_deleted_items(&mut self, items: Vec<String>) {
        self.deleted_items = items;
    }

    pub fn set_ordered_items(&mut self, items: Vec<String>) {
        self.ordered_items = items;
    }

    /// Check whether this op performs no edits at all.
    pub fn is_empty(&self) -> bool {
        self.explicit_items.is_none()
            && self.added_items.is_empty()
            && self.deleted_items.is_empty()
            && self.ordered_items.is_empty()
    }

    /// Apply this op to a composed list.
    ///
    /// Explicit items replace the list wholesale. Otherwise deleted items
    /// are removed, added items are appended (skipping ones already
    /// present), and ordered items are moved to the front in their stated
    /// relative order.
    pub fn apply_operations(&self, items: &mut Vec<String>) {
        if let Some(explicit) = &self.explicit_items {
            *items = explicit.clone();
            return;
        }

        items.retain(|item| !self.deleted_items.contains(item));

        for added in &self.added_items {
            if !items.contains(added) {
                items.push(added.clone());
            }
        }

        if !self.ordered_items.is_empty() {
            let mut reordered = Vec::with_capacity(items.len());
            for ordered in &self.ordered_items {
                if let Some(pos) = items.iter().position(|item| item == ordered) {
                    reordered.push(items.remove(pos));
                }
            }
            reordered.append(items);
            *items = reordered;
        }
    }
}
