//! Template clip derivation.
//!
//! Expands a template asset path such as `frames/clip.###.usd` or
//! `frames/clip.###.###.usd` over a `[start, end]` range at a fixed
//! stride into literal asset paths plus matching `times` and `active`
//! tables. Frames whose files do not resolve are skipped; sparse frame
//! sequences are normal, not an error.

use glam::DVec2;
use tracing::{debug, warn};

use crate::scene::{AssetResolver, Layer, ScenePath, ScopedResolverCache};
use crate::util::TimeCode;

/// Clip tables derived from a template asset path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivedClipInfo {
    pub asset_paths: Vec<String>,
    pub times: Vec<DVec2>,
    pub active: Vec<DVec2>,
}

struct ClipTimeString {
    integer_portion: String,
    decimal_portion: String,
}

fn derive_clip_time_string(
    clip_time: f64,
    num_integer_hashes: usize,
    num_decimal_hashes: usize,
) -> ClipTimeString {
    let integer_portion = format!("{:0width$}", clip_time as i64, width = num_integer_hashes);

    // Subframe specification, such as foo.###.###.usd; anything beyond
    // the requested precision is trimmed.
    let decimal_portion = if num_decimal_hashes != 0 {
        let formatted = format!("{:.prec$}", clip_time, prec = num_decimal_hashes);
        formatted
            .split_once('.')
            .map(|(_, frac)| frac.to_string())
            .unwrap_or_default()
    } else {
        String::new()
    };

    ClipTimeString {
        integer_portion,
        decimal_portion,
    }
}

/// Parsed hash groups of a template basename.
struct TemplatePattern {
    tokens: Vec<String>,
    integer_section: usize,
    decimal_section: Option<usize>,
    num_integer_hashes: usize,
    num_decimal_hashes: usize,
}

fn parse_template_pattern(basename: &str) -> Option<TemplatePattern> {
    let tokens: Vec<String> = basename
        .split('.')
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    let mut integer_section = None;
    let mut decimal_section = None;
    let mut num_integer_hashes = 0;
    let mut num_decimal_hashes = 0;
    let mut matching_groups = 0;

    // The hash groups denote how much padding the template requests.
    for (index, token) in tokens.iter().enumerate() {
        if token.chars().all(|c| c == '#') {
            if integer_section.is_none() {
                num_integer_hashes = token.len();
                integer_section = Some(index);
            } else {
                num_decimal_hashes = token.len();
                decimal_section = Some(index);
            }
            matching_groups += 1;
        }
    }

    let integer_section = integer_section?;
    let contiguous = match decimal_section {
        Some(d) => integer_section + 1 == d,
        None => true,
    };
    if matching_groups > 2 || !contiguous {
        return None;
    }

    Some(TemplatePattern {
        tokens,
        integer_section,
        decimal_section,
        num_integer_hashes,
        num_decimal_hashes,
    })
}

/// Derive literal clip tables from template metadata.
///
/// Returns `None` (after a warning) when the template fields are
/// malformed. An empty result is not an error; it means no frame in the
/// range resolved to an existing asset.
#[allow(clippy::too_many_arguments)]
pub fn derive_clip_info(
    template_asset_path: &str,
    stride: f64,
    active_offset: Option<f64>,
    start_time: TimeCode,
    end_time: TimeCode,
    anchor_layer: &Layer,
    resolver: &dyn AssetResolver,
    prim_path: &ScenePath,
) -> Option<DerivedClipInfo> {
    if stride <= 0.0 {
        warn!(
            "Invalid clipTemplateStride {} for prim <{}>. \
             clipTemplateStride must be greater than 0.",
            stride, prim_path
        );
        return None;
    }

    if let Some(offset) = active_offset {
        if offset.abs() > stride {
            warn!(
                "Invalid clipTemplateActiveOffset {} for prim <{}>. \
                 absolute value of clipTemplateActiveOffset must not \
                 exceed clipTemplateStride {}.",
                offset, prim_path, stride
            );
            return None;
        }
    }

    let (dir, basename) = match template_asset_path.rsplit_once('/') {
        Some((dir, base)) => (format!("{dir}/"), base),
        None => (String::new(), template_asset_path),
    };

    let Some(mut pattern) = parse_template_pattern(basename) else {
        warn!(
            "Invalid template string specified {}, must be of the form \
             path/basename.###.usd or path/basename.###.###.usd. Note \
             that the number of hash marks is variable in each group.",
            template_asset_path
        );
        return None;
    };

    if start_time > end_time {
        warn!(
            "Invalid range specified in template clip metadata. \
             clipTemplateStartTime ({}) cannot be greater than \
             clipTemplateEndTime ({}).",
            start_time, end_time
        );
        return None;
    }

    let mut derived = DerivedClipInfo::default();
    let cache = ScopedResolverCache::new(resolver);
    let anchor = anchor_layer.identifier();

    // Times are promoted into the integer range so that incrementing by
    // a fractional stride stays consistent across the whole range.
    const PROMOTION: f64 = 10000.0;
    let mut clip_active_index = 0usize;

    // With an active offset, a knot goes on the front so queries at
    // (first sample - offset) still map into the clip range.
    if let Some(offset) = active_offset {
        let clip_time = (start_time * PROMOTION - offset.abs() * PROMOTION) / PROMOTION;
        derived.times.push(DVec2::new(clip_time, clip_time));
    }

    let mut t = start_time * PROMOTION;
    let end = end_time * PROMOTION;
    let step = stride * PROMOTION;
    while t <= end {
        let clip_time = t / PROMOTION;
        let time_string = derive_clip_time_string(
            clip_time,
            pattern.num_integer_hashes,
            pattern.num_decimal_hashes,
        );
        pattern.tokens[pattern.integer_section] = time_string.integer_portion;
        if let Some(decimal_section) = pattern.decimal_section {
            if !time_string.decimal_portion.is_empty() {
                pattern.tokens[decimal_section] = time_string.decimal_portion;
            }
        }

        let file_path = format!("{}{}", dir, pattern.tokens.join("."));
        if cache.resolve(anchor, &file_path).is_some() {
            derived.asset_paths.push(file_path);
            derived.times.push(DVec2::new(clip_time, clip_time));
            let active_time = match active_offset {
                Some(offset) => (t + offset * PROMOTION) / PROMOTION,
                None => clip_time,
            };
            derived
                .active
                .push(DVec2::new(active_time, clip_active_index as f64));
            clip_active_index += 1;
        }

        t += step;
    }

    // Matching knot on the back for (last sample + offset).
    if let Some(offset) = active_offset {
        let clip_time = (end_time * PROMOTION + offset.abs() * PROMOTION) / PROMOTION;
        derived.times.push(DVec2::new(clip_time, clip_time));
    }

    debug!(
        "clipAssetPaths for prim <{}> derived: {:?}",
        prim_path, derived.asset_paths
    );
    debug!(
        "clipTimes for prim <{}> derived: {:?}",
        prim_path, derived.times
    );
    debug!(
        "clipActive for prim <{}> derived: {:?}",
        prim_path, derived.active
    );

    Some(derived)
}
