//! Incremental rebuilds: what changed since the previous build.
//!
//! Guides are compared by slug against the `manifest.json` left by the last
//! build, using the content hash of their source.

use std::collections::{HashMap, HashSet};

use docbundle_shared::{Bundle, BundleManifest, GuideRecord};

/// Guides grouped by change status, by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuideDiff {
    /// Guides not in the previous build.
    pub added: Vec<String>,
    /// Guides whose source hash changed.
    pub changed: Vec<String>,
    /// Guides with an identical source hash.
    pub unchanged: Vec<String>,
    /// Guides in the previous build but not in this one.
    pub removed: Vec<String>,
}

impl GuideDiff {
    /// Whether anything differs from the previous build.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.changed.is_empty() || !self.removed.is_empty()
    }
}

/// Diff the current bundle against the previous manifest.
///
/// Without a previous manifest every guide counts as added.
pub fn diff_guides(previous: Option<&BundleManifest>, bundle: &Bundle) -> GuideDiff {
    let old: &[GuideRecord] = previous.map(|m| m.guides.as_slice()).unwrap_or_default();
    let old_by_slug: HashMap<&str, &GuideRecord> =
        old.iter().map(|g| (g.slug.as_str(), g)).collect();
    let current: HashSet<&str> = bundle.guides.iter().map(|g| g.slug.as_str()).collect();

    let mut diff = GuideDiff::default();

    for guide in &bundle.guides {
        match old_by_slug.get(guide.slug.as_str()) {
            Some(prev) if prev.content_hash == guide.content_hash => {
                diff.unchanged.push(guide.slug.clone());
            }
            Some(_) => diff.changed.push(guide.slug.clone()),
            None => diff.added.push(guide.slug.clone()),
        }
    }

    for record in old {
        if !current.contains(record.slug.as_str()) {
            diff.removed.push(record.slug.clone());
        }
    }

    diff
}
