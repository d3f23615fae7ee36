//! Heading anchors: GitHub-style slugs, deduplicated per guide.

use std::collections::HashSet;

use docbundle_shared::Anchor;

/// Fallback slug for headings with no usable characters (e.g. `## ???`).
pub const EMPTY_SLUG: &str = "section";

/// Turn heading text into a link-safe slug.
///
/// Lowercases, keeps alphanumerics, `-` and `_`, turns whitespace into `-`
/// and drops everything else.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() {
            slug.push('-');
        }
    }

    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}

/// Whether `id` can be used verbatim as an explicit `{#id}` anchor.
pub fn is_valid_anchor(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Anchors already handed out within one guide.
#[derive(Debug, Default)]
pub struct AnchorSet {
    used: HashSet<String>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `base`, or the first free `base-N` (N = 1, 2, ...) if taken.
    pub fn claim(&mut self, base: &str) -> Anchor {
        if self.used.insert(base.to_string()) {
            return Anchor(base.to_string());
        }

        let mut n = 1usize;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return Anchor(candidate);
            }
            n += 1;
        }
    }

    pub fn contains(&self, anchor: &str) -> bool {
        self.used.contains(anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_matches_github_style() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("ref.watch vs ref.read"), "refwatch-vs-refread");
        assert_eq!(slugify("Chapter 3: Functions"), "chapter-3-functions");
        assert_eq!(slugify("  StateNotifier_Provider  "), "statenotifier_provider");
        assert_eq!(slugify("switchMap() & mergeMap()"), "switchmap--mergemap");
    }

    #[test]
    fn slugify_empty_falls_back() {
        assert_eq!(slugify("???"), EMPTY_SLUG);
        assert_eq!(slugify(""), EMPTY_SLUG);
    }

    #[test]
    fn slugify_keeps_unicode_letters() {
        assert_eq!(slugify("Café Über"), "café-über");
    }

    #[test]
    fn anchor_set_deduplicates_with_suffixes() {
        let mut set = AnchorSet::new();
        assert_eq!(set.claim("setup").as_str(), "setup");
        assert_eq!(set.claim("setup").as_str(), "setup-1");
        assert_eq!(set.claim("setup").as_str(), "setup-2");
        assert_eq!(set.claim("testing").as_str(), "testing");
        assert!(set.contains("setup-2"));
    }

    #[test]
    fn anchor_set_skips_suffixes_already_taken() {
        let mut set = AnchorSet::new();
        set.claim("setup-1");
        set.claim("setup");
        assert_eq!(set.claim("setup").as_str(), "setup-2");
    }

    #[test]
    fn explicit_anchor_validation() {
        assert!(is_valid_anchor("async-value"));
        assert!(is_valid_anchor("step_2"));
        assert!(!is_valid_anchor("has space"));
        assert!(!is_valid_anchor(""));
    }
}
