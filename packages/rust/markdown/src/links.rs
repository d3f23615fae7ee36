//! Inline link extraction and rewriting for prose blocks.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// File extensions that make a relative link point at another guide.
const GUIDE_EXTENSIONS: [&str; 4] = [".md", ".markdown", ".html", ".htm"];

/// Matches `[text](href)` and `[text](href "title")`.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]]*)\]\(\s*([^)\s]+)(\s+"[^"]*")?\s*\)"#).expect("valid regex")
});

/// Matches inline code spans so links inside them are ignored.
static CODE_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`+[^`]*`+").expect("valid regex"));

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// `#anchor` within the same guide.
    Anchor(String),
    /// Another guide: `rxjs.md` or `rxjs.md#operators`.
    Guide { file: String, anchor: Option<String> },
    /// Absolute URL (`https:`, `mailto:`, ...).
    External,
    /// Any other relative target (images, assets).
    Other,
}

/// An inline link found in prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub href: String,
    pub target: LinkTarget,
}

/// Classify a link destination.
pub fn classify(href: &str) -> LinkTarget {
    if let Some(anchor) = href.strip_prefix('#') {
        return LinkTarget::Anchor(anchor.to_string());
    }

    if Url::parse(href).is_ok() {
        return LinkTarget::External;
    }

    let (path, anchor) = match href.split_once('#') {
        Some((path, anchor)) => (path, Some(anchor.to_string())),
        None => (href, None),
    };

    let lower = path.to_ascii_lowercase();
    if GUIDE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        let file = path.trim_start_matches("./").to_string();
        return LinkTarget::Guide {
            file,
            anchor: anchor.filter(|a| !a.is_empty()),
        };
    }

    LinkTarget::Other
}

/// All inline links in a prose block, images excluded.
pub fn extract_links(md: &str) -> Vec<Link> {
    let scrubbed = blank_code_spans(md);

    LINK_RE
        .captures_iter(&scrubbed)
        .filter(|caps| !is_image(&scrubbed, caps))
        .map(|caps| link_from(md, &caps))
        .collect()
}

/// Rewrite link destinations through `rewrite`.
///
/// Returning `None` leaves the link unchanged. Images and links inside code
/// spans are never passed to the callback.
pub fn rewrite_links(md: &str, rewrite: impl Fn(&Link) -> Option<String>) -> String {
    let scrubbed = blank_code_spans(md);
    let mut result = String::with_capacity(md.len());
    let mut last = 0;

    for caps in LINK_RE.captures_iter(&scrubbed) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if is_image(&scrubbed, &caps) {
            continue;
        }

        let link = link_from(md, &caps);

        if let Some(new_href) = rewrite(&link) {
            let title = caps.get(3).map(|m| &md[m.range()]).unwrap_or("");
            result.push_str(&md[last..whole.start()]);
            result.push_str(&format!("[{}]({new_href}{title})", link.text));
            last = whole.end();
        }
    }

    result.push_str(&md[last..]);
    result
}

/// Build a link from a match against the scrubbed text, reading the
/// captured ranges from the original so code spans in link text survive.
fn link_from(md: &str, caps: &Captures<'_>) -> Link {
    let group = |i: usize| caps.get(i).map(|m| md[m.range()].to_string()).unwrap_or_default();
    let href = group(2);
    Link {
        text: group(1),
        target: classify(&href),
        href,
    }
}

/// Whether the match is an image `![alt](src)`.
fn is_image(md: &str, caps: &Captures<'_>) -> bool {
    caps.get(0)
        .is_some_and(|m| m.start() > 0 && md.as_bytes()[m.start() - 1] == b'!')
}

/// Replace inline code spans with spaces of equal byte length, so match
/// offsets stay valid against the original text.
fn blank_code_spans(md: &str) -> String {
    CODE_SPAN_RE
        .replace_all(md, |caps: &Captures<'_>| " ".repeat(caps[0].len()))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_targets() {
        assert_eq!(classify("#providers"), LinkTarget::Anchor("providers".into()));
        assert_eq!(classify("https://riverpod.dev"), LinkTarget::External);
        assert_eq!(classify("mailto:team@example.com"), LinkTarget::External);
        assert_eq!(
            classify("./rxjs.md#operators"),
            LinkTarget::Guide {
                file: "rxjs.md".into(),
                anchor: Some("operators".into())
            }
        );
        assert_eq!(
            classify("angular.html"),
            LinkTarget::Guide {
                file: "angular.html".into(),
                anchor: None
            }
        );
        assert_eq!(classify("images/diagram.png"), LinkTarget::Other);
    }

    #[test]
    fn extract_skips_images_and_code_spans() {
        let md = "See [providers](#providers), ![diagram](img.png) and `[not](#a-link)`.";
        let links = extract_links(md);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "providers");
        assert_eq!(links[0].target, LinkTarget::Anchor("providers".into()));
    }

    #[test]
    fn extract_handles_titles() {
        let links = extract_links(r#"[docs](https://angular.dev "Angular docs")"#);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "https://angular.dev");
        assert_eq!(links[0].target, LinkTarget::External);
    }

    #[test]
    fn rewrite_changes_only_selected_links() {
        let md = "Read [operators](rxjs.md#operators) and [the site](https://rxjs.dev).";
        let result = rewrite_links(md, |link| match &link.target {
            LinkTarget::Guide { anchor, .. } => {
                Some(format!("#rxjs--{}", anchor.clone().unwrap_or_default()))
            }
            _ => None,
        });
        assert_eq!(
            result,
            "Read [operators](#rxjs--operators) and [the site](https://rxjs.dev)."
        );
    }

    #[test]
    fn rewrite_preserves_title_and_images() {
        let md = r#"![logo](flutter.html) [next](flutter.md "Next guide")"#;
        let result = rewrite_links(md, |_| Some("flutter.html".into()));
        assert_eq!(result, r#"![logo](flutter.html) [next](flutter.html "Next guide")"#);
    }

    #[test]
    fn link_text_keeps_code_spans() {
        let links = extract_links("See [`ref.watch`](#reading-providers).");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "`ref.watch`");
    }

    #[test]
    fn rewrite_leaves_code_spans_alone() {
        let md = "`[x](a.md)` then [y](a.md)";
        let result = rewrite_links(md, |_| Some("a.html".into()));
        assert_eq!(result, "`[x](a.md)` then [y](a.html)");
    }
}
