//! Link destinations for each output style.

use docbundle_markdown::{LinkTarget, rewrite_links};
use docbundle_shared::{Anchor, Block, Bundle, Guide, LinkStyle, qualified_anchor};

/// Rewrite the links in one prose block of `guide` for the given style.
///
/// Site pages: links to other guides point at their `.html` page.
/// Combined document: in-guide and cross-guide links point at qualified
/// anchors. Links that cannot be resolved are left as written.
pub(crate) fn prose_for(text: &str, guide: &Guide, bundle: &Bundle, style: LinkStyle) -> String {
    rewrite_links(text, |link| match (&link.target, style) {
        (LinkTarget::Anchor(anchor), LinkStyle::Combined) => guide
            .has_anchor(anchor)
            .then(|| format!("#{}", qualified(&guide.slug, anchor))),
        (LinkTarget::Anchor(_), LinkStyle::Site) => None,
        (LinkTarget::Guide { file, anchor }, LinkStyle::Site) => {
            let page = match bundle.guide_for_link(file) {
                Some(target) => format!("{}.html", target.slug),
                None => with_html_extension(file),
            };
            Some(match anchor {
                Some(a) => format!("{page}#{a}"),
                None => page,
            })
        }
        (LinkTarget::Guide { file, anchor }, LinkStyle::Combined) => {
            let target = bundle.guide_for_link(file)?;
            Some(match anchor {
                Some(a) => format!("#{}", qualified(&target.slug, a)),
                None => format!("#{}", target.slug),
            })
        }
        (LinkTarget::External | LinkTarget::Other, _) => None,
    })
}

/// A block with its prose links rewritten; code is untouched.
pub(crate) fn block_for(block: &Block, guide: &Guide, bundle: &Bundle, style: LinkStyle) -> Block {
    match block {
        Block::Prose(text) => Block::Prose(prose_for(text, guide, bundle, style)),
        Block::Code { .. } => block.clone(),
    }
}

fn qualified(guide: &str, anchor: &str) -> String {
    qualified_anchor(guide, Some(&Anchor::from(anchor)))
}

fn with_html_extension(file: &str) -> String {
    let file = file.trim_start_matches("./");
    [".markdown", ".md"]
        .iter()
        .find_map(|ext| file.strip_suffix(ext))
        .map(|stem| format!("{stem}.html"))
        .unwrap_or_else(|| file.to_string())
}
