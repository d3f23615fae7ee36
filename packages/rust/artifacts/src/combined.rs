//! `bundle.md`: every guide in one Markdown document.
//!
//! Anchors are only unique per guide, so the combined document places an
//! explicit `<a id="guide--anchor"></a>` marker before every guide and
//! chapter heading and rewrites links to those qualified ids.

use tracing::instrument;

use docbundle_markdown::canonical::{heading_line, render_block};
use docbundle_shared::{Block, Bundle, Guide, LinkStyle, Toc, TocEntry, qualified_anchor};

use crate::Artifact;
use crate::rewrite::block_for;

pub const COMBINED_FILENAME: &str = "bundle.md";

/// Render the combined Markdown document.
#[instrument(skip_all, fields(guides = bundle.guides.len()))]
pub fn render_combined(bundle: &Bundle, toc: &Toc) -> Artifact {
    let mut parts = vec![format!("# {}", bundle.title)];

    if !toc.entries.is_empty() {
        let mut contents = String::from("## Contents\n\n");
        push_contents(&mut contents, &toc.entries, 0);
        parts.push(contents.trim_end().to_string());
    }

    parts.extend(bundle.guides.iter().map(|g| guide_section(g, bundle)));

    let mut out = parts.join("\n\n");
    out.push('\n');
    Artifact::new(COMBINED_FILENAME, out)
}

fn push_contents(out: &mut String, entries: &[TocEntry], depth: usize) {
    for entry in entries {
        out.push_str(&format!(
            "{}- [{}]({})\n",
            "  ".repeat(depth),
            entry.title,
            entry.href(LinkStyle::Combined)
        ));
        push_contents(out, &entry.children, depth + 1);
    }
}

fn guide_section(guide: &Guide, bundle: &Bundle) -> String {
    let mut parts = vec![
        marker(&qualified_anchor(&guide.slug, None)),
        format!("# {}", guide.title),
    ];

    let render = |block: &Block| render_block(&block_for(block, guide, bundle, LinkStyle::Combined));

    parts.extend(guide.preamble.iter().map(render));
    for chapter in &guide.chapters {
        parts.push(marker(&qualified_anchor(&guide.slug, Some(&chapter.anchor))));
        parts.push(heading_line(chapter));
        parts.extend(chapter.blocks.iter().map(render));
    }

    parts.join("\n\n")
}

fn marker(id: &str) -> String {
    format!("<a id=\"{id}\"></a>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbundle_markdown::{ParseOptions, parse_guide};
    use docbundle_shared::Anchor;

    fn bundle() -> Bundle {
        Bundle {
            title: "Frontend Guides".into(),
            guides: vec![
                parse_guide(
                    "# Riverpod\n\n## Providers\n\nRead [operators](rxjs.md#operators).\n\n## Testing\n\nBack to [providers](#providers).\n",
                    &ParseOptions::new("riverpod.md"),
                )
                .guide,
                parse_guide(
                    "# RxJS\n\n## Operators\n\n```ts\nof(1)\n```\n",
                    &ParseOptions::new("rxjs.md"),
                )
                .guide,
            ],
        }
    }

    fn toc() -> Toc {
        let chapter = |title: &str, guide: &str, anchor: &str| TocEntry {
            title: title.into(),
            guide: guide.into(),
            anchor: Some(Anchor::from(anchor)),
            level: 2,
            children: vec![],
        };
        Toc {
            entries: vec![
                TocEntry {
                    title: "Riverpod".into(),
                    guide: "riverpod".into(),
                    anchor: None,
                    level: 0,
                    children: vec![
                        chapter("Providers", "riverpod", "providers"),
                        chapter("Testing", "riverpod", "testing"),
                    ],
                },
                TocEntry {
                    title: "RxJS".into(),
                    guide: "rxjs".into(),
                    anchor: None,
                    level: 0,
                    children: vec![chapter("Operators", "rxjs", "operators")],
                },
            ],
        }
    }

    #[test]
    fn combined_document_layout() {
        let out = render_combined(&bundle(), &toc());
        assert_eq!(out.filename, COMBINED_FILENAME);
        assert_eq!(
            out.content,
            "# Frontend Guides\n\n\
             ## Contents\n\n\
             - [Riverpod](#riverpod)\n  \
             - [Providers](#riverpod--providers)\n  \
             - [Testing](#riverpod--testing)\n\
             - [RxJS](#rxjs)\n  \
             - [Operators](#rxjs--operators)\n\n\
             <a id=\"riverpod\"></a>\n\n\
             # Riverpod\n\n\
             <a id=\"riverpod--providers\"></a>\n\n\
             ## Providers\n\n\
             Read [operators](#rxjs--operators).\n\n\
             <a id=\"riverpod--testing\"></a>\n\n\
             ## Testing\n\n\
             Back to [providers](#riverpod--providers).\n\n\
             <a id=\"rxjs\"></a>\n\n\
             # RxJS\n\n\
             <a id=\"rxjs--operators\"></a>\n\n\
             ## Operators\n\n\
             ```ts\nof(1)\n```\n"
        );
    }

    #[test]
    fn markers_follow_source_order() {
        let out = render_combined(&bundle(), &toc()).content;
        let providers = out.find("<a id=\"riverpod--providers\">");
        let testing = out.find("<a id=\"riverpod--testing\">");
        let operators = out.find("<a id=\"rxjs--operators\">");
        assert!(providers < testing);
        assert!(testing < operators);
    }

    #[test]
    fn empty_toc_omits_contents() {
        let out = render_combined(&bundle(), &Toc::default()).content;
        assert!(!out.contains("## Contents"));
        assert!(out.starts_with("# Frontend Guides\n\n<a id=\"riverpod\"></a>"));
    }
}
