//! Static HTML site: one page per guide plus `index.html` and `style.css`.
//!
//! Guide bodies are rendered with `pulldown-cmark`. Chapter headings are
//! written with a `{#anchor}` attribute so every heading carries its anchor
//! as `id`, which is what TOC links and the site check rely on.

use pulldown_cmark::{Options, Parser, html};
use tracing::{debug, instrument};

use docbundle_markdown::canonical::render_block;
use docbundle_shared::{Bundle, Chapter, Guide, LinkStyle, Toc, TocEntry};

use crate::rewrite::block_for;
use crate::{Artifact, escape_html};

pub const INDEX_FILENAME: &str = "index.html";
pub const STYLE_FILENAME: &str = "style.css";

/// Bundle-wide information a guide page needs.
#[derive(Debug, Clone, Copy)]
pub struct SiteContext<'a> {
    pub bundle: &'a Bundle,
    pub toc: &'a Toc,
}

/// Every site file: index, one page per guide, stylesheet.
#[instrument(skip_all, fields(guides = bundle.guides.len()))]
pub fn render_site(bundle: &Bundle, toc: &Toc) -> Vec<Artifact> {
    let ctx = SiteContext { bundle, toc };

    let mut artifacts = Vec::with_capacity(bundle.guides.len() + 2);
    artifacts.push(render_index(bundle, toc));
    artifacts.extend(bundle.guides.iter().map(|g| render_guide_page(g, &ctx)));
    artifacts.push(Artifact::new(STYLE_FILENAME, DEFAULT_CSS.trim_start()));

    debug!(files = artifacts.len(), "site rendered");
    artifacts
}

/// Standalone page for one guide: title, contents, body, prev/next links.
pub fn render_guide_page(guide: &Guide, ctx: &SiteContext<'_>) -> Artifact {
    let body = markdown_to_html(&guide_markdown(guide, ctx.bundle));

    let contents = ctx
        .toc
        .entries
        .iter()
        .find(|e| e.guide == guide.slug)
        .filter(|e| !e.children.is_empty())
        .map(|e| {
            format!(
                "<nav class=\"contents\">\n<p class=\"contents-title\">Contents</p>\n{}</nav>\n",
                toc_list(&e.children, &|entry| match &entry.anchor {
                    Some(a) => format!("#{a}"),
                    None => entry.href(LinkStyle::Site),
                })
            )
        })
        .unwrap_or_default();

    let main = format!(
        "<h1>{title}</h1>\n{contents}{body}",
        title = escape_html(&guide.title),
    );

    let page = wrap_page(
        &format!("{} | {}", guide.title, ctx.bundle.title),
        &ctx.bundle.title,
        &main,
        &pager(guide, ctx.bundle),
    );

    Artifact::new(format!("{}.html", guide.slug), page)
}

/// `index.html`: bundle title and the full table of contents.
pub fn render_index(bundle: &Bundle, toc: &Toc) -> Artifact {
    let main = format!(
        "<h1>{title}</h1>\n<nav class=\"toc\">\n{list}</nav>\n",
        title = escape_html(&bundle.title),
        list = toc_list(&toc.entries, &|entry| entry.href(LinkStyle::Site)),
    );

    Artifact::new(
        INDEX_FILENAME,
        wrap_page(&bundle.title, &bundle.title, &main, ""),
    )
}

// ---------------------------------------------------------------------------
// Markdown body
// ---------------------------------------------------------------------------

/// The guide body as Markdown with heading ids and site links.
fn guide_markdown(guide: &Guide, bundle: &Bundle) -> String {
    let mut parts: Vec<String> = guide
        .preamble
        .iter()
        .map(|b| render_block(&block_for(b, guide, bundle, LinkStyle::Site)))
        .collect();

    for chapter in &guide.chapters {
        parts.push(heading_with_id(chapter));
        parts.extend(
            chapter
                .blocks
                .iter()
                .map(|b| render_block(&block_for(b, guide, bundle, LinkStyle::Site))),
        );
    }

    parts.join("\n\n")
}

fn heading_with_id(chapter: &Chapter) -> String {
    let hashes = "#".repeat(usize::from(chapter.level));
    // The `{#id}` block is read off first, then any closing `#` run.
    let closing = if chapter.heading.ends_with('#') {
        format!(" {hashes}")
    } else {
        String::new()
    };
    format!("{hashes} {}{closing} {{#{}}}", chapter.heading, chapter.anchor)
}

fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES;

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

// ---------------------------------------------------------------------------
// Page chrome
// ---------------------------------------------------------------------------

fn toc_list(entries: &[TocEntry], href: &dyn Fn(&TocEntry) -> String) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut out = String::from("<ul>\n");
    for entry in entries {
        out.push_str(&format!(
            "<li><a href=\"{}\">{}</a>",
            escape_html(&href(entry)),
            escape_html(&entry.title)
        ));
        if !entry.children.is_empty() {
            out.push('\n');
            out.push_str(&toc_list(&entry.children, href));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n");
    out
}

fn pager(guide: &Guide, bundle: &Bundle) -> String {
    let Some(pos) = bundle.guides.iter().position(|g| g.slug == guide.slug) else {
        return String::new();
    };

    let link = |g: &Guide, rel: &str, label: &str| {
        format!(
            "<a class=\"{rel}\" rel=\"{rel}\" href=\"{}.html\">{label}: {}</a>",
            g.slug,
            escape_html(&g.title)
        )
    };

    let mut links = Vec::new();
    if let Some(prev) = pos.checked_sub(1).and_then(|i| bundle.guides.get(i)) {
        links.push(link(prev, "prev", "Previous"));
    }
    if let Some(next) = bundle.guides.get(pos + 1) {
        links.push(link(next, "next", "Next"));
    }

    if links.is_empty() {
        String::new()
    } else {
        format!("<nav class=\"pager\">\n{}\n</nav>\n", links.join("\n"))
    }
}

fn wrap_page(title: &str, bundle_title: &str, main: &str, footer: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<link rel="stylesheet" href="{STYLE_FILENAME}">
</head>
<body>
<header class="site"><a href="{INDEX_FILENAME}">{bundle_title}</a></header>
<main class="guide">
{main}</main>
{footer}</body>
</html>
"#,
        title = escape_html(title),
        bundle_title = escape_html(bundle_title),
    )
}

/// Stylesheet written as `style.css`.
const DEFAULT_CSS: &str = r#"
:root {
    --primary-color: #2563eb;
    --text-color: #1f2937;
    --muted-color: #6b7280;
    --border-color: #e5e7eb;
    --code-bg: #f3f4f6;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
    line-height: 1.6;
    color: var(--text-color);
    max-width: 900px;
    margin: 0 auto;
    padding: 2rem;
}

header.site {
    font-size: 0.9rem;
    border-bottom: 1px solid var(--border-color);
    padding-bottom: 0.5rem;
}

h1 {
    border-bottom: 2px solid var(--primary-color);
    padding-bottom: 0.5rem;
}

h2 {
    border-bottom: 1px solid var(--border-color);
    padding-bottom: 0.25rem;
}

nav.contents, nav.toc {
    background-color: var(--code-bg);
    border-radius: 6px;
    padding: 0.5rem 1rem;
}

.contents-title {
    font-weight: 600;
    margin: 0.5rem 0;
}

nav.pager {
    display: flex;
    justify-content: space-between;
    border-top: 1px solid var(--border-color);
    margin-top: 2rem;
    padding-top: 1rem;
}

nav.pager .next {
    margin-left: auto;
}

table {
    border-collapse: collapse;
    margin: 1em 0;
}

th, td {
    padding: 0.5rem;
    border: 1px solid var(--border-color);
}

code {
    font-family: 'SF Mono', 'Fira Code', 'Consolas', monospace;
    font-size: 0.875em;
    background-color: var(--code-bg);
    padding: 0.125em 0.25em;
    border-radius: 3px;
}

pre {
    background-color: var(--code-bg);
    padding: 1em;
    border-radius: 6px;
    overflow-x: auto;
}

pre code {
    background-color: transparent;
    padding: 0;
}

a {
    color: var(--primary-color);
    text-decoration: none;
}

a:hover {
    text-decoration: underline;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use docbundle_markdown::{ParseOptions, parse_guide};
    use docbundle_shared::Anchor;

    fn guide(source: &str, text: &str) -> Guide {
        parse_guide(text, &ParseOptions::new(source)).guide
    }

    fn entry(title: &str, guide: &str, anchor: Option<&str>, level: u8) -> TocEntry {
        TocEntry {
            title: title.into(),
            guide: guide.into(),
            anchor: anchor.map(Anchor::from),
            level,
            children: vec![],
        }
    }

    fn fixture() -> (Bundle, Toc) {
        let bundle = Bundle {
            title: "Frontend Guides".into(),
            guides: vec![
                guide(
                    "angular.md",
                    "# Angular\n\nIntro.\n\n## Components\n\nSee [RxJS](rxjs.md).\n\n```ts\nconst a = 1 < 2;\n```\n\n## Async values {#async}\n",
                ),
                guide("rxjs.md", "# RxJS\n\n## Operators\n"),
                guide("flutter.md", "# Flutter\n"),
            ],
        };

        let mut angular = entry("Angular", "angular", None, 0);
        angular.children = vec![
            entry("Components", "angular", Some("components"), 2),
            entry("Async values", "angular", Some("async"), 2),
        ];
        let mut rxjs = entry("RxJS", "rxjs", None, 0);
        rxjs.children = vec![entry("Operators", "rxjs", Some("operators"), 2)];
        let toc = Toc {
            entries: vec![angular, rxjs, entry("Flutter", "flutter", None, 0)],
        };

        (bundle, toc)
    }

    #[test]
    fn guide_page_headings_carry_anchor_ids() {
        let (bundle, toc) = fixture();
        let ctx = SiteContext {
            bundle: &bundle,
            toc: &toc,
        };
        let page = render_guide_page(&bundle.guides[0], &ctx);

        assert_eq!(page.filename, "angular.html");
        assert!(page.content.contains("<h2 id=\"components\">Components</h2>"));
        assert!(page.content.contains("<h2 id=\"async\">Async values</h2>"));
        assert!(page.content.contains("<h1>Angular</h1>"));
    }

    #[test]
    fn every_parsed_chapter_renders_as_one_heading() {
        let bundle = Bundle {
            title: "Guides".into(),
            guides: vec![guide(
                "hooks.md",
                "# Hooks\n\n## State {#state-hook}\n\n```\n# not a heading\n```\n\n### Effects ###\n\n~~~js\n## also code\n~~~\n\n## Trailing # ##\n\n    # indented code\n",
            )],
        };
        let toc = Toc { entries: vec![] };
        let ctx = SiteContext {
            bundle: &bundle,
            toc: &toc,
        };
        let guide = &bundle.guides[0];
        let page = render_guide_page(guide, &ctx).content;

        assert_eq!(guide.chapters.len(), 3);
        for chapter in &guide.chapters {
            let tag = format!("<h{} id=\"{}\">", chapter.level, chapter.anchor);
            assert!(page.contains(&tag), "missing {tag}");
        }
        let rendered = page.matches("<h2").count() + page.matches("<h3").count();
        assert_eq!(rendered, guide.chapters.len());
        assert!(page.contains(">Trailing #</h2>"));
        assert!(page.contains("# not a heading"));
    }

    #[test]
    fn guide_page_has_contents_and_rewritten_links() {
        let (bundle, toc) = fixture();
        let ctx = SiteContext {
            bundle: &bundle,
            toc: &toc,
        };
        let page = render_guide_page(&bundle.guides[0], &ctx).content;

        assert!(page.contains("<a href=\"#components\">Components</a>"));
        assert!(page.contains("<a href=\"rxjs.html\">RxJS</a>"));
        assert!(page.contains("class=\"language-ts\""));
        assert!(page.contains("1 &lt; 2"));
    }

    #[test]
    fn pager_links_neighbours() {
        let (bundle, toc) = fixture();
        let ctx = SiteContext {
            bundle: &bundle,
            toc: &toc,
        };

        let first = render_guide_page(&bundle.guides[0], &ctx).content;
        assert!(!first.contains("rel=\"prev\""));
        assert!(first.contains("href=\"rxjs.html\">Next: RxJS</a>"));

        let middle = render_guide_page(&bundle.guides[1], &ctx).content;
        assert!(middle.contains("href=\"angular.html\">Previous: Angular</a>"));
        assert!(middle.contains("href=\"flutter.html\">Next: Flutter</a>"));

        let last = render_guide_page(&bundle.guides[2], &ctx).content;
        assert!(!last.contains("rel=\"next\""));
        assert!(!last.contains("class=\"contents\""));
    }

    #[test]
    fn index_lists_every_entry() {
        let (bundle, toc) = fixture();
        let index = render_index(&bundle, &toc);

        assert_eq!(index.filename, INDEX_FILENAME);
        assert!(index.content.contains("<title>Frontend Guides</title>"));
        assert!(index.content.contains("href=\"angular.html#async\""));
        assert!(index.content.contains("href=\"rxjs.html#operators\""));
        assert!(index.content.contains("href=\"flutter.html\""));
    }

    #[test]
    fn site_rendering_is_deterministic() {
        let (bundle, toc) = fixture();
        let first = render_site(&bundle, &toc);
        let second = render_site(&bundle, &toc);

        assert_eq!(first, second);
        let names: Vec<&str> = first.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["index.html", "angular.html", "rxjs.html", "flutter.html", "style.css"]
        );
    }
}
