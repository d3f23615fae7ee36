//! Documentation integrity checks.
//!
//! [`check_bundle`] verifies the parsed bundle against its TOC: every entry
//! resolves, TOC order follows source order, canonical rendering is stable,
//! and links in prose point somewhere real. [`check_site`] verifies the
//! emitted HTML pages.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use docbundle_markdown::{LinkTarget, ParseOptions, canonical_markdown, extract_links, parse_guide};
use docbundle_shared::{
    Block, Bundle, Diagnostic, DiagnosticKind, DocBundleError, Guide, Result, Severity, Toc,
    TocEntry,
};

/// Diagnostics from a check run.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Add diagnostics from another stage (parsing, discovery).
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Whether the run failed: any error, or any warning when `strict`.
    pub fn has_errors(&self, strict: bool) -> bool {
        let threshold = if strict {
            Severity::Warning
        } else {
            Severity::Error
        };
        self.diagnostics.iter().any(|d| d.severity >= threshold)
    }

    /// Diagnostics ordered by source, then line.
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut sorted: Vec<&Diagnostic> = self.diagnostics.iter().collect();
        sorted.sort_by(|a, b| (&a.source, a.line).cmp(&(&b.source, b.line)));
        sorted
    }
}

/// Check a parsed bundle and its TOC.
#[instrument(skip_all, fields(guides = bundle.guides.len()))]
pub fn check_bundle(bundle: &Bundle, toc: &Toc) -> CheckReport {
    let mut report = CheckReport::default();

    check_toc_entries(bundle, toc, &mut report);
    check_toc_order(bundle, toc, &mut report);
    for guide in &bundle.guides {
        check_idempotent(guide, &mut report);
        check_links(guide, bundle, &mut report);
    }

    debug!(diagnostics = report.diagnostics.len(), "bundle checked");
    report
}

// ---------------------------------------------------------------------------
// TOC resolution and order
// ---------------------------------------------------------------------------

fn check_toc_entries(bundle: &Bundle, toc: &Toc, report: &mut CheckReport) {
    for entry in toc.flatten() {
        let Some(guide) = bundle.guide(&entry.guide) else {
            report.diagnostics.push(Diagnostic::new(
                Severity::Error,
                DiagnosticKind::BrokenTocEntry,
                &entry.guide,
                format!("TOC entry '{}' names unknown guide '{}'", entry.title, entry.guide),
            ));
            continue;
        };

        if let Some(anchor) = &entry.anchor {
            if !guide.has_anchor(anchor.as_str()) {
                report.diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    DiagnosticKind::BrokenTocEntry,
                    &guide.source,
                    format!("TOC entry '{}' points at missing anchor #{anchor}", entry.title),
                ));
            }
        }
    }
}

fn check_toc_order(bundle: &Bundle, toc: &Toc, report: &mut CheckReport) {
    let toc_guides: Vec<&str> = toc.entries.iter().map(|e| e.guide.as_str()).collect();
    let bundle_guides: Vec<&str> = bundle.guides.iter().map(|g| g.slug.as_str()).collect();
    if toc_guides != bundle_guides {
        report.diagnostics.push(Diagnostic::new(
            Severity::Error,
            DiagnosticKind::OrderMismatch,
            &bundle.title,
            format!(
                "TOC lists guides as [{}] but the bundle order is [{}]",
                toc_guides.join(", "),
                bundle_guides.join(", ")
            ),
        ));
    }

    for entry in &toc.entries {
        let Some(guide) = bundle.guide(&entry.guide) else {
            continue;
        };

        let mut last: Option<(usize, &str)> = None;
        for child in flatten_children(entry) {
            let Some(anchor) = &child.anchor else {
                continue;
            };
            let Some(pos) = guide.chapters.iter().position(|c| c.anchor == *anchor) else {
                continue;
            };
            if let Some((prev_pos, prev_title)) = last {
                if pos <= prev_pos {
                    report.diagnostics.push(
                        Diagnostic::new(
                            Severity::Error,
                            DiagnosticKind::OrderMismatch,
                            &guide.source,
                            format!(
                                "TOC places '{}' after '{prev_title}', but it comes first in the source",
                                child.title
                            ),
                        )
                        .at_line(guide.chapters[pos].line),
                    );
                }
            }
            last = Some((pos, child.title.as_str()));
        }
    }
}

fn flatten_children(entry: &TocEntry) -> Vec<&TocEntry> {
    let mut out = Vec::new();
    for child in &entry.children {
        out.push(child);
        out.extend(flatten_children(child));
    }
    out
}

// ---------------------------------------------------------------------------
// Canonical rendering
// ---------------------------------------------------------------------------

fn check_idempotent(guide: &Guide, report: &mut CheckReport) {
    let once = canonical_markdown(guide);
    let reparsed = parse_guide(&once, &ParseOptions::new(&guide.source)).guide;
    let twice = canonical_markdown(&reparsed);

    if once != twice {
        let line = first_difference(&once, &twice);
        report.diagnostics.push(Diagnostic::new(
            Severity::Error,
            DiagnosticKind::NotIdempotent,
            &guide.source,
            format!("canonical Markdown is not stable under re-parsing (first difference at canonical line {line})"),
        ));
    }
}

fn first_difference(a: &str, b: &str) -> usize {
    a.lines()
        .zip(b.lines())
        .position(|(x, y)| x != y)
        .unwrap_or_else(|| a.lines().count().min(b.lines().count()))
        + 1
}

// ---------------------------------------------------------------------------
// Links in prose
// ---------------------------------------------------------------------------

fn check_links(guide: &Guide, bundle: &Bundle, report: &mut CheckReport) {
    let sections = std::iter::once((None, guide.preamble.as_slice())).chain(
        guide
            .chapters
            .iter()
            .map(|c| (Some(c.line), c.blocks.as_slice())),
    );

    for (line, blocks) in sections {
        for block in blocks {
            let Block::Prose(text) = block else {
                continue;
            };
            for link in extract_links(text) {
                if let Some((kind, message)) = broken_link(guide, bundle, &link.target) {
                    let mut diagnostic =
                        Diagnostic::new(Severity::Warning, kind, &guide.source, message);
                    if let Some(line) = line {
                        diagnostic = diagnostic.at_line(line);
                    }
                    report.diagnostics.push(diagnostic);
                }
            }
        }
    }
}

fn broken_link(
    guide: &Guide,
    bundle: &Bundle,
    target: &LinkTarget,
) -> Option<(DiagnosticKind, String)> {
    match target {
        LinkTarget::Anchor(anchor) if !anchor.is_empty() && !guide.has_anchor(anchor) => Some((
            DiagnosticKind::BrokenAnchor,
            format!("link to #{anchor} does not match any heading"),
        )),
        LinkTarget::Guide { file, anchor } => match bundle.guide_for_link(file) {
            None => Some((
                DiagnosticKind::BrokenGuideLink,
                format!("link to {file} does not match any guide in the bundle"),
            )),
            Some(target) => match anchor {
                Some(a) if !target.has_anchor(a) => Some((
                    DiagnosticKind::BrokenAnchor,
                    format!("link to {file}#{a} does not match any heading in '{}'", target.title),
                )),
                _ => None,
            },
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Emitted site
// ---------------------------------------------------------------------------

struct Page {
    ids: HashSet<String>,
    hrefs: Vec<String>,
}

/// Check that every local link in the emitted HTML resolves.
///
/// Links to another page must name an existing page, and a `#fragment` must
/// match an element id on the target page.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn check_site(dir: &Path) -> Result<CheckReport> {
    let (Ok(id_sel), Ok(link_sel)) = (Selector::parse("[id]"), Selector::parse("a[href]")) else {
        return Err(DocBundleError::validation("invalid site selectors"));
    };

    let mut pages: BTreeMap<String, Page> = BTreeMap::new();
    let entries = std::fs::read_dir(dir).map_err(|e| DocBundleError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| DocBundleError::io(dir, e))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !name.ends_with(".html") {
            continue;
        }

        let html = std::fs::read_to_string(&path).map_err(|e| DocBundleError::io(&path, e))?;
        let doc = Html::parse_document(&html);
        let ids = doc
            .select(&id_sel)
            .filter_map(|el| el.value().attr("id"))
            .map(str::to_string)
            .collect();
        let hrefs = doc
            .select(&link_sel)
            .filter_map(|el| el.value().attr("href"))
            .map(str::to_string)
            .collect();
        pages.insert(name, Page { ids, hrefs });
    }

    if pages.is_empty() {
        return Err(DocBundleError::validation(format!(
            "no HTML pages found in {}",
            dir.display()
        )));
    }

    let mut report = CheckReport::default();
    for (name, page) in &pages {
        for href in &page.hrefs {
            if let Some((kind, message)) = broken_href(name, href, &pages) {
                report
                    .diagnostics
                    .push(Diagnostic::new(Severity::Error, kind, name, message));
            }
        }
    }

    debug!(
        pages = pages.len(),
        broken = report.diagnostics.len(),
        "site checked"
    );
    Ok(report)
}

fn broken_href(
    current: &str,
    href: &str,
    pages: &BTreeMap<String, Page>,
) -> Option<(DiagnosticKind, String)> {
    if Url::parse(href).is_ok() {
        return None;
    }

    let (file, fragment) = match href.split_once('#') {
        Some((file, fragment)) => (file, Some(fragment)),
        None => (href, None),
    };
    let file = percent_decode_str(file).decode_utf8_lossy();
    let file = file.trim_start_matches("./");
    let fragment = fragment.map(|f| percent_decode_str(f).decode_utf8_lossy());

    let target = if file.is_empty() { current } else { file };
    if !target.ends_with(".html") {
        return None;
    }

    let Some(page) = pages.get(target) else {
        return Some((
            DiagnosticKind::BrokenGuideLink,
            format!("link to {href} names a page that was not emitted"),
        ));
    };

    match fragment {
        Some(f) if !f.is_empty() && !page.ids.contains(f.as_ref()) => Some((
            DiagnosticKind::BrokenAnchor,
            format!("link to {href} has no matching id on {target}"),
        )),
        _ => None,
    }
}
