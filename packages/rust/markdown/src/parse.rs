//! Guide parsing: frontmatter, ATX headings, fenced code, prose.
//!
//! Parsing never fails. Problems in the source become [`Diagnostic`]s and the
//! offending line is kept as prose.
//!
//! Only the [`Guide`] produced here is rendered. Canonical Markdown and the
//! site HTML both re-emit chapters from it, so every chapter comes back as
//! exactly one heading carrying its anchor.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use docbundle_shared::{Block, Chapter, Diagnostic, DiagnosticKind, Guide, Severity, sha256_hex};

use crate::anchor::{AnchorSet, is_valid_anchor, slugify};
use crate::cleanup;
use crate::frontmatter::{self, FrontMatter};

/// Options for parsing one guide source.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Source path relative to the source directory (e.g. `riverpod.md`).
    pub source: String,
}

impl ParseOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A parsed guide plus everything worth reporting about its source.
#[derive(Debug, Clone)]
pub struct ParsedGuide {
    pub guide: Guide,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse one guide source into chapters and blocks.
#[instrument(skip(text), fields(source = %opts.source, len = text.len()))]
pub fn parse_guide(text: &str, opts: &ParseOptions) -> ParsedGuide {
    let mut state = ParseState::new(&opts.source);

    let split = frontmatter::split(text);
    let front = match split.raw {
        Some(raw) => match frontmatter::parse(raw) {
            Ok(fm) => fm,
            Err(e) => {
                state.report(
                    Severity::Warning,
                    DiagnosticKind::InvalidFrontMatter,
                    1,
                    format!("frontmatter ignored: {e}"),
                );
                FrontMatter::default()
            }
        },
        None => FrontMatter::default(),
    };

    let mut fence: Option<OpenFence> = None;

    for (idx, line) in split.body.lines().enumerate() {
        let line_no = split.body_offset + idx + 1;

        if let Some(open) = fence.as_mut() {
            if open.closed_by(line) {
                if let Some(done) = fence.take() {
                    state.push_block(done.into_block());
                }
            } else {
                open.push(line);
            }
            continue;
        }

        if let Some(open) = OpenFence::open(line, line_no) {
            state.flush_prose();
            fence = Some(open);
            continue;
        }

        match classify_heading(line) {
            HeadingLine::Heading(heading) => state.heading(heading, line_no),
            HeadingLine::Malformed(reason) => {
                state.report(
                    Severity::Warning,
                    DiagnosticKind::MalformedHeading,
                    line_no,
                    format!("not treated as a heading: {reason}"),
                );
                state.prose_line(line);
            }
            HeadingLine::Empty => {
                state.report(
                    Severity::Warning,
                    DiagnosticKind::EmptyHeading,
                    line_no,
                    "heading has no text",
                );
                state.prose_line(line);
            }
            HeadingLine::NotHeading => state.prose_line(line),
        }
    }

    if let Some(open) = fence.take() {
        state.report(
            Severity::Warning,
            DiagnosticKind::UnterminatedFence,
            open.line,
            "code fence is never closed; it runs to the end of the file",
        );
        state.push_block(open.into_block());
    }
    state.flush_prose();

    let parsed = state.finish(front, sha256_hex(text));
    debug!(
        slug = %parsed.guide.slug,
        chapters = parsed.guide.chapters.len(),
        "guide parsed"
    );
    parsed
}

/// Title derived from a file stem: `clean-code` -> `Clean Code`.
pub fn title_from_stem(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source);

    stem.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.collect::<String>())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Heading text with inline markup removed.
pub fn plain_heading_text(text: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
    static EMPHASIS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*([^*\s][^*]*?)\*").expect("valid regex"));

    let without_links = LINK_RE.replace_all(text, "$1");
    let without_markers = without_links
        .replace("**", "")
        .replace("__", "")
        .replace("~~", "")
        .replace('`', "");
    EMPHASIS_RE
        .replace_all(&without_markers, "$1")
        .trim()
        .to_string()
}

/// The title as it reads back from its own `# title` line.
///
/// Returns `None` when nothing is left once markup, closing `#`s and an
/// `{#id}` suffix are removed.
fn settle_title(title: &str) -> Option<String> {
    let mut current = title.split_whitespace().collect::<Vec<_>>().join(" ");
    loop {
        let HeadingLine::Heading(parts) = classify_heading(&format!("# {current}")) else {
            return None;
        };
        let next = plain_heading_text(&parts.text);
        if next.is_empty() {
            return None;
        }
        if next == current {
            return Some(current);
        }
        current = next;
    }
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// A recognised ATX heading.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeadingParts {
    level: u8,
    /// Heading text as written, closing `#`s and `{#id}` removed.
    text: String,
    explicit_anchor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HeadingLine {
    Heading(HeadingParts),
    Malformed(&'static str),
    Empty,
    NotHeading,
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn classify_heading(line: &str) -> HeadingLine {
    let indent = leading_spaces(line);
    if indent > 3 {
        return HeadingLine::NotHeading;
    }

    let rest = &line[indent..];
    if !rest.starts_with('#') {
        return HeadingLine::NotHeading;
    }

    let hashes = rest.chars().take_while(|c| *c == '#').count();
    let after = &rest[hashes..];

    if hashes > 6 {
        return HeadingLine::Malformed("more than six '#' characters");
    }
    if after.trim().is_empty() {
        return HeadingLine::Empty;
    }
    if !after.starts_with([' ', '\t']) {
        return HeadingLine::Malformed("missing space after '#'");
    }

    let mut text = after.trim();

    // Optional closing sequence: `## Title ##`
    let without_closing = text.trim_end_matches('#');
    if without_closing.len() != text.len() {
        if without_closing.trim().is_empty() {
            return HeadingLine::Empty;
        }
        if without_closing.ends_with([' ', '\t']) {
            text = without_closing.trim_end();
        }
    }

    // Optional explicit anchor: `## Title {#custom-id}`
    let mut explicit_anchor = None;
    if let Some(stripped) = text.strip_suffix('}') {
        if let Some(pos) = stripped.rfind("{#") {
            let id = stripped[pos + 2..].trim();
            if is_valid_anchor(id) {
                explicit_anchor = Some(id.to_string());
                text = stripped[..pos].trim_end();
            }
        }
    }

    if text.is_empty() {
        return HeadingLine::Empty;
    }

    HeadingLine::Heading(HeadingParts {
        // hashes is 1..=6 here
        level: hashes as u8,
        text: text.to_string(),
        explicit_anchor,
    })
}

// ---------------------------------------------------------------------------
// Fenced code
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct OpenFence {
    marker: char,
    len: usize,
    indent: usize,
    lang: Option<String>,
    line: usize,
    lines: Vec<String>,
}

impl OpenFence {
    fn open(line: &str, line_no: usize) -> Option<Self> {
        let indent = leading_spaces(line);
        if indent > 3 {
            return None;
        }

        let rest = &line[indent..];
        let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = rest.chars().take_while(|c| *c == marker).count();
        if len < 3 {
            return None;
        }

        let info = &rest[len..];
        if marker == '`' && info.contains('`') {
            return None;
        }

        Some(Self {
            marker,
            len,
            indent,
            lang: cleanup::normalize_lang(info),
            line: line_no,
            lines: Vec::new(),
        })
    }

    fn closed_by(&self, line: &str) -> bool {
        let indent = leading_spaces(line);
        if indent > 3 {
            return false;
        }
        let rest = &line[indent..];
        let run = rest.chars().take_while(|c| *c == self.marker).count();
        run >= self.len && rest[run..].trim().is_empty()
    }

    fn push(&mut self, line: &str) {
        let strip = leading_spaces(line).min(self.indent);
        self.lines.push(line[strip..].to_string());
    }

    fn into_block(self) -> Block {
        Block::Code {
            lang: self.lang,
            code: self.lines.join("\n"),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder state
// ---------------------------------------------------------------------------

struct ParseState {
    source: String,
    diagnostics: Vec<Diagnostic>,
    guide_heading: Option<String>,
    seen_heading: bool,
    preamble: Vec<Block>,
    chapters: Vec<Chapter>,
    prose: Vec<String>,
    anchors: AnchorSet,
    /// Lowercased chapter title -> line of first occurrence.
    titles: HashMap<String, usize>,
}

impl ParseState {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            diagnostics: Vec::new(),
            guide_heading: None,
            seen_heading: false,
            preamble: Vec::new(),
            chapters: Vec::new(),
            prose: Vec::new(),
            anchors: AnchorSet::new(),
            titles: HashMap::new(),
        }
    }

    fn report(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        line: usize,
        message: impl Into<String>,
    ) {
        self.diagnostics
            .push(Diagnostic::new(severity, kind, &self.source, message).at_line(line));
    }

    fn prose_line(&mut self, line: &str) {
        self.prose.push(line.to_string());
    }

    fn flush_prose(&mut self) {
        if self.prose.is_empty() {
            return;
        }
        let text = cleanup::clean_prose(&self.prose.join("\n"));
        self.prose.clear();
        if !text.trim().is_empty() {
            self.push_block(Block::Prose(text));
        }
    }

    fn push_block(&mut self, block: Block) {
        match self.chapters.last_mut() {
            Some(chapter) => chapter.blocks.push(block),
            None => self.preamble.push(block),
        }
    }

    fn heading(&mut self, parts: HeadingParts, line: usize) {
        self.flush_prose();

        let title = plain_heading_text(&parts.text);

        if !self.seen_heading && parts.level == 1 {
            self.seen_heading = true;
            self.guide_heading = Some(title);
            return;
        }
        self.seen_heading = true;

        let level = if parts.level == 1 {
            self.report(
                Severity::Info,
                DiagnosticKind::DemotedHeading,
                line,
                format!("additional top-level heading '{title}' demoted to level 2"),
            );
            2
        } else {
            parts.level
        };

        let key = title.to_lowercase();
        if let Some(first) = self.titles.get(&key).copied() {
            self.report(
                Severity::Warning,
                DiagnosticKind::DuplicateHeading,
                line,
                format!("heading '{title}' repeats the heading at line {first}"),
            );
        } else {
            self.titles.insert(key, line);
        }

        let base = parts
            .explicit_anchor
            .clone()
            .unwrap_or_else(|| slugify(&title));
        let anchor = self.anchors.claim(&base);
        if parts.explicit_anchor.is_some() && anchor.as_str() != base {
            self.report(
                Severity::Warning,
                DiagnosticKind::DuplicateHeading,
                line,
                format!("explicit anchor '{base}' already used; renamed to '{anchor}'"),
            );
        }

        self.chapters.push(Chapter {
            title,
            heading: parts.text,
            level,
            anchor,
            explicit_anchor: parts.explicit_anchor.is_some(),
            line,
            blocks: Vec::new(),
        });
    }

    fn finish(self, front: FrontMatter, content_hash: String) -> ParsedGuide {
        let title = front
            .title
            .as_deref()
            .and_then(settle_title)
            .or_else(|| self.guide_heading.as_deref().and_then(settle_title))
            .or_else(|| settle_title(&title_from_stem(&self.source)))
            .unwrap_or_else(|| "Untitled".to_string());

        let slug = match front.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => slugify(s),
            _ => slugify(&stem(&self.source)),
        };

        ParsedGuide {
            guide: Guide {
                slug,
                title,
                source: self.source,
                order: front.order,
                preamble: self.preamble,
                chapters: self.chapters,
                content_hash,
            },
            diagnostics: self.diagnostics,
        }
    }
}

fn stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedGuide {
        parse_guide(text, &ParseOptions::new("riverpod.md"))
    }

    fn kinds(parsed: &ParsedGuide) -> Vec<DiagnosticKind> {
        parsed.diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn parses_title_preamble_and_chapters() {
        let parsed = parse(
            "# Riverpod\n\nIntro text.\n\n## Providers\n\nA provider.\n\n### FutureProvider\n\nAsync.\n\n## Testing\n",
        );
        let guide = &parsed.guide;

        assert_eq!(guide.title, "Riverpod");
        assert_eq!(guide.slug, "riverpod");
        assert_eq!(guide.preamble, vec![Block::Prose("Intro text.".into())]);

        let anchors: Vec<&str> = guide.chapters.iter().map(|c| c.anchor.as_str()).collect();
        assert_eq!(anchors, vec!["providers", "futureprovider", "testing"]);
        assert_eq!(guide.chapters[1].level, 3);
        assert_eq!(guide.chapters[1].line, 9);
        assert_eq!(guide.chapters[0].blocks, vec![Block::Prose("A provider.".into())]);
        assert!(guide.chapters[2].blocks.is_empty());
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn headings_inside_fences_are_code() {
        let parsed = parse(
            "# Flutter\n\n## Widgets\n\n```dart\n# not a heading\nvoid main() {}\n```\n\nAfter.\n",
        );
        let chapter = &parsed.guide.chapters[0];
        assert_eq!(parsed.guide.chapters.len(), 1);
        assert_eq!(
            chapter.blocks,
            vec![
                Block::Code {
                    lang: Some("dart".into()),
                    code: "# not a heading\nvoid main() {}".into()
                },
                Block::Prose("After.".into()),
            ]
        );
    }

    #[test]
    fn tilde_fence_needs_matching_marker_and_length() {
        let parsed = parse("## Code\n\n~~~~ts\nconst a = 1;\n~~~\n```\n~~~~\n");
        assert_eq!(
            parsed.guide.chapters[0].blocks,
            vec![Block::Code {
                lang: Some("ts".into()),
                code: "const a = 1;\n~~~\n```".into()
            }]
        );
    }

    #[test]
    fn indented_fence_content_is_dedented() {
        let parsed = parse("## Code\n\n  ```\n  line one\n    nested\n  ```\n");
        assert_eq!(
            parsed.guide.chapters[0].blocks,
            vec![Block::Code {
                lang: None,
                code: "line one\n  nested".into()
            }]
        );
    }

    #[test]
    fn unterminated_fence_reported_and_kept() {
        let parsed = parse("# RxJS\n\n## Operators\n\n```ts\nof(1).pipe(map(x => x));\n## Inside\n");
        assert_eq!(kinds(&parsed), vec![DiagnosticKind::UnterminatedFence]);
        assert_eq!(parsed.diagnostics[0].line, Some(5));
        assert_eq!(parsed.guide.chapters.len(), 1);
        assert!(matches!(
            &parsed.guide.chapters[0].blocks[0],
            Block::Code { code, .. } if code.contains("## Inside")
        ));
    }

    #[test]
    fn malformed_headings_reported_and_kept_as_prose() {
        let parsed = parse("# Angular\n\n#NoSpace\n\n####### Seven\n\n## Real\n");
        assert_eq!(
            kinds(&parsed),
            vec![
                DiagnosticKind::MalformedHeading,
                DiagnosticKind::MalformedHeading
            ]
        );
        assert_eq!(parsed.guide.chapters.len(), 1);
        assert_eq!(
            parsed.guide.preamble,
            vec![Block::Prose("#NoSpace\n\n####### Seven".into())]
        );
    }

    #[test]
    fn empty_heading_reported() {
        let parsed = parse("# Title\n\n##\n\n## ##\n");
        assert_eq!(
            kinds(&parsed),
            vec![DiagnosticKind::EmptyHeading, DiagnosticKind::EmptyHeading]
        );
        assert!(parsed.guide.chapters.is_empty());
    }

    #[test]
    fn duplicate_headings_get_unique_anchors() {
        let parsed = parse("# Clean Code\n\n## Example\n\n## Example\n\n## example\n");
        let anchors: Vec<&str> = parsed
            .guide
            .chapters
            .iter()
            .map(|c| c.anchor.as_str())
            .collect();
        assert_eq!(anchors, vec!["example", "example-1", "example-2"]);
        assert_eq!(
            kinds(&parsed),
            vec![
                DiagnosticKind::DuplicateHeading,
                DiagnosticKind::DuplicateHeading
            ]
        );
    }

    #[test]
    fn explicit_anchor_and_closing_hashes() {
        let parsed = parse("# T\n\n## Async values {#async-value}\n\n### C# ###\n\n### C#\n");
        let chapters = &parsed.guide.chapters;
        assert_eq!(chapters[0].anchor.as_str(), "async-value");
        assert!(chapters[0].explicit_anchor);
        assert_eq!(chapters[0].title, "Async values");
        assert_eq!(chapters[1].title, "C#");
        assert_eq!(chapters[2].title, "C#");
        assert_eq!(chapters[2].anchor.as_str(), "c-1");
    }

    #[test]
    fn later_h1_demoted() {
        let parsed = parse("# Guide\n\n# Another Top\n\ntext\n");
        assert_eq!(parsed.guide.title, "Guide");
        assert_eq!(parsed.guide.chapters[0].level, 2);
        assert_eq!(kinds(&parsed), vec![DiagnosticKind::DemotedHeading]);
        assert_eq!(parsed.diagnostics[0].severity, Severity::Info);
    }

    #[test]
    fn h1_after_other_heading_is_a_chapter() {
        let parsed = parse("## First\n\n# Late Title\n");
        assert_eq!(parsed.guide.title, "Riverpod");
        assert_eq!(parsed.guide.chapters.len(), 2);
    }

    #[test]
    fn frontmatter_overrides_title_slug_and_order() {
        let parsed = parse(
            "---\ntitle: Riverpod State Management\nslug: state\norder: 1\n---\n# Riverpod\n\n## Providers\n",
        );
        let guide = &parsed.guide;
        assert_eq!(guide.title, "Riverpod State Management");
        assert_eq!(guide.slug, "state");
        assert_eq!(guide.order, Some(1));
        // Line numbers account for the frontmatter block.
        assert_eq!(guide.chapters[0].line, 8);
    }

    #[test]
    fn invalid_frontmatter_is_reported_and_ignored() {
        let parsed = parse("---\norder: soon\n---\n# Riverpod\n");
        assert_eq!(kinds(&parsed), vec![DiagnosticKind::InvalidFrontMatter]);
        assert_eq!(parsed.guide.order, None);
        assert_eq!(parsed.guide.title, "Riverpod");
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        let parsed = parse_guide("## Only chapters\n", &ParseOptions::new("clean-code.md"));
        assert_eq!(parsed.guide.title, "Clean Code");
        assert_eq!(parsed.guide.slug, "clean-code");
    }

    #[test]
    fn heading_inline_markup_stripped_from_title() {
        let parsed = parse("# G\n\n## Using `ref.watch` with **care** and [links](#x)\n");
        let chapter = &parsed.guide.chapters[0];
        assert_eq!(chapter.title, "Using ref.watch with care and links");
        assert_eq!(
            chapter.heading,
            "Using `ref.watch` with **care** and [links](#x)"
        );
        assert_eq!(chapter.anchor.as_str(), "using-refwatch-with-care-and-links");
    }

    #[test]
    fn deeply_indented_hash_is_prose() {
        let parsed = parse("# G\n\n    # indented code\n");
        assert!(parsed.guide.chapters.is_empty());
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn content_hash_covers_raw_text() {
        let a = parse("# A\n");
        let b = parse("# A\n\n");
        assert_ne!(a.guide.content_hash, b.guide.content_hash);
        assert_eq!(a.guide.content_hash, sha256_hex("# A\n"));
    }

    #[test]
    fn title_from_stem_capitalizes() {
        assert_eq!(title_from_stem("guides/angular_basics.md"), "Angular Basics");
        assert_eq!(title_from_stem("rxjs.md"), "Rxjs");
    }
}
