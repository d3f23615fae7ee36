//! Core domain types for documentation bundles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Current schema version for the bundle manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Separator between guide slug and chapter anchor in bundle-wide anchors.
pub const QUALIFIED_ANCHOR_SEPARATOR: &str = "--";

// ---------------------------------------------------------------------------
// BuildId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one build run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub Uuid);

impl BuildId {
    /// Generate a new time-sortable build identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BuildId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Anchor
// ---------------------------------------------------------------------------

/// Identifier linking a table-of-contents entry to its chapter heading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Anchor(pub String);

impl Anchor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Anchor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Bundle-wide anchor for a chapter (or the guide itself when `anchor` is `None`).
pub fn qualified_anchor(guide: &str, anchor: Option<&Anchor>) -> String {
    match anchor {
        Some(a) => format!("{guide}{QUALIFIED_ANCHOR_SEPARATOR}{a}"),
        None => guide.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Guide / Chapter / Block
// ---------------------------------------------------------------------------

/// One unit of chapter content, kept in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Markdown prose (paragraphs, lists, tables, quotes).
    Prose(String),
    /// A fenced code illustration. Never interpreted.
    Code { lang: Option<String>, code: String },
}

/// A titled section within a guide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Heading text with inline markup stripped.
    pub title: String,
    /// Heading text as written (inline markup kept).
    pub heading: String,
    /// Heading level after normalization (1..=6).
    pub level: u8,
    /// Unique (within the guide) link target.
    pub anchor: Anchor,
    /// Whether the anchor was given as `{#id}` in the source.
    pub explicit_anchor: bool,
    /// 1-based line of the heading in the source.
    pub line: usize,
    /// Content between this heading and the next one.
    pub blocks: Vec<Block>,
}

/// One top-level documentation file covering a single technology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guide {
    /// Unique (within the bundle) identifier, used for page names and anchors.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Source path relative to the source directory.
    pub source: String,
    /// Explicit position from frontmatter, if any.
    pub order: Option<i64>,
    /// Content before the first chapter.
    pub preamble: Vec<Block>,
    /// Chapters in source order.
    pub chapters: Vec<Chapter>,
    /// SHA-256 of the raw source text.
    pub content_hash: String,
}

impl Guide {
    /// Look up a chapter by anchor.
    pub fn chapter(&self, anchor: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.anchor.as_str() == anchor)
    }

    /// Whether `anchor` names a chapter in this guide.
    pub fn has_anchor(&self, anchor: &str) -> bool {
        self.chapter(anchor).is_some()
    }
}

/// The ordered set of guides built together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub title: String,
    pub guides: Vec<Guide>,
}

impl Bundle {
    pub fn guide(&self, slug: &str) -> Option<&Guide> {
        self.guides.iter().find(|g| g.slug == slug)
    }

    /// Find a guide by its source file name (e.g. `riverpod.md`).
    pub fn guide_by_source(&self, source: &str) -> Option<&Guide> {
        self.guides.iter().find(|g| {
            g.source == source
                || std::path::Path::new(&g.source)
                    .file_name()
                    .is_some_and(|name| name == source)
        })
    }

    /// Resolve the file part of a cross-guide link (`flutter.md`,
    /// `./flutter.html`) to a guide: by source file name first, then by
    /// file stem against guide slugs and source stems.
    pub fn guide_for_link(&self, file: &str) -> Option<&Guide> {
        let file = file.trim_start_matches("./");
        if let Some(guide) = self.guide_by_source(file) {
            return Some(guide);
        }

        let stem = std::path::Path::new(file).file_stem()?.to_str()?;
        self.guides.iter().find(|g| {
            g.slug == stem
                || std::path::Path::new(&g.source)
                    .file_stem()
                    .is_some_and(|s| s == stem)
        })
    }
}

/// SHA-256 hex digest of a string.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// TocEntry
// ---------------------------------------------------------------------------

/// How TOC entries link to their targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// One HTML page per guide: `riverpod.html#providers`.
    Site,
    /// One combined document: `#riverpod--providers`.
    Combined,
}

/// A single entry in the table of contents (`toc.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Display title.
    pub title: String,
    /// Slug of the owning guide.
    pub guide: String,
    /// Chapter anchor; `None` for the guide entry itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
    /// Heading level (0 for guide entries).
    pub level: u8,
    /// Nested child entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    /// Link target for this entry in the given output style.
    pub fn href(&self, style: LinkStyle) -> String {
        match style {
            LinkStyle::Site => match &self.anchor {
                Some(a) => format!("{}.html#{a}", self.guide),
                None => format!("{}.html", self.guide),
            },
            LinkStyle::Combined => {
                format!("#{}", qualified_anchor(&self.guide, self.anchor.as_ref()))
            }
        }
    }
}

/// Root structure for `toc.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    /// One entry per guide, in bundle order.
    pub entries: Vec<TocEntry>,
}

impl Toc {
    /// All entries, depth-first, in document order.
    pub fn flatten(&self) -> Vec<&TocEntry> {
        fn walk<'a>(entries: &'a [TocEntry], out: &mut Vec<&'a TocEntry>) {
            for entry in entries {
                out.push(entry);
                walk(&entry.children, out);
            }
        }

        let mut out = Vec::new();
        walk(&self.entries, &mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// What kind of content problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedHeading,
    EmptyHeading,
    DuplicateHeading,
    DemotedHeading,
    UnterminatedFence,
    InvalidFrontMatter,
    DuplicateGuideSlug,
    SkippedSource,
    BrokenTocEntry,
    BrokenAnchor,
    BrokenGuideLink,
    OrderMismatch,
    NotIdempotent,
}

/// A reported, non-fatal content problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Guide source path, guide slug, or output file name.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        kind: DiagnosticKind,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            source: source.into(),
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "{}: {}:{}: {}",
                self.severity, self.source, line, self.message
            ),
            None => write!(f, "{}: {}: {}", self.severity, self.source, self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// BundleManifest
// ---------------------------------------------------------------------------

/// Per-guide record in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideRecord {
    pub slug: String,
    pub title: String,
    pub source: String,
    pub content_hash: String,
    pub chapter_count: usize,
}

impl From<&Guide> for GuideRecord {
    fn from(guide: &Guide) -> Self {
        Self {
            slug: guide.slug.clone(),
            title: guide.title.clone(),
            source: guide.source.clone(),
            content_hash: guide.content_hash.clone(),
            chapter_count: guide.chapters.len(),
        }
    }
}

/// Per-file record in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// The `manifest.json` structure stored at the root of each output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Identifier of the build that wrote this manifest.
    pub build_id: BuildId,
    /// Bundle title.
    pub title: String,
    /// Tool version that produced the output.
    pub tool_version: String,
    /// When the output was generated.
    pub generated_at: DateTime<Utc>,
    /// Guides in bundle order.
    pub guides: Vec<GuideRecord>,
    /// Files written, with checksums.
    #[serde(default)]
    pub outputs: Vec<OutputRecord>,
}
