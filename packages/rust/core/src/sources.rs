//! Guide source discovery.
//!
//! Finds guide files in the source directory (non-recursive), loads them and
//! puts them in bundle order: explicitly listed guides first, then the rest by
//! frontmatter `order` and file name.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, instrument, warn};

use docbundle_markdown::frontmatter;
use docbundle_shared::{BuildConfig, Diagnostic, DiagnosticKind, DocBundleError, Result, Severity};

/// How a source is turned into Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Markdown,
    Html,
}

impl SourceKind {
    fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("html" | "htm") => Self::Html,
            _ => Self::Markdown,
        }
    }
}

/// A loaded guide source.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name relative to the source directory.
    pub name: String,
    pub path: PathBuf,
    pub kind: SourceKind,
    pub text: String,
    /// Frontmatter `order`, when present and readable.
    pub order: Option<i64>,
}

/// Discovery settings.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Accepted extensions, lowercase, without the dot.
    pub extensions: Vec<String>,
    /// File names matching any of these are ignored.
    pub exclude: Vec<Regex>,
    /// File names placed first, in this order.
    pub guides: Vec<String>,
}

impl SourceConfig {
    pub fn from_build(config: &BuildConfig) -> Result<Self> {
        Ok(Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            exclude: config.exclude_patterns()?,
            guides: config.guides.clone(),
        })
    }

    fn accepts(&self, name: &str, path: &Path) -> bool {
        let ext_ok = extension(path).is_some_and(|ext| self.extensions.contains(&ext));
        ext_ok && !self.exclude.iter().any(|re| re.is_match(name))
    }
}

/// Sources in bundle order plus diagnostics for the ones that were skipped.
#[derive(Debug, Default)]
pub struct DiscoveredSources {
    pub sources: Vec<SourceFile>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Find and load the guide sources in `dir`.
///
/// A listed guide that does not exist is an error. A source that exists but
/// cannot be read is reported and skipped.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn discover_sources(dir: &Path, config: &SourceConfig) -> Result<DiscoveredSources> {
    if !dir.is_dir() {
        return Err(DocBundleError::validation(format!(
            "source directory not found: {}",
            dir.display()
        )));
    }

    let mut found = DiscoveredSources::default();

    // Explicitly listed guides, in the given order.
    let mut listed: HashSet<&str> = HashSet::new();
    for name in &config.guides {
        let path = dir.join(name);
        if !path.is_file() {
            return Err(DocBundleError::validation(format!(
                "listed guide not found: {}",
                path.display()
            )));
        }
        if !listed.insert(name.as_str()) {
            warn!(guide = %name, "guide listed twice; keeping the first position");
            continue;
        }
        load_into(&mut found, name, path);
    }

    // Everything else in the directory.
    let entries = std::fs::read_dir(dir).map_err(|e| DocBundleError::io(dir, e))?;
    let mut rest = DiscoveredSources::default();
    for entry in entries {
        let entry = entry.map_err(|e| DocBundleError::io(dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };

        if name.starts_with('.') || !path.is_file() || listed.contains(name.as_str()) {
            continue;
        }
        if !config.accepts(&name, &path) {
            debug!(file = %name, "not a guide source");
            continue;
        }
        load_into(&mut rest, &name, path);
    }

    rest.sources.sort_by(|a, b| {
        (a.order.is_none(), a.order, &a.name).cmp(&(b.order.is_none(), b.order, &b.name))
    });
    rest.diagnostics.sort_by(|a, b| a.source.cmp(&b.source));

    found.sources.extend(rest.sources);
    found.diagnostics.extend(rest.diagnostics);

    debug!(
        sources = found.sources.len(),
        skipped = found.diagnostics.len(),
        "sources discovered"
    );
    Ok(found)
}

/// Read one source, recording a diagnostic when it cannot be loaded.
fn load_into(found: &mut DiscoveredSources, name: &str, path: PathBuf) {
    match load_source(name, path) {
        Ok(source) => found.sources.push(source),
        Err(e) => {
            warn!(file = %name, error = %e, "skipping unreadable source");
            found.diagnostics.push(Diagnostic::new(
                Severity::Warning,
                DiagnosticKind::SkippedSource,
                name,
                format!("source skipped: {e}"),
            ));
        }
    }
}

fn load_source(name: &str, path: PathBuf) -> Result<SourceFile> {
    let text = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            DocBundleError::parse(format!("{name} is not valid UTF-8"))
        } else {
            DocBundleError::io(&path, e)
        }
    })?;

    let kind = SourceKind::from_path(&path);
    let order = match kind {
        SourceKind::Markdown => frontmatter::split(&text)
            .raw
            .and_then(|raw| frontmatter::parse(raw).ok())
            .and_then(|fm| fm.order),
        SourceKind::Html => None,
    };

    Ok(SourceFile {
        name: name.to_string(),
        path,
        kind,
        text,
        order,
    })
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
