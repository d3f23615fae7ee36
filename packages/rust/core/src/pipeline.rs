//! End-to-end `build` pipeline: sources → parse → TOC → check → render → assemble.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument, warn};

use docbundle_artifacts::{Artifact, render_combined, render_site};
use docbundle_markdown::{AnchorSet, ParseOptions, html_to_markdown, parse_guide};
use docbundle_shared::{
    BuildConfig, Bundle, Diagnostic, DiagnosticKind, DocBundleError, EmitFormat, Guide, Result,
    Severity, Toc, sha256_hex,
};

use crate::assembler::{self, AssembleConfig};
use crate::check::{CheckReport, check_bundle};
use crate::sources::{SourceConfig, SourceFile, SourceKind, discover_sources};
use crate::toc::build_toc;
use crate::update::{GuideDiff, diff_guides};

/// Guide slugs that would collide with fixed site files.
const RESERVED_SLUGS: [&str; 1] = ["index"];

/// A parsed bundle plus everything reported while loading it.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub bundle: Bundle,
    /// Discovery and parse diagnostics, in source order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of the `build` pipeline.
#[derive(Debug)]
pub struct BuildResult {
    /// Directory the bundle was written to.
    pub output_dir: PathBuf,
    /// Number of guides in the bundle.
    pub guide_count: usize,
    /// Number of chapters across all guides.
    pub chapter_count: usize,
    /// Files written by this build.
    pub written: Vec<String>,
    /// Files left untouched because their content did not change.
    pub unchanged: Vec<String>,
    /// Stale files removed from the output directory.
    pub pruned: Vec<String>,
    /// Guide changes since the previous build.
    pub diff: GuideDiff,
    /// Every diagnostic raised during the build.
    pub report: CheckReport,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a guide source has been parsed.
    fn guide_parsed(&self, source: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn guide_parsed(&self, _source: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Discover and parse every guide source. Nothing is written.
pub fn load_bundle(config: &BuildConfig) -> Result<LoadedBundle> {
    load_with_progress(config, &SilentProgress)
}

/// Load the bundle, build its TOC and run the bundle checks.
///
/// The report holds the load diagnostics followed by the check results.
pub fn check_sources(config: &BuildConfig) -> Result<(LoadedBundle, Toc, CheckReport)> {
    let loaded = load_bundle(config)?;
    let toc = build_toc(&loaded.bundle, config.toc_depth);
    let report = full_report(&loaded, &toc);
    Ok((loaded, toc, report))
}

/// Run the full `build` pipeline.
///
/// 1. Discover and parse sources
/// 2. Build TOC
/// 3. Check the bundle (stops on errors, or on warnings when strict)
/// 4. Render the selected outputs
/// 5. Assemble the output directory
#[instrument(skip_all, fields(src = %config.source_dir.display(), out = %config.output_dir.display()))]
pub fn build_bundle(config: &BuildConfig, progress: &dyn ProgressReporter) -> Result<BuildResult> {
    let start = Instant::now();
    info!(title = %config.title, "starting build pipeline");

    let previous = assembler::read_manifest(&config.output_dir).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable previous manifest");
        None
    });

    // --- Phase 1: Sources ---
    progress.phase("Loading guides");
    let loaded = load_with_progress(config, progress)?;

    // --- Phase 2: TOC ---
    progress.phase("Building table of contents");
    let toc = build_toc(&loaded.bundle, config.toc_depth);

    // --- Phase 3: Checks ---
    progress.phase("Checking bundle");
    let report = full_report(&loaded, &toc);
    if report.has_errors(config.strict) {
        return Err(blocking_error(&report, config.strict));
    }

    // --- Phase 4: Render ---
    progress.phase("Rendering outputs");
    let bundle = &loaded.bundle;
    let mut artifacts: Vec<Artifact> = Vec::new();
    if config.emits(EmitFormat::Html) {
        artifacts.extend(render_site(bundle, &toc));
    }
    if config.emits(EmitFormat::Markdown) {
        artifacts.push(render_combined(bundle, &toc));
    }

    // --- Phase 5: Assemble ---
    progress.phase("Writing output");
    let assemble_config = AssembleConfig {
        output_dir: config.output_dir.clone(),
        tool_version: config.tool_version.clone(),
    };
    let assembled = assembler::assemble(&assemble_config, &artifacts, bundle, &toc)?;

    let result = BuildResult {
        output_dir: assembled.output_dir,
        guide_count: bundle.guides.len(),
        chapter_count: bundle.guides.iter().map(|g| g.chapters.len()).sum(),
        written: assembled.written,
        unchanged: assembled.unchanged,
        pruned: assembled.pruned,
        diff: diff_guides(previous.as_ref(), bundle),
        report,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        guides = result.guide_count,
        chapters = result.chapter_count,
        written = result.written.len(),
        unchanged = result.unchanged.len(),
        pruned = result.pruned.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "build pipeline complete"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[instrument(skip_all, fields(src = %config.source_dir.display()))]
fn load_with_progress(config: &BuildConfig, progress: &dyn ProgressReporter) -> Result<LoadedBundle> {
    config.validate()?;

    let source_config = SourceConfig::from_build(config)?;
    let discovered = discover_sources(&config.source_dir, &source_config)?;
    let mut diagnostics = discovered.diagnostics;

    let mut slugs = AnchorSet::new();
    for reserved in RESERVED_SLUGS {
        slugs.claim(reserved);
    }

    let total = discovered.sources.len();
    let mut guides: Vec<Guide> = Vec::with_capacity(total);

    for (i, source) in discovered.sources.iter().enumerate() {
        let Some((mut guide, parse_diagnostics)) = parse_source(source, &mut diagnostics) else {
            continue;
        };
        diagnostics.extend(parse_diagnostics);

        let slug = slugs.claim(&guide.slug);
        if slug.as_str() != guide.slug {
            warn!(source = %source.name, slug = %guide.slug, renamed = %slug, "duplicate guide slug");
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                DiagnosticKind::DuplicateGuideSlug,
                &source.name,
                format!("guide slug '{}' already taken; using '{slug}'", guide.slug),
            ));
            guide.slug = slug.as_str().to_string();
        }

        progress.guide_parsed(&source.name, i + 1, total);
        guides.push(guide);
    }

    if guides.is_empty() {
        return Err(DocBundleError::validation(format!(
            "no usable guide sources in {}",
            config.source_dir.display()
        )));
    }

    info!(guides = guides.len(), diagnostics = diagnostics.len(), "bundle loaded");

    Ok(LoadedBundle {
        bundle: Bundle {
            title: config.title.clone(),
            guides,
        },
        diagnostics,
    })
}

/// Parse one source. HTML is converted to Markdown first; a failed
/// conversion is reported and the source skipped.
fn parse_source(
    source: &SourceFile,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<(Guide, Vec<Diagnostic>)> {
    let opts = ParseOptions::new(&source.name);
    match source.kind {
        SourceKind::Markdown => {
            let parsed = parse_guide(&source.text, &opts);
            Some((parsed.guide, parsed.diagnostics))
        }
        SourceKind::Html => match html_to_markdown(&source.text) {
            Ok(markdown) => {
                let mut parsed = parse_guide(&markdown, &opts);
                parsed.guide.content_hash = sha256_hex(&source.text);
                Some((parsed.guide, parsed.diagnostics))
            }
            Err(e) => {
                warn!(source = %source.name, error = %e, "conversion failed, skipping source");
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    DiagnosticKind::SkippedSource,
                    &source.name,
                    format!("source skipped: {e}"),
                ));
                None
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

fn full_report(loaded: &LoadedBundle, toc: &Toc) -> CheckReport {
    let mut report = CheckReport::new(loaded.diagnostics.clone());
    report.extend(check_bundle(&loaded.bundle, toc).diagnostics);
    report
}

fn blocking_error(report: &CheckReport, strict: bool) -> DocBundleError {
    let threshold = if strict {
        Severity::Warning
    } else {
        Severity::Error
    };
    let blocking: Vec<String> = report
        .sorted()
        .into_iter()
        .filter(|d| d.severity >= threshold)
        .map(|d| format!("  {d}"))
        .collect();

    DocBundleError::validation(format!(
        "build stopped by {} diagnostic(s):\n{}",
        blocking.len(),
        blocking.join("\n")
    ))
}
