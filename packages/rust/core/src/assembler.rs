//! Output directory assembler.
//!
//! Takes rendered artifacts and the TOC, writes them into the output
//! directory, and records everything in `manifest.json`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use docbundle_artifacts::Artifact;
use docbundle_shared::{
    BuildId, Bundle, BundleManifest, CURRENT_SCHEMA_VERSION, DocBundleError, GuideRecord,
    OutputRecord, Result, Toc, sha256_hex,
};

pub const MANIFEST_FILENAME: &str = "manifest.json";
pub const TOC_FILENAME: &str = "toc.json";

/// Configuration for assembly.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Directory the bundle is written to.
    pub output_dir: PathBuf,
    /// Tool version string recorded in the manifest.
    pub tool_version: String,
}

/// Output from a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    pub output_dir: PathBuf,
    /// Files whose content changed (or were new) and were written.
    pub written: Vec<String>,
    /// Files already on disk with identical content.
    pub unchanged: Vec<String>,
    /// Files from the previous build that are no longer produced.
    pub pruned: Vec<String>,
    /// The manifest now on disk.
    pub manifest: BundleManifest,
}

/// Write a bundle's outputs.
///
/// Creates the following layout:
/// ```text
/// <output_dir>/
/// ├── index.html, <guide>.html, style.css   (html)
/// ├── bundle.md                             (markdown)
/// ├── toc.json
/// └── manifest.json
/// ```
///
/// Each file is written atomically, and only when its bytes differ from what
/// is already on disk. Files listed in the previous manifest that this build
/// no longer produces are removed.
#[instrument(skip_all, fields(out = %config.output_dir.display(), artifacts = artifacts.len()))]
pub fn assemble(
    config: &AssembleConfig,
    artifacts: &[Artifact],
    bundle: &Bundle,
    toc: &Toc,
) -> Result<AssembleResult> {
    let out = &config.output_dir;
    std::fs::create_dir_all(out).map_err(|e| DocBundleError::io(out, e))?;

    let previous = read_manifest(out).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable previous manifest");
        None
    });

    let toc_artifact = Artifact::new(TOC_FILENAME, to_json(toc)?);

    let mut written = Vec::new();
    let mut unchanged = Vec::new();
    let mut outputs = Vec::with_capacity(artifacts.len() + 1);

    for artifact in artifacts.iter().chain(std::iter::once(&toc_artifact)) {
        check_filename(&artifact.filename)?;
        if write_if_changed(&out.join(&artifact.filename), &artifact.content)? {
            written.push(artifact.filename.clone());
        } else {
            unchanged.push(artifact.filename.clone());
        }
        outputs.push(OutputRecord {
            filename: artifact.filename.clone(),
            sha256: artifact.sha256(),
            size_bytes: artifact.size_bytes(),
        });
    }

    let pruned = match &previous {
        Some(prev) => prune_stale(out, prev, &outputs)?,
        None => vec![],
    };

    let guides: Vec<GuideRecord> = bundle.guides.iter().map(GuideRecord::from).collect();
    let manifest = match previous {
        Some(prev) if manifest_matches(&prev, bundle, config, &guides, &outputs) => {
            unchanged.push(MANIFEST_FILENAME.to_string());
            prev
        }
        _ => {
            let manifest = BundleManifest {
                schema_version: CURRENT_SCHEMA_VERSION,
                build_id: BuildId::new(),
                title: bundle.title.clone(),
                tool_version: config.tool_version.clone(),
                generated_at: Utc::now(),
                guides,
                outputs,
            };
            write_atomic(&out.join(MANIFEST_FILENAME), &to_json(&manifest)?)?;
            written.push(MANIFEST_FILENAME.to_string());
            manifest
        }
    };

    info!(
        written = written.len(),
        unchanged = unchanged.len(),
        pruned = pruned.len(),
        path = %out.display(),
        "assembly complete"
    );

    Ok(AssembleResult {
        output_dir: out.clone(),
        written,
        unchanged,
        pruned,
        manifest,
    })
}

/// Read `manifest.json` from an output directory, if there is one.
pub fn read_manifest(dir: &Path) -> Result<Option<BundleManifest>> {
    let path = dir.join(MANIFEST_FILENAME);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| DocBundleError::io(&path, e))?;
    let manifest = serde_json::from_str(&content)
        .map_err(|e| DocBundleError::validation(format!("invalid {MANIFEST_FILENAME}: {e}")))?;
    Ok(Some(manifest))
}

/// Verify that an output directory is well-formed.
///
/// Checks that the manifest and TOC are present and parse, the schema version
/// is supported, and every recorded output exists with a matching checksum.
pub fn validate_output(dir: &Path) -> Result<BundleManifest> {
    let manifest = read_manifest(dir)?
        .ok_or_else(|| DocBundleError::validation(format!("missing {MANIFEST_FILENAME}")))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(DocBundleError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    let toc_path = dir.join(TOC_FILENAME);
    if !toc_path.exists() {
        return Err(DocBundleError::validation(format!("missing {TOC_FILENAME}")));
    }
    let toc_content =
        std::fs::read_to_string(&toc_path).map_err(|e| DocBundleError::io(&toc_path, e))?;
    serde_json::from_str::<Toc>(&toc_content)
        .map_err(|e| DocBundleError::validation(format!("invalid {TOC_FILENAME}: {e}")))?;

    for output in &manifest.outputs {
        let path = dir.join(&output.filename);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocBundleError::validation(format!("missing output {}", output.filename))
            } else {
                DocBundleError::io(&path, e)
            }
        })?;
        if sha256_hex(&content) != output.sha256 {
            return Err(DocBundleError::validation(format!(
                "checksum mismatch for {}",
                output.filename
            )));
        }
    }

    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Output names must stay inside the output directory.
fn check_filename(name: &str) -> Result<()> {
    let plain = Path::new(name)
        .file_name()
        .is_some_and(|f| f == std::ffi::OsStr::new(name));
    if !plain || name.starts_with('.') || name == MANIFEST_FILENAME {
        return Err(DocBundleError::Render(format!(
            "invalid output file name: {name}"
        )));
    }
    Ok(())
}

/// Write `content` unless the file already holds exactly these bytes.
/// Returns whether the file was written.
fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = std::fs::read(path) {
        if existing == content.as_bytes() {
            debug!(path = %path.display(), "unchanged, not rewritten");
            return Ok(false);
        }
    }
    write_atomic(path, content)?;
    Ok(true)
}

/// Write to a temp file next to the target, then rename over it.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DocBundleError::Render(format!("invalid output path {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| DocBundleError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| DocBundleError::io(path, e))?;

    debug!(path = %path.display(), size = content.len(), "wrote file");
    Ok(())
}

/// Remove files the previous build produced that this build does not.
fn prune_stale(dir: &Path, previous: &BundleManifest, outputs: &[OutputRecord]) -> Result<Vec<String>> {
    let current: HashSet<&str> = outputs.iter().map(|o| o.filename.as_str()).collect();
    let mut pruned = Vec::new();

    for old in &previous.outputs {
        if current.contains(old.filename.as_str()) {
            continue;
        }
        if check_filename(&old.filename).is_err() {
            warn!(file = %old.filename, "not pruning suspicious manifest entry");
            continue;
        }

        let path = dir.join(&old.filename);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(file = %old.filename, "pruned stale output");
                pruned.push(old.filename.clone());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DocBundleError::io(&path, e)),
        }
    }

    Ok(pruned)
}

fn manifest_matches(
    prev: &BundleManifest,
    bundle: &Bundle,
    config: &AssembleConfig,
    guides: &[GuideRecord],
    outputs: &[OutputRecord],
) -> bool {
    prev.schema_version == CURRENT_SCHEMA_VERSION
        && prev.title == bundle.title
        && prev.tool_version == config.tool_version
        && prev.guides == guides
        && prev.outputs == outputs
}

/// Pretty JSON with a trailing newline.
fn to_json<T: serde::Serialize>(data: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(data)
        .map_err(|e| DocBundleError::Render(format!("JSON serialization failed: {e}")))?;
    json.push('\n');
    Ok(json)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use docbundle_shared::{Guide, TocEntry};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "docbundle-assembler-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn make_config(output_dir: &Path) -> AssembleConfig {
        AssembleConfig {
            output_dir: output_dir.into(),
            tool_version: "0.1.0-test".into(),
        }
    }

    fn make_bundle() -> Bundle {
        Bundle {
            title: "Frontend Guides".into(),
            guides: vec![Guide {
                slug: "rxjs".into(),
                title: "RxJS".into(),
                source: "rxjs.md".into(),
                order: None,
                preamble: vec![],
                chapters: vec![],
                content_hash: sha256_hex("# RxJS\n"),
            }],
        }
    }

    fn make_toc() -> Toc {
        Toc {
            entries: vec![TocEntry {
                title: "RxJS".into(),
                guide: "rxjs".into(),
                anchor: None,
                level: 0,
                children: vec![],
            }],
        }
    }

    fn make_artifacts() -> Vec<Artifact> {
        vec![
            Artifact::new("rxjs.html", "<h1>RxJS</h1>\n"),
            Artifact::new("bundle.md", "# Frontend Guides\n"),
        ]
    }

    #[test]
    fn assemble_writes_outputs_toc_and_manifest() {
        let tmp = temp_dir();
        let result = assemble(&make_config(&tmp), &make_artifacts(), &make_bundle(), &make_toc()).unwrap();

        assert!(tmp.join("rxjs.html").exists());
        assert!(tmp.join("bundle.md").exists());
        assert!(tmp.join(TOC_FILENAME).exists());
        assert_eq!(
            result.written,
            vec!["rxjs.html", "bundle.md", TOC_FILENAME, MANIFEST_FILENAME]
        );

        let manifest = read_manifest(&tmp).unwrap().unwrap();
        assert_eq!(manifest.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(manifest.title, "Frontend Guides");
        assert_eq!(manifest.guides.len(), 1);
        assert_eq!(manifest.outputs.len(), 3);
        assert_eq!(manifest.outputs[0].sha256, sha256_hex("<h1>RxJS</h1>\n"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unchanged_outputs_are_not_rewritten() {
        let tmp = temp_dir();
        let config = make_config(&tmp);
        let first = assemble(&config, &make_artifacts(), &make_bundle(), &make_toc()).unwrap();
        let second = assemble(&config, &make_artifacts(), &make_bundle(), &make_toc()).unwrap();

        assert!(second.written.is_empty());
        assert_eq!(second.unchanged.len(), 4);
        assert_eq!(first.manifest.build_id, second.manifest.build_id);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn changed_output_rewritten_alone() {
        let tmp = temp_dir();
        let config = make_config(&tmp);
        assemble(&config, &make_artifacts(), &make_bundle(), &make_toc()).unwrap();

        let mut artifacts = make_artifacts();
        artifacts[1] = Artifact::new("bundle.md", "# Frontend Guides\n\nUpdated.\n");
        let result = assemble(&config, &artifacts, &make_bundle(), &make_toc()).unwrap();

        assert_eq!(result.written, vec!["bundle.md", MANIFEST_FILENAME]);
        assert!(result.unchanged.contains(&"rxjs.html".to_string()));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn stale_outputs_are_pruned() {
        let tmp = temp_dir();
        let config = make_config(&tmp);
        assemble(&config, &make_artifacts(), &make_bundle(), &make_toc()).unwrap();

        let only_html = vec![Artifact::new("rxjs.html", "<h1>RxJS</h1>\n")];
        let result = assemble(&config, &only_html, &make_bundle(), &make_toc()).unwrap();

        assert_eq!(result.pruned, vec!["bundle.md"]);
        assert!(!tmp.join("bundle.md").exists());
        assert!(validate_output(&tmp).is_ok());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let tmp = temp_dir();
        assemble(&make_config(&tmp), &make_artifacts(), &make_bundle(), &make_toc()).unwrap();

        for entry in std::fs::read_dir(&tmp).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_paths_outside_output_dir() {
        let tmp = temp_dir();
        let artifacts = vec![Artifact::new("../escape.html", "x")];
        let err = assemble(&make_config(&tmp), &artifacts, &make_bundle(), &make_toc()).unwrap_err();
        assert!(err.to_string().contains("invalid output file name"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn validate_output_detects_tampering() {
        let tmp = temp_dir();
        assemble(&make_config(&tmp), &make_artifacts(), &make_bundle(), &make_toc()).unwrap();
        assert!(validate_output(&tmp).is_ok());

        std::fs::write(tmp.join("rxjs.html"), "edited").unwrap();
        let err = validate_output(&tmp).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch for rxjs.html"));

        std::fs::remove_file(tmp.join("rxjs.html")).unwrap();
        let err = validate_output(&tmp).unwrap_err();
        assert!(err.to_string().contains("missing output rxjs.html"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn validate_output_missing_manifest() {
        let tmp = temp_dir();
        let err = validate_output(&tmp).unwrap_err();
        assert!(err.to_string().contains("missing manifest.json"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
