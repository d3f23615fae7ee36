//! Application configuration for docbundle.
//!
//! User config lives at `~/.docbundle/docbundle.toml`, or wherever `--config`
//! points. CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DocBundleError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docbundle.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docbundle";

/// Deepest heading level a TOC can include.
pub const MAX_TOC_DEPTH: u8 = 6;

// ---------------------------------------------------------------------------
// Config structs (matching docbundle.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Rendering options.
    #[serde(default)]
    pub render: RenderConfig,

    /// Source discovery options.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Output formats the build can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitFormat {
    /// `index.html`, one page per guide, `style.css`.
    Html,
    /// The combined `bundle.md`.
    Markdown,
}

impl std::str::FromStr for EmitFormat {
    type Err = DocBundleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(DocBundleError::config(format!(
                "unknown emit format '{other}': expected 'html' or 'markdown'"
            ))),
        }
    }
}

/// Parse a comma-separated emit list such as `html,markdown`.
pub fn parse_emit_list(list: &str) -> Result<Vec<EmitFormat>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory containing guide sources.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Directory the rendered bundle is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Output formats to emit.
    #[serde(default = "default_emit")]
    pub emit: Vec<EmitFormat>,

    /// Treat warnings as failures in `check`.
    #[serde(default)]
    pub strict: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            emit: default_emit(),
            strict: false,
        }
    }
}

fn default_source_dir() -> String {
    "guides".into()
}
fn default_output_dir() -> String {
    "book".into()
}
fn default_emit() -> Vec<EmitFormat> {
    vec![EmitFormat::Html, EmitFormat::Markdown]
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Bundle title shown on the index page and combined document.
    #[serde(default = "default_title")]
    pub title: String,

    /// Deepest heading level included in the table of contents.
    #[serde(default = "default_toc_depth")]
    pub toc_depth: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            toc_depth: default_toc_depth(),
        }
    }
}

fn default_title() -> String {
    "Guides".into()
}
fn default_toc_depth() -> u8 {
    3
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// File extensions treated as guides.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// File name exclude patterns (regular expressions).
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Explicit guide order (file names relative to the source dir).
    #[serde(default)]
    pub guides: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude: Vec::new(),
            guides: Vec::new(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["md".into(), "markdown".into(), "html".into()]
}

// ---------------------------------------------------------------------------
// Build config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime build configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub emit: Vec<EmitFormat>,
    pub title: String,
    pub toc_depth: u8,
    pub strict: bool,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub guides: Vec<String>,
    pub tool_version: String,
}

impl From<&AppConfig> for BuildConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            source_dir: expand_home(&config.defaults.source_dir),
            output_dir: expand_home(&config.defaults.output_dir),
            emit: config.defaults.emit.clone(),
            title: config.render.title.clone(),
            toc_depth: config.render.toc_depth,
            strict: config.defaults.strict,
            extensions: config.sources.extensions.clone(),
            exclude: config.sources.exclude.clone(),
            guides: config.sources.guides.clone(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl BuildConfig {
    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.toc_depth == 0 || self.toc_depth > MAX_TOC_DEPTH {
            return Err(DocBundleError::config(format!(
                "toc_depth must be between 1 and {MAX_TOC_DEPTH}, got {}",
                self.toc_depth
            )));
        }
        if self.emit.is_empty() {
            return Err(DocBundleError::config("no output formats selected"));
        }
        if self.extensions.is_empty() {
            return Err(DocBundleError::config("no source extensions configured"));
        }
        self.exclude_patterns()?;
        Ok(())
    }

    /// Compile the exclude patterns.
    pub fn exclude_patterns(&self) -> Result<Vec<Regex>> {
        self.exclude
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    DocBundleError::config(format!("invalid exclude pattern '{p}': {e}"))
                })
            })
            .collect()
    }

    pub fn emits(&self, format: EmitFormat) -> bool {
        self.emit.contains(&format)
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docbundle/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocBundleError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docbundle/docbundle.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocBundleError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DocBundleError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocBundleError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(DocBundleError::config(format!(
            "{} already exists; remove it first to regenerate defaults",
            path.display()
        )));
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocBundleError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocBundleError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
