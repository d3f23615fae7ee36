//! Shared types, error model, and configuration for docbundle.
//!
//! This crate is the foundation depended on by all other docbundle crates.
//! It provides:
//! - [`DocBundleError`]: the unified error type
//! - Domain types ([`Guide`], [`Chapter`], [`Block`], [`Anchor`], [`Toc`], [`BundleManifest`])
//! - Configuration ([`AppConfig`], [`BuildConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, DefaultsConfig, EmitFormat, MAX_TOC_DEPTH, RenderConfig,
    SourcesConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    parse_emit_list,
};
pub use error::{DocBundleError, Result};
pub use types::{
    Anchor, Block, BuildId, Bundle, BundleManifest, CURRENT_SCHEMA_VERSION, Chapter, Diagnostic,
    DiagnosticKind, Guide, GuideRecord, LinkStyle, OutputRecord, QUALIFIED_ANCHOR_SEPARATOR,
    Severity, Toc, TocEntry, qualified_anchor, sha256_hex,
};
