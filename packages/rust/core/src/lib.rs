//! Core pipeline orchestration and domain logic for docbundle.
//!
//! This crate ties together source discovery, guide parsing, TOC building,
//! checks, rendering and output assembly into the end-to-end `build`
//! workflow.

pub mod assembler;
pub mod check;
pub mod pipeline;
pub mod sources;
pub mod toc;
pub mod update;

pub use check::{CheckReport, check_bundle, check_site};
pub use pipeline::{
    BuildResult, LoadedBundle, ProgressReporter, SilentProgress, build_bundle, check_sources,
    load_bundle,
};
