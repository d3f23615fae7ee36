//! Guide source parsing and Markdown normalization.
//!
//! Turns guide sources (Markdown, or HTML converted with `htmd`) into the
//! [`Guide`](docbundle_shared::Guide) model, and renders guides back to
//! canonical Markdown. Content problems are reported as diagnostics; parsing
//! itself never fails.

pub mod anchor;
pub mod canonical;
mod cleanup;
pub mod convert;
pub mod frontmatter;
pub mod links;
mod parse;

pub use anchor::{AnchorSet, slugify};
pub use canonical::canonical_markdown;
pub use convert::html_to_markdown;
pub use links::{Link, LinkTarget, extract_links, rewrite_links};
pub use parse::{ParseOptions, ParsedGuide, parse_guide, plain_heading_text, title_from_stem};
