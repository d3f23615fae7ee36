//! Output renderers for a parsed bundle.
//!
//! - [`html`]: one standalone page per guide, an index page and a stylesheet
//! - [`combined`]: a single `bundle.md` with bundle-wide anchors
//!
//! Renderers are pure: the same bundle always renders to the same bytes.

pub mod combined;
pub mod html;
mod rewrite;

pub use combined::{COMBINED_FILENAME, render_combined};
pub use html::{INDEX_FILENAME, SiteContext, STYLE_FILENAME, render_guide_page, render_index, render_site};

use docbundle_shared::sha256_hex;

/// A rendered output file, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name relative to the output directory.
    pub filename: String,
    pub content: String,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn sha256(&self) -> String {
        sha256_hex(&self.content)
    }

    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }
}

/// Escape text for HTML element content and attribute values.
pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
