//! Optional YAML frontmatter at the top of a guide.

use serde::Deserialize;

use docbundle_shared::{DocBundleError, Result};

/// Keys recognised in guide frontmatter. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    /// Overrides the guide title.
    pub title: Option<String>,
    /// Position within the bundle (lower first).
    pub order: Option<i64>,
    /// Overrides the slug derived from the file name.
    pub slug: Option<String>,
}

/// A source split into its frontmatter block and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    /// YAML between the `---` delimiters, if the source has a frontmatter block.
    pub raw: Option<&'a str>,
    /// Everything after the closing delimiter.
    pub body: &'a str,
    /// Number of source lines before `body` starts.
    pub body_offset: usize,
}

/// Separate a leading `---` ... `---` block from the document body.
///
/// A leading `---` without a closing delimiter is a thematic break, not
/// frontmatter, and the whole text is returned as body.
pub fn split(text: &str) -> Split<'_> {
    let no_frontmatter = Split {
        raw: None,
        body: text,
        body_offset: 0,
    };

    let mut lines = text.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == "---" => {}
        _ => return no_frontmatter,
    }

    let yaml_start = text
        .find('\n')
        .map(|i| i + 1)
        .unwrap_or(text.len());
    let mut offset = yaml_start;
    let mut consumed = 1;

    for line in lines {
        consumed += 1;
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Split {
                raw: Some(&text[yaml_start..offset]),
                body: &text[offset + line.len()..],
                body_offset: consumed,
            };
        }
        offset += line.len();
    }

    no_frontmatter
}

/// Parse the YAML inside a frontmatter block.
pub fn parse(raw: &str) -> Result<FrontMatter> {
    if raw.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    serde_yaml::from_str(raw)
        .map_err(|e| DocBundleError::parse(format!("invalid frontmatter: {e}")))
}
