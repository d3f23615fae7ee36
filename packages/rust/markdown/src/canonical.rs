//! Canonical Markdown rendering of a parsed guide.
//!
//! The output re-parses to the same guide structure, so
//! `canonical(parse(canonical(g))) == canonical(g)`.

use docbundle_shared::{Block, Chapter, Guide};

/// Render a guide back to normalized Markdown.
pub fn canonical_markdown(guide: &Guide) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("# {}", guide.title));
    parts.extend(guide.preamble.iter().map(render_block));

    for chapter in &guide.chapters {
        parts.push(heading_line(chapter));
        parts.extend(chapter.blocks.iter().map(render_block));
    }

    let mut out = parts.join("\n\n");
    out.push('\n');
    out
}

/// The ATX heading line for a chapter.
///
/// Explicit anchors are written back as `{#id}`; derived anchors are left
/// for the parser to derive again.
pub fn heading_line(chapter: &Chapter) -> String {
    let hashes = "#".repeat(usize::from(chapter.level));
    if chapter.explicit_anchor {
        format!("{hashes} {} {{#{}}}", chapter.heading, chapter.anchor)
    } else if chapter.heading.ends_with('#') {
        // A closing sequence keeps a trailing `#` part of the text.
        format!("{hashes} {} {hashes}", chapter.heading)
    } else {
        format!("{hashes} {}", chapter.heading)
    }
}

/// Render one block.
pub fn render_block(block: &Block) -> String {
    match block {
        Block::Prose(text) => text.clone(),
        Block::Code { lang, code } => {
            let fence = fence_for(code);
            let lang = lang.as_deref().unwrap_or("");
            if code.is_empty() {
                format!("{fence}{lang}\n{fence}")
            } else {
                format!("{fence}{lang}\n{code}\n{fence}")
            }
        }
    }
}

/// A backtick fence longer than any backtick run inside `code`.
pub fn fence_for(code: &str) -> String {
    let longest = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}
