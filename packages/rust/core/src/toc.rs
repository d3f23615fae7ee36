//! TOC (Table of Contents) builder.
//!
//! One top-level entry per guide, in bundle order, with the guide's chapters
//! nested beneath it by heading level. Maps to `toc.json`.

use tracing::{debug, instrument};

use docbundle_shared::{Bundle, Chapter, Guide, Toc, TocEntry};

/// Build the TOC for a bundle.
///
/// A chapter nests under the nearest preceding chapter with a lower level;
/// skipped levels (an H4 straight after an H2) are allowed. Chapters deeper
/// than `max_depth` are left out.
#[instrument(skip_all, fields(guides = bundle.guides.len(), max_depth = max_depth))]
pub fn build_toc(bundle: &Bundle, max_depth: u8) -> Toc {
    let entries: Vec<TocEntry> = bundle
        .guides
        .iter()
        .map(|guide| guide_entry(guide, max_depth))
        .collect();

    debug!(
        entries = entries.len(),
        chapters = entries.iter().map(count_children).sum::<usize>(),
        "TOC built"
    );

    Toc { entries }
}

fn guide_entry(guide: &Guide, max_depth: u8) -> TocEntry {
    let mut root = TocEntry {
        title: guide.title.clone(),
        guide: guide.slug.clone(),
        anchor: None,
        level: 0,
        children: vec![],
    };

    // Chain of open chapters, shallowest first.
    let mut open: Vec<TocEntry> = Vec::new();

    for chapter in guide.chapters.iter().filter(|c| c.level <= max_depth) {
        close_until(&mut root, &mut open, chapter.level);
        open.push(chapter_entry(guide, chapter));
    }
    close_until(&mut root, &mut open, 0);

    root
}

/// Close open entries with `level >= level` into their parents.
fn close_until(root: &mut TocEntry, open: &mut Vec<TocEntry>, level: u8) {
    while open.last().is_some_and(|top| top.level >= level) {
        let Some(done) = open.pop() else { break };
        match open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => root.children.push(done),
        }
    }
}

fn chapter_entry(guide: &Guide, chapter: &Chapter) -> TocEntry {
    TocEntry {
        title: chapter.title.clone(),
        guide: guide.slug.clone(),
        anchor: Some(chapter.anchor.clone()),
        level: chapter.level,
        children: vec![],
    }
}

fn count_children(entry: &TocEntry) -> usize {
    entry
        .children
        .iter()
        .map(|c| 1 + count_children(c))
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
