//! Cleanup passes for Markdown text.
//!
//! Each pass is a function `&str -> String`. [`run_pipeline`] applies the full
//! sequence to Markdown converted from HTML; [`clean_prose`] applies the
//! lighter subset used on authored prose blocks.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on Markdown converted from HTML.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.to_string();

    result = clean_blank_lines(&result);
    result = fix_code_block_languages(&result);
    result = strip_leftover_html(&result);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

/// Normalize an authored prose block: trailing whitespace trimmed, blank-line
/// runs collapsed to one, no leading or trailing blank lines.
pub(crate) fn clean_prose(text: &str) -> String {
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let trimmed = normalize_whitespace(text);
    let collapsed = BLANK_RUN_RE.replace_all(&trimmed, "\n\n");
    collapsed.trim_matches('\n').to_string()
}

/// Strip `language-`, `lang-` and `highlight-` prefixes from a fence info word.
pub(crate) fn normalize_lang(info: &str) -> Option<String> {
    let word = info.split_whitespace().next()?;
    // A backtick would keep the rewritten backtick fence from opening.
    let word = word.split('`').next().unwrap_or(word);
    let word = word.trim_start_matches('{').trim_end_matches('}');
    let word = word.strip_prefix('.').unwrap_or(word);
    let lang = ["language-", "lang-", "highlight-"]
        .iter()
        .find_map(|prefix| word.strip_prefix(prefix))
        .unwrap_or(word);

    if lang.is_empty() {
        None
    } else {
        Some(lang.to_string())
    }
}

// ---------------------------------------------------------------------------
// Pass 1: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Fix code block language hints
// ---------------------------------------------------------------------------

/// Detect and fix code block language hints from class names.
///
/// Handles patterns like `language-js`, `lang-python`, `highlight-rust`.
fn fix_code_block_languages(md: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^```(?:language-|lang-|highlight-)(\w+)").expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(md, "```$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray layout tags that survived the conversion.
///
/// Content inside the tags is kept, and nothing inside code fences is touched.
fn strip_leftover_html(md: &str) -> String {
    let mut result = String::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            result.push_str(line);
            result.push('\n');
            continue;
        }

        if in_code_block {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        result.push_str(&strip_html_tags(line));
        result.push('\n');
    }

    if result.ends_with('\n') {
        result.pop();
    }

    result
}

/// Strip layout HTML tags from a single line, preserving inner text.
fn strip_html_tags(line: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary)(?:\s[^>]*)?>").expect("valid regex")
    });

    HTML_TAG_RE.replace_all(line, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
pub(crate) fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}
