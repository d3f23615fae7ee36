//! HTML guide sources to Markdown.
//!
//! HTML guides are reduced to their main content, tables are pre-rendered to
//! Markdown, the rest goes through `htmd`, and the result is cleaned up so it
//! parses like an authored guide.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use docbundle_shared::{DocBundleError, Result};

use crate::cleanup;

/// Tags dropped entirely during conversion.
const SKIP_TAGS: [&str; 8] = [
    "script", "style", "nav", "iframe", "noscript", "svg", "header", "footer",
];

/// Convert an HTML guide to cleaned Markdown.
#[instrument(skip_all, fields(len = html.len()))]
pub fn html_to_markdown(html: &str) -> Result<String> {
    let content_html = extract_content_html(html);
    let content_html = preprocess_tables(&content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    let raw_markdown = converter
        .convert(&content_html)
        .map_err(|e| DocBundleError::Conversion(format!("htmd conversion failed: {e}")))?;

    let cleaned = cleanup::run_pipeline(&raw_markdown);
    debug!(
        raw_len = raw_markdown.len(),
        final_len = cleaned.len(),
        "html converted"
    );
    Ok(cleaned)
}

// ---------------------------------------------------------------------------
// Content extraction
// ---------------------------------------------------------------------------

/// The main content of a page, without surrounding chrome.
fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    for sel_str in ["main", "article", "[role=\"main\"]", ".content", "body"] {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    html.to_string()
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Replace `<table>` elements with Markdown tables before conversion.
fn preprocess_tables(html: &str) -> String {
    let Ok(table_sel) = Selector::parse("table") else {
        return html.to_string();
    };

    let doc = Html::parse_fragment(html);
    let mut result = html.to_string();

    for table in doc.select(&table_sel) {
        let md_table = table_to_markdown(&table);
        result = result.replacen(&table.html(), &md_table, 1);
    }

    result
}

fn table_to_markdown(table: &ElementRef<'_>) -> String {
    let (Ok(tr_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return String::new();
    };

    let rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| cell_text(&cell))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    let render_row = |row: &[String]| {
        let mut cells = row.to_vec();
        cells.resize(col_count, String::new());
        format!("| {} |\n", cells.join(" | "))
    };

    let mut md = String::from("\n\n");
    md.push_str(&render_row(&rows[0]));
    md.push_str(&render_row(&vec!["---".to_string(); col_count]));
    for row in &rows[1..] {
        md.push_str(&render_row(row));
    }
    md.push('\n');
    md
}

/// Cell text on one line, with pipes escaped.
fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_headings_and_paragraphs() {
        let html = "<html><body><main><h1>Angular</h1><p>Components and services.</p></main></body></html>";
        let md = html_to_markdown(html).unwrap();
        assert!(md.contains("# Angular"));
        assert!(md.contains("Components and services."));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn strips_page_chrome() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a></nav>
            <main><h1>RxJS</h1><p>Observables.</p></main>
            <footer><p>Copyright 2024</p></footer>
        </body></html>"#;
        let md = html_to_markdown(html).unwrap();
        assert!(md.contains("Observables."));
        assert!(!md.contains("Copyright 2024"));
        assert!(!md.contains("Home"));
    }

    #[test]
    fn keeps_code_language() {
        let html = r#"<html><body><main>
            <h2>Setup</h2>
            <pre><code class="language-dart">void main() {
  runApp(const App());
}</code></pre>
        </main></body></html>"#;
        let md = html_to_markdown(html).unwrap();
        assert!(md.contains("```dart"));
        assert!(md.contains("runApp(const App());"));
    }

    #[test]
    fn renders_tables() {
        let html = r#"<html><body><main>
            <table>
                <thead><tr><th>Operator</th><th>Kind</th></tr></thead>
                <tbody>
                    <tr><td>map</td><td>transformation</td></tr>
                    <tr><td>filter</td></tr>
                </tbody>
            </table>
        </main></body></html>"#;
        let md = html_to_markdown(html).unwrap();
        assert!(md.contains("| Operator | Kind |"));
        assert!(md.contains("| map | transformation |"));
        assert!(md.contains("filter"));
    }

    #[test]
    fn leftover_layout_tags_removed() {
        let html = r#"<html><body><main>
            <h1>Clean Code</h1>
            <p>Keep <strong>functions</strong> small.</p>
            <div class="note"><p>A note.</p></div>
        </main></body></html>"#;
        let md = html_to_markdown(html).unwrap();
        assert!(!md.contains("<p>"));
        assert!(!md.contains("<div"));
        assert!(md.contains("A note."));
    }

    #[test]
    fn falls_back_to_body() {
        let html = "<html><body><h1>Flutter</h1><p>Widgets all the way down.</p></body></html>";
        let md = html_to_markdown(html).unwrap();
        assert!(md.contains("Flutter"));
        assert!(md.contains("Widgets all the way down."));
    }
}
