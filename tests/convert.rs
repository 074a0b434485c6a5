use std::fs;

use mdpdf::{Config, Error};
use tempfile::TempDir;

const TITLE_TABLE: &str = "# Title\n\n| A | B |\n|---|---|\n| 1 | 2 |\n";

/// Embedded fonts only, so results do not depend on the host.
fn config() -> Config {
    let mut config = Config::compiled_default();
    config.fonts.system = false;
    config
}

fn words(markdown: &str) -> Vec<String> {
    let html = mdpdf::assemble(&mdpdf::markdown_to_html(markdown));
    let document = mdpdf::layout(&html, &config()).unwrap();
    mdpdf::document_text(&document)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[test]
fn converts_file_to_pdf() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("document.md");
    let output = dir.path().join("document.pdf");
    fs::write(&input, TITLE_TABLE).unwrap();

    mdpdf::convert(&input, &output, &config()).unwrap();

    let bytes = fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn title_and_table_text_is_laid_out() {
    let words = words(TITLE_TABLE);
    for expected in ["Title", "A", "B", "1", "2"] {
        assert!(
            words.iter().any(|w| w == expected),
            "missing {expected:?} in {words:?}"
        );
    }
}

#[test]
fn rendering_is_repeatable() {
    let markdown = "# Report\n\nSome *styled* text with `code`.\n\n- one\n- two\n";
    assert_eq!(words(markdown), words(markdown));
}

#[test]
fn empty_markdown_gives_one_empty_page() {
    let html = mdpdf::assemble(&mdpdf::markdown_to_html(""));
    let document = mdpdf::layout(&html, &config()).unwrap();
    assert_eq!(document.pages.len(), 1);
    assert!(mdpdf::document_text(&document).trim().is_empty());

    let pdf = mdpdf::markdown_to_pdf("", &config()).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn toc_and_raw_html_render() {
    let markdown = "[TOC]\n\n# First\n\n<div>raw & <b>html</b></div>\n\n## Second\n";
    let words = words(markdown);
    assert_eq!(words.iter().filter(|w| *w == "First").count(), 2);
    assert!(words.iter().any(|w| w.contains("<div>")));
}

#[test]
fn unusual_headings_and_links_render() {
    let markdown = "[TOC]\n\n# Area in m²\n\n## Step ½\n\n## 概要\n\n#\n\n\
        See [](#area-in-m²), [above](#概要) and [](#missing).\n\n\
        <!-- hidden -->\n";

    let pdf = mdpdf::markdown_to_pdf(markdown, &config()).unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    let words = words(markdown);
    // Heading, TOC entry and the empty-bodied link
    assert_eq!(words.iter().filter(|w| *w == "Area").count(), 3);
    assert_eq!(words.iter().filter(|w| *w == "Step").count(), 2);
    assert!(!words.iter().any(|w| w.contains("hidden")));
}

#[test]
fn missing_input_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("document.md");
    let output = dir.path().join("document.pdf");

    let err = mdpdf::convert(&input, &output, &config()).unwrap_err();

    assert!(matches!(err, Error::Read { ref path, .. } if *path == input));
    assert!(!output.exists());
}

#[test]
fn existing_output_is_replaced() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("document.md");
    let output = dir.path().join("document.pdf");
    fs::write(&input, "Hello").unwrap();
    fs::write(&output, "stale").unwrap();

    mdpdf::convert(&input, &output, &config()).unwrap();

    let bytes = fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    // Only the PDF remains next to the input
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn unwritable_output_is_a_write_error() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("missing").join("document.pdf");

    let err = mdpdf::write_pdf(&output, b"%PDF-1.7").unwrap_err();

    assert!(matches!(err, Error::Write { .. }));
    assert!(!output.exists());
}

#[test]
fn malformed_html_is_an_html_error() {
    let err = mdpdf::html_to_pdf("<p><em>open</p>", &config()).unwrap_err();
    assert!(matches!(err, Error::Html { .. }));
}
