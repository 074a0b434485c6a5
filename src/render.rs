use tracing::{debug, warn};
use typst_as_lib::TypstEngine;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_library::diag::Warned;
use typst_library::layout::{Frame, FrameItem, PagedDocument};
use typst_pdf::PdfOptions;

use crate::config::Config;
use crate::css::Stylesheet;
use crate::dom::HtmlDocument;
use crate::error::{Error, Result};
use crate::{parser, typst};

/// Convert an HTML document and its embedded CSS to Typst markup.
pub fn html_to_typst(html: &str, config: &Config) -> Result<String> {
    let document = HtmlDocument::parse(html)?;
    let stylesheet = Stylesheet::parse(&document.style);
    let blocks = parser::parse(&document.body);
    debug!(blocks = blocks.len(), "lowered HTML body");

    Ok(typst::blocks_to_typst(&blocks, &stylesheet, &config.fonts))
}

/// Lay an HTML document out into pages.
pub fn layout(html: &str, config: &Config) -> Result<PagedDocument> {
    let markup = html_to_typst(html, config)?;

    let font_options = TypstKitFontOptions::new()
        .include_system_fonts(config.fonts.system)
        .include_embedded_fonts(config.fonts.embedded);

    let engine = TypstEngine::builder()
        .main_file(markup)
        .search_fonts_with(font_options)
        .build();

    let Warned { output, warnings } = engine.compile();
    for warning in &warnings {
        warn!(message = %warning.message, "typst warning");
    }

    let document: PagedDocument = output.map_err(|e| Error::Compile(format!("{:?}", e)))?;
    debug!(pages = document.pages.len(), "laid out document");
    Ok(document)
}

/// Render an HTML document to PDF bytes.
pub fn html_to_pdf(html: &str, config: &Config) -> Result<Vec<u8>> {
    let document = layout(html, config)?;
    typst_pdf::pdf(&document, &PdfOptions::default()).map_err(|e| Error::Pdf(format!("{:?}", e)))
}

/// The text of every page, one shaped run per line.
pub fn document_text(document: &PagedDocument) -> String {
    let mut out = String::new();
    for page in &document.pages {
        frame_text(&page.frame, &mut out);
    }
    out
}

fn frame_text(frame: &Frame, out: &mut String) {
    for (_, item) in frame.items() {
        match item {
            FrameItem::Group(group) => frame_text(&group.frame, out),
            FrameItem::Text(text) => {
                out.push_str(&text.text);
                out.push('\n');
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::assemble;

    fn config() -> Config {
        let mut config = Config::compiled_default();
        config.fonts.system = false;
        config
    }

    #[test]
    fn markup_starts_with_page_setup() {
        let markup = html_to_typst(&assemble("<p>x</p>"), &config()).unwrap();
        assert!(markup.starts_with("#set page(paper: \"a4\""));
        assert!(markup.ends_with("x\n\n"));
    }

    #[test]
    fn html_errors_surface() {
        let err = html_to_typst("<p>unclosed", &config()).unwrap_err();
        assert!(matches!(err, Error::Html { .. }));
    }

    #[test]
    fn text_is_extracted_from_pages() {
        let document = layout(&assemble("<h1 id=\"t\">Heading</h1>\n<p>Body text</p>"), &config())
            .unwrap();
        assert_eq!(document.pages.len(), 1);
        let text = document_text(&document);
        assert!(text.contains("Heading"));
        assert!(text.contains("Body"));
    }
}
