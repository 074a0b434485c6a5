mod block;
mod config;
mod css;
mod document;
mod dom;
mod error;
mod markdown;
mod parser;
mod render;
mod typst;

pub use block::{Alignment, Block, LinkTarget, List, ListItem, Span, Table};
pub use config::{Config, FontConfig, PathsConfig};
pub use document::{STYLESHEET, assemble};
pub use error::{Error, Result};
pub use markdown::markdown_to_html;
pub use render::{document_text, html_to_pdf, html_to_typst, layout};

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Read a Markdown file into memory.
pub fn load(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Convert Markdown to a styled HTML document.
pub fn markdown_to_document(markdown: &str) -> String {
    assemble(&markdown_to_html(markdown))
}

/// Convert Markdown to PDF bytes.
pub fn markdown_to_pdf(markdown: &str, config: &Config) -> Result<Vec<u8>> {
    html_to_pdf(&markdown_to_document(markdown), config)
}

/// Write PDF bytes to `path`, replacing any existing file.
///
/// The bytes go to a temporary file next to `path` which is then renamed
/// over it, so `path` is never left half written.
pub fn write_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_error = |source: io::Error| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(bytes).map_err(write_error)?;
    file.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

/// Convert the Markdown file at `input` to a PDF at `output`.
pub fn convert(input: &Path, output: &Path, config: &Config) -> Result<()> {
    let markdown = load(input)?;
    debug!(path = %input.display(), bytes = markdown.len(), "loaded markdown");

    let fragment = markdown_to_html(&markdown);
    debug!(bytes = fragment.len(), "converted markdown to HTML");

    let html = assemble(&fragment);
    let pdf = html_to_pdf(&html, config)?;
    debug!(bytes = pdf.len(), "rendered PDF");

    write_pdf(output, &pdf)?;
    info!(path = %output.display(), "wrote PDF");
    Ok(())
}
