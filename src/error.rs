use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid HTML at byte {position}: {message}")]
    Html { message: String, position: u64 },

    #[error("Typst compilation failed: {0}")]
    Compile(String),

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
