//! Crate-wide error type.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid result: {0}")]
    InvalidResult(String),

    #[error("failed to read/write model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("malformed model file: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, DetectorError>;
