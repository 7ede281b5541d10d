//! Error types shared by every stage of the book pipelines.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BookcastError>;

#[derive(Error, Debug)]
pub enum BookcastError {
    /// A budget, ratio or other setting is out of range. Raised before any work starts.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to extract text from {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("No {extension} files found in '{dir}'")]
    NoInputFile { dir: PathBuf, extension: String },

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned error status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Audio error: {0}")]
    Audio(#[from] hound::Error),

    #[error("PDF rendering failed: {0}")]
    Render(String),
}

impl BookcastError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn extraction(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration_message() {
        let err = BookcastError::invalid_config("budget must be positive, got 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: budget must be positive, got 0"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BookcastError = io.into();
        assert!(matches!(err, BookcastError::Io(_)));
    }

    #[test]
    fn test_no_input_file_message() {
        let err = BookcastError::NoInputFile {
            dir: PathBuf::from("input_book"),
            extension: ".pdf".to_string(),
        };
        assert_eq!(err.to_string(), "No .pdf files found in 'input_book'");
    }
}
