//! Error types for towel runs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TowelError {
    #[error("Invalid method {0}")]
    InvalidMethod(String),

    #[error("No test suite found at {}", .0.display())]
    MissingTestSuite(PathBuf),

    #[error("Test suite parse error: {0}")]
    DocumentParse(String),

    #[error("Request #{index} is missing the '{attribute}' attribute")]
    MissingAttribute { index: usize, attribute: &'static str },

    #[error("Request #{index} has an invalid '{attribute}' attribute: {value}")]
    InvalidAttribute {
        index: usize,
        attribute: &'static str,
        value: String,
    },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Content-Type '{0}' not supported")]
    UnsupportedContentType(String),

    #[error("Not a valid {content_type} body: {reason}")]
    MalformedBody { content_type: String, reason: String },

    #[error(
        "Expected {expected_status} status with content-type {expected_content_type}, \
         got {actual_status} status with content-type {actual_content_type}"
    )]
    GateMismatch {
        expected_status: u16,
        actual_status: u16,
        expected_content_type: String,
        actual_content_type: String,
    },

    #[error("Setup script {} failed: {reason}", .script.display())]
    SetupActionFailure { script: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TowelResult<T> = Result<T, TowelError>;
