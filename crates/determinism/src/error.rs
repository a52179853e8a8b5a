//! Error types for the determinism service and its providers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeterminismError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid determinism service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Determinism service at {url} answered with status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Cannot parse {what} from determinism service reply '{body}'")]
    Malformed { what: &'static str, body: String },

    #[error("Determinism service task failed: {0}")]
    Task(String),
}

pub type DeterminismResult<T> = Result<T, DeterminismError>;
