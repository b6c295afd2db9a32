//! Error types for the HTTP listener

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid query parameter: {0}")]
    InvalidQuery(String),
}
