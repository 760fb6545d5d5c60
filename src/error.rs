// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any request was made
    #[error("{0}")]
    Validation(String),

    /// The service answered with a non-2xx status
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// The request never completed (DNS, connect, read failure)
    #[error("network error: {0}")]
    Network(String),

    /// A 2xx response carried a body we could not decode
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Non-2xx response: prefer the structured `detail` from the body,
    /// fall back to a message embedding the status code.
    pub fn remote(status: u16, detail: Option<String>) -> Self {
        let message = match detail {
            Some(detail) if !detail.trim().is_empty() => detail,
            _ => format!("request failed with status {status}"),
        };
        Error::Remote { status, message }
    }
}
