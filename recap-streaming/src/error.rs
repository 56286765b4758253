//! Streaming errors.

use thiserror::Error;

/// Errors that can occur while decoding a response stream.
///
/// Malformed or non-monotonic records are not errors; the decoder skips them.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A record grew past the buffer limit without reaching a boundary.
    #[error("Response record exceeded {limit} bytes")]
    BufferOverflow {
        /// Buffer limit in bytes.
        limit: usize,
    },

    /// The underlying byte stream failed; the message is kept verbatim.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// No data arrived within the read timeout.
    #[error("Timed out waiting for response")]
    Timeout,
}

impl StreamError {
    /// Create an IO error from any displayable cause.
    pub fn io(err: impl std::fmt::Display) -> Self {
        Self::Io(std::io::Error::other(err.to_string()))
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;
