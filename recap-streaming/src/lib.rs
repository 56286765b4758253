//! # recap-streaming
//!
//! Incremental decoding of completion response streams.
//!
//! The completion endpoint answers with Server-Sent Events whose payloads
//! each repeat the whole reply generated so far. This crate turns those raw
//! bytes into the text appended by each record.
//!
//! ## Core Concepts
//!
//! - **[`SseParser`]**: Frame raw bytes into SSE records, across chunk boundaries
//! - **[`StreamDecoder`]**: Extract cumulative text and emit only new suffixes
//! - **[`StreamCursor`]**: Per-stream record of the text already emitted
//! - **[`FragmentStream`]**: `Stream` adapter from a byte stream to fragments
//!
//! ## Example
//!
//! ```rust
//! use recap_streaming::StreamDecoder;
//!
//! let mut decoder = StreamDecoder::new();
//! let chunk = concat!(
//!     r#"data: {"message":{"content":{"parts":["Hel"]}}}"#, "\n\n",
//!     r#"data: {"message":{"content":{"parts":["Hello"]}}}"#, "\n\n",
//! );
//!
//! let fragments = decoder.feed(chunk.as_bytes()).unwrap();
//! let texts: Vec<&str> = fragments.iter().map(|f| f.as_str()).collect();
//! assert_eq!(texts, ["Hel", "lo"]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod decoder;
pub mod error;
pub mod fragment_stream;
pub mod sse;

// Re-exports
pub use decoder::{
    extract_cumulative_text, CursorStep, Envelope, Fragment, StreamCursor, StreamDecoder,
};
pub use error::{StreamError, StreamResult};
pub use fragment_stream::FragmentStream;
pub use sse::{SseEvent, SseParser, DONE_MARKER};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Fragment, FragmentStream, SseEvent, SseParser, StreamDecoder, StreamError, StreamResult,
    };
}
