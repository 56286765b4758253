//! Cumulative-text decoder.
//!
//! The completion endpoint resends the whole assistant reply on every record
//! rather than a delta. [`StreamDecoder`] turns that into a sequence of
//! [`Fragment`]s holding only the newly appended text, so that concatenating
//! every fragment reproduces the final reply.
//!
//! ## Record format
//!
//! Each SSE record carries a JSON envelope; the cumulative text is the first
//! element of `message.content.parts`:
//!
//! ```text
//! data: {"message":{"author":{"role":"assistant"},"content":{"content_type":"text","parts":["Hel"]}}}
//!
//! data: [DONE]
//! ```
//!
//! Envelopes are parsed with a real JSON parser, so quotes, brackets or
//! marker-like text inside the reply are handled correctly. The remaining
//! limitation is structural: if an envelope lacks `message.content.parts`, the
//! decoder falls back to the first `parts` string array found anywhere in the
//! envelope, which could pick up an unrelated field of that name.

use serde_json::Value;
use std::fmt;
use std::ops::Deref;
use tracing::{debug, warn};

use crate::error::StreamResult;
use crate::sse::{SseEvent, SseParser};

/// A piece of newly appended response text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fragment(String);

impl Fragment {
    /// Create a fragment.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Get the text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for Fragment {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fragment> for String {
    fn from(fragment: Fragment) -> Self {
        fragment.0
    }
}

/// Outcome of offering a cumulative text to a [`StreamCursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStep {
    /// The text extends what was emitted; carries the new suffix.
    Appended(Fragment),
    /// Same text as before (or empty).
    Unchanged,
    /// The text does not start with what was already emitted.
    Diverged,
}

/// Tracks the cumulative text already emitted for one stream.
#[derive(Debug, Default, Clone)]
pub struct StreamCursor {
    emitted: String,
}

impl StreamCursor {
    /// Create an empty cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Length in bytes of the text emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    /// Whether nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }

    /// Text emitted so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.emitted
    }

    /// Offer the latest cumulative text.
    ///
    /// On divergence the cursor keeps its previous text, so the concatenation
    /// of emitted fragments always equals [`StreamCursor::text`].
    pub fn advance(&mut self, cumulative: &str) -> CursorStep {
        if cumulative.len() <= self.emitted.len() {
            return if cumulative == self.emitted || cumulative.is_empty() {
                CursorStep::Unchanged
            } else {
                CursorStep::Diverged
            };
        }

        match cumulative.strip_prefix(self.emitted.as_str()) {
            Some(suffix) => {
                let fragment = Fragment::new(suffix);
                self.emitted.push_str(suffix);
                CursorStep::Appended(fragment)
            }
            None => CursorStep::Diverged,
        }
    }

    /// Forget everything emitted.
    pub fn reset(&mut self) {
        self.emitted.clear();
    }
}

/// What a single envelope contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Cumulative assistant text.
    Text(String),
    /// Envelope with no assistant text (metadata, other roles, errors).
    Ignored,
    /// Payload was not JSON.
    Malformed,
}

/// Extract the cumulative assistant text from one record payload.
pub fn extract_cumulative_text(data: &str) -> Envelope {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(_) => return Envelope::Malformed,
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        warn!(target: "recap::decoder", %error, "Completion stream reported an error envelope");
        return Envelope::Ignored;
    }

    if let Some(role) = value.pointer("/message/author/role").and_then(Value::as_str) {
        if role != "assistant" {
            return Envelope::Ignored;
        }
    }

    let parts = value
        .pointer("/message/content/parts")
        .or_else(|| find_parts(&value));

    match parts
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .and_then(Value::as_str)
    {
        Some(text) => Envelope::Text(text.to_string()),
        None => Envelope::Ignored,
    }
}

fn find_parts(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => map
            .get("parts")
            .filter(|parts| parts.is_array())
            .or_else(|| map.values().find_map(find_parts)),
        Value::Array(items) => items.iter().find_map(find_parts),
        _ => None,
    }
}

/// Incremental decoder from raw stream bytes to response fragments.
///
/// One decoder serves one response stream; create a new decoder per request.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    parser: SseParser,
    cursor: StreamCursor,
    done: bool,
    records: usize,
    anomalies: usize,
}

impl StreamDecoder {
    /// Create a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the raw stream.
    ///
    /// Returns the fragments completed by this chunk, in arrival order. An
    /// empty chunk yields no fragments.
    pub fn feed(&mut self, chunk: &[u8]) -> StreamResult<Vec<Fragment>> {
        if self.done {
            return Ok(Vec::new());
        }

        let events = self.parser.feed(chunk)?;
        let mut fragments = Vec::new();
        for event in events {
            if self.done {
                break;
            }
            if let Some(fragment) = self.handle_record(&event) {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    /// Signal the end of the stream.
    ///
    /// An incomplete trailing record is discarded without error.
    pub fn finish(&mut self) {
        let discarded = self.parser.finish();
        if discarded > 0 {
            debug!(
                target: "recap::decoder",
                discarded,
                "Discarding incomplete trailing record"
            );
        }
        self.done = true;
    }

    /// Text emitted so far.
    #[must_use]
    pub fn text(&self) -> &str {
        self.cursor.text()
    }

    /// Whether `[DONE]` was seen or [`StreamDecoder::finish`] was called.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of complete records processed.
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    /// Number of records skipped because their text was not prefix-growing.
    #[must_use]
    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    fn handle_record(&mut self, event: &SseEvent) -> Option<Fragment> {
        self.records += 1;

        if event.is_done() {
            debug!(target: "recap::decoder", records = self.records, "Stream reported completion");
            self.done = true;
            return None;
        }

        let text = match extract_cumulative_text(&event.data) {
            Envelope::Text(text) => text,
            Envelope::Ignored => return None,
            Envelope::Malformed => {
                debug!(
                    target: "recap::decoder",
                    bytes = event.data.len(),
                    "Skipping record that is not JSON"
                );
                return None;
            }
        };

        match self.cursor.advance(&text) {
            CursorStep::Appended(fragment) => Some(fragment),
            CursorStep::Unchanged => None,
            CursorStep::Diverged => {
                self.anomalies += 1;
                warn!(
                    target: "recap::decoder",
                    emitted = self.cursor.len(),
                    received = text.len(),
                    "Cumulative text is not an extension of the emitted text; skipping record"
                );
                None
            }
        }
    }
}
