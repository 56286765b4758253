//! Connection status values and the subscriber registry that broadcasts them.
//!
//! Exactly one [`Status`] is current at any time. [`StatusBus::publish`]
//! replaces it and fans the new value out to every live subscriber, in
//! subscription order. Each subscriber owns an unbounded queue, so a slow
//! reader never loses transitions and never blocks the publisher.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::identifier::now_utc;

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    /// No authentication attempt has completed yet.
    Initializing {
        /// When this status became current.
        since: DateTime<Utc>,
    },
    /// A query is in flight.
    Loading {
        /// When this status became current.
        since: DateTime<Utc>,
    },
    /// The last operation succeeded.
    Connected {
        /// When this status became current.
        since: DateTime<Utc>,
    },
    /// The last operation failed.
    Error {
        /// Failure message, surfaced verbatim to consumers.
        message: String,
        /// When this status became current.
        since: DateTime<Utc>,
    },
}

impl Status {
    /// `Initializing` as of now.
    #[must_use]
    pub fn initializing() -> Self {
        Self::Initializing { since: now_utc() }
    }

    /// `Loading` as of now.
    #[must_use]
    pub fn loading() -> Self {
        Self::Loading { since: now_utc() }
    }

    /// `Connected` as of now.
    #[must_use]
    pub fn connected() -> Self {
        Self::Connected { since: now_utc() }
    }

    /// `Error` as of now.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            since: now_utc(),
        }
    }

    /// When this status became current.
    #[must_use]
    pub fn since(&self) -> DateTime<Utc> {
        match self {
            Self::Initializing { since }
            | Self::Loading { since }
            | Self::Connected { since }
            | Self::Error { since, .. } => *since,
        }
    }

    /// Short lowercase name of the state.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing { .. } => "initializing",
            Self::Loading { .. } => "loading",
            Self::Connected { .. } => "connected",
            Self::Error { .. } => "error",
        }
    }

    /// The error message, if this is an error.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Check if this is `Connected`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if this is `Loading`.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Check if this is `Error`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Whether the keepalive should use its short retry period.
    ///
    /// True for `Error` and for `Initializing`, so a process that has never
    /// authenticated retries quickly.
    #[must_use]
    pub fn needs_fast_retry(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Initializing { .. })
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::initializing()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { message, .. } => write!(f, "error: {}", message),
            other => f.write_str(other.label()),
        }
    }
}

/// Identifier of one status subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Numeric value of the id.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug)]
struct BusState {
    current: Status,
    subscribers: IndexMap<SubscriptionId, mpsc::UnboundedSender<Status>>,
    next_id: u64,
}

/// Registry of status subscribers plus the current status.
#[derive(Debug)]
pub struct StatusBus {
    state: Mutex<BusState>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBus {
    /// Create a bus whose current status is `Initializing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_status(Status::initializing())
    }

    /// Create a bus with an explicit initial status.
    #[must_use]
    pub fn with_status(initial: Status) -> Self {
        Self {
            state: Mutex::new(BusState {
                current: initial,
                subscribers: IndexMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn current(&self) -> Status {
        self.state.lock().current.clone()
    }

    /// Attach a new subscriber.
    ///
    /// The subscriber receives every status published after this call; the
    /// current status is not replayed.
    pub fn subscribe(&self) -> StatusSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscribers.insert(id, tx);
        StatusSubscription { id, receiver: rx }
    }

    /// Detach a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.lock().subscribers.shift_remove(&id).is_some()
    }

    /// Number of attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Make `status` current and deliver it to every subscriber.
    ///
    /// Subscribers whose receiving side has been dropped are removed.
    pub fn publish(&self, status: Status) {
        let mut state = self.state.lock();

        #[cfg(feature = "tracing-integration")]
        tracing::debug!(
            target: "recap::status",
            status = status.label(),
            subscribers = state.subscribers.len(),
            "publishing status"
        );

        state.current = status.clone();
        state
            .subscribers
            .retain(|_, sender| sender.send(status.clone()).is_ok());
    }
}

/// Receiving side of a status subscription.
#[derive(Debug)]
pub struct StatusSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<Status>,
}

impl StatusSubscription {
    /// The id to pass to [`StatusBus::unsubscribe`].
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next status. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Status> {
        self.receiver.recv().await
    }

    /// Take the next status if one is queued.
    pub fn try_recv(&mut self) -> Option<Status> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued status.
    pub fn drain(&mut self) -> Vec<Status> {
        let mut statuses = Vec::new();
        while let Some(status) = self.try_recv() {
            statuses.push(status);
        }
        statuses
    }
}
