//! # recap-core
//!
//! Core types, status model, and error handling for the recap workspace.
//!
//! This crate provides the foundational types shared by every other recap crate:
//!
//! - **Status**: The connection status machine values and the [`StatusBus`]
//!   that fans transitions out to subscribers
//! - **Session**: The short-lived access token held in memory
//! - **Errors**: The authentication and send failure taxonomy
//! - **Messages**: The typed protocol spoken with local consumers
//! - **Identifiers**: Random message identifiers and timestamps
//!
//! ## Feature Flags
//!
//! - `tracing-integration`: Emit trace events when statuses are published
//!
//! ## Example
//!
//! ```rust
//! use recap_core::{Status, StatusBus};
//!
//! let bus = StatusBus::new();
//! let mut subscription = bus.subscribe();
//!
//! bus.publish(Status::connected());
//!
//! let received = subscription.try_recv().expect("status delivered");
//! assert!(received.is_connected());
//! assert!(bus.current().is_connected());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod errors;
pub mod identifier;
pub mod messages;
pub mod session;
pub mod status;

// Re-exports for convenience
pub use errors::{AuthError, SendError};
pub use identifier::{now_utc, MessageId};
pub use messages::{InboundMessage, OutboundMessage, StatusLabel};
pub use session::Session;
pub use status::{Status, StatusBus, StatusSubscription, SubscriptionId};

/// Prelude module for common imports.
///
/// ```rust
/// use recap_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{AuthError, SendError};
    pub use crate::identifier::{generate_uuid, now_utc, MessageId};
    pub use crate::messages::{InboundMessage, OutboundMessage, StatusLabel};
    pub use crate::session::Session;
    pub use crate::status::{Status, StatusBus, StatusSubscription, SubscriptionId};
}
