//! Session acquisition for recap.
//!
//! The completion endpoint accepts short-lived bearer tokens issued by the
//! web session endpoint. [`SessionManager`] fetches them, classifies failures
//! into [`AuthError`](recap_core::AuthError), and reports every attempt to a
//! [`StatusBus`](recap_core::StatusBus).
//!
//! ## Example
//!
//! ```rust,ignore
//! use recap_core::StatusBus;
//! use recap_providers::{IdentityConfig, SessionManager};
//! use std::sync::Arc;
//!
//! let bus = Arc::new(StatusBus::new());
//! let sessions = SessionManager::new(IdentityConfig::default(), bus.clone());
//!
//! match sessions.authenticate().await {
//!     Ok(session) => println!("token obtained at {}", session.acquired_at()),
//!     Err(err) => eprintln!("status is now error: {err}"),
//! }
//! ```
//!
//! Note: tokens live in memory only; nothing is written to disk.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
mod session_manager;

pub use config::{IdentityConfig, DEFAULT_BASE_URL, DEFAULT_SESSION_PATH};
pub use session_manager::{SessionManager, SessionResponse};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{IdentityConfig, SessionManager};
}
