//! # recap
//!
//! A supervised connection to the ChatGPT web backend that streams
//! transcript summaries to local consumers.
//!
//! ## Quick Start
//!
//! ```ignore
//! use futures::StreamExt;
//! use recap::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let supervisor = ConnectionSupervisor::connect(RecapConfig::from_env()?).await?;
//!
//!     let mut fragments = supervisor.query(summary_prompt(&transcript))?;
//!     while let Some(fragment) = fragments.next().await {
//!         print!("{}", fragment?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`recap_core`] - Status model, status bus, session, errors, consumer messages
//! - [`recap_streaming`] - SSE framing and cumulative-text decoding
//! - [`recap_providers`] - Session acquisition
//! - [`recap_models`] - Completion client
//! - this crate - [`ConnectionSupervisor`], keepalive, consumer ports
//!
//! ## Status lifecycle
//!
//! The status starts as `Initializing` and becomes `Connected` or `Error`
//! after the first authentication. A query publishes `Loading`, then
//! `Connected` once the response stream ends or `Error` with the failure
//! message. The keepalive re-authenticates every 15 seconds while the status
//! is `Error` (or `Initializing`) and every 30 minutes otherwise.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod keepalive;
pub mod port;
pub mod prompt;
pub mod supervisor;
pub mod telemetry;

pub use config::RecapConfig;
pub use error::{ConfigError, PortError, SupervisorError, SupervisorResult};
pub use keepalive::{KeepalivePolicy, KeepaliveTimer};
pub use port::{serve_port, ConsumerPort, JsonLinesPort};
pub use prompt::summary_prompt;
pub use supervisor::{ConnectionSupervisor, QueryStream};

pub use recap_core;
pub use recap_models;
pub use recap_providers;
pub use recap_streaming;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        serve_port, summary_prompt, ConnectionSupervisor, ConsumerPort, JsonLinesPort,
        QueryStream, RecapConfig, SupervisorError,
    };
    pub use recap_core::{InboundMessage, OutboundMessage, Status};
    pub use recap_streaming::Fragment;
}
