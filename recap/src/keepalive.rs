//! Keepalive scheduling.
//!
//! A single background task sleeps for the current period and then runs the
//! tick callback. Re-arming replaces the period and restarts the sleep, so at
//! most one schedule is ever pending.

use recap_core::Status;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Keepalive periods per status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepalivePolicy {
    /// Period while the connection is unhealthy.
    pub error_period: Duration,
    /// Period otherwise.
    pub healthy_period: Duration,
}

impl Default for KeepalivePolicy {
    fn default() -> Self {
        Self {
            error_period: Duration::from_secs(15),
            healthy_period: Duration::from_secs(30 * 60),
        }
    }
}

impl KeepalivePolicy {
    /// Create a policy with explicit periods.
    pub fn new(error_period: Duration, healthy_period: Duration) -> Self {
        Self {
            error_period,
            healthy_period,
        }
    }

    /// The period to schedule after `status` became current.
    pub fn period_for(&self, status: &Status) -> Duration {
        if status.needs_fast_retry() {
            self.error_period
        } else {
            self.healthy_period
        }
    }
}

/// Repeating timer with a replaceable period.
///
/// Dropping the timer cancels it.
#[derive(Debug)]
pub struct KeepaliveTimer {
    period: watch::Sender<Duration>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl KeepaliveTimer {
    /// Spawn the timer task.
    ///
    /// `on_tick` runs once per elapsed period; returning
    /// `ControlFlow::Break` stops the timer. Must be called within a tokio
    /// runtime.
    pub fn start<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let (period_tx, mut period_rx) = watch::channel(period);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                let current = *period_rx.borrow_and_update();
                trace!(target: "recap::keepalive", period_secs = current.as_secs(), "Keepalive armed");

                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = period_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(current) => {
                        if on_tick().await.is_break() {
                            break;
                        }
                    }
                }
            }
            debug!(target: "recap::keepalive", "Keepalive stopped");
        });

        Self {
            period: period_tx,
            cancel,
            handle,
        }
    }

    /// Replace the period and restart the wait from now.
    pub fn rearm(&self, period: Duration) {
        self.period.send_replace(period);
    }

    /// The period currently scheduled.
    pub fn period(&self) -> Duration {
        *self.period.borrow()
    }

    /// Stop the timer. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the timer task has exited.
    pub fn is_stopped(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for KeepaliveTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
