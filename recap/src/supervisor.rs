//! The connection supervisor.
//!
//! Owns the status bus, the session, the completion client and the keepalive
//! timer. Every status transition goes through the bus; the keepalive period
//! is recomputed from the resulting status each time.

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use recap_core::{Session, Status, StatusBus, StatusSubscription, SubscriptionId};
use recap_models::ChatGptClient;
use recap_providers::SessionManager;
use recap_streaming::{Fragment, FragmentStream, StreamError};
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::config::RecapConfig;
use crate::error::{SupervisorError, SupervisorResult};
use crate::keepalive::{KeepalivePolicy, KeepaliveTimer};

/// Supervises the authenticated connection and runs queries.
///
/// Cheap to clone; all clones share one connection. The keepalive timer stops
/// on [`shutdown`](Self::shutdown) or when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    bus: Arc<StatusBus>,
    sessions: SessionManager,
    client: ChatGptClient,
    policy: KeepalivePolicy,
    read_timeout: Option<Duration>,
    /// Set while a query is loading. Held while publishing the query's
    /// `Loading` and terminal statuses so they cannot interleave with another
    /// query's.
    loading: Mutex<bool>,
    keepalive: KeepaliveTimer,
}

impl ConnectionSupervisor {
    /// Validate `config`, start the keepalive timer and authenticate once.
    ///
    /// Authentication failure is not an error here; it is reported as the
    /// `Error` status and retried by the keepalive timer.
    pub async fn connect(config: RecapConfig) -> SupervisorResult<Self> {
        config.validate()?;
        let bus = Arc::new(StatusBus::new());
        let sessions = SessionManager::new(config.identity_config()?, Arc::clone(&bus));
        let client = ChatGptClient::new(config.completion_config()?);
        Ok(Self::from_parts(
            sessions,
            client,
            config.keepalive_policy(),
            config.read_timeout,
        )
        .await)
    }

    /// Assemble a supervisor from prebuilt components and authenticate once.
    ///
    /// Statuses are published on the session manager's bus.
    pub async fn from_parts(
        sessions: SessionManager,
        client: ChatGptClient,
        policy: KeepalivePolicy,
        read_timeout: Option<Duration>,
    ) -> Self {
        let bus = Arc::clone(sessions.status_bus());
        let initial_period = policy.period_for(&bus.current());

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let keepalive = KeepaliveTimer::start(initial_period, move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(inner) => {
                            inner.refresh("keepalive").await;
                            ControlFlow::Continue(())
                        }
                        None => ControlFlow::Break(()),
                    }
                }
            });

            Inner {
                bus,
                sessions,
                client,
                policy,
                read_timeout,
                loading: Mutex::new(false),
                keepalive,
            }
        });

        inner.refresh("startup").await;
        Self { inner }
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> Status {
        self.inner.bus.current()
    }

    /// Attach a status subscriber.
    pub fn subscribe(&self) -> StatusSubscription {
        self.inner.bus.subscribe()
    }

    /// Detach a status subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// The shared status bus.
    pub fn status_bus(&self) -> &Arc<StatusBus> {
        &self.inner.bus
    }

    /// The stored session, possibly stale.
    pub fn session(&self) -> Option<Session> {
        self.inner.sessions.session()
    }

    /// Health probe: re-authenticate now and return the resulting status.
    ///
    /// An in-flight query keeps running.
    pub async fn probe(&self) -> Status {
        self.inner.refresh("probe").await
    }

    /// Run one keepalive tick immediately.
    pub async fn tick(&self) -> Status {
        self.inner.refresh("keepalive").await
    }

    /// The keepalive period currently scheduled.
    pub fn keepalive_period(&self) -> Duration {
        self.inner.keepalive.period()
    }

    /// Whether a query is loading.
    pub fn is_loading(&self) -> bool {
        *self.inner.loading.lock()
    }

    /// Start a query.
    ///
    /// Publishes `Loading` before returning. If refreshing the session fails
    /// while an older token is held, that failure is published as `Error` and
    /// the query continues with the older token. The returned stream yields
    /// fragments in arrival order and, on failure, one final error. The
    /// terminal `Connected` or `Error` status is published after the last
    /// item has been queued. Dropping the stream does not cancel the
    /// network read.
    pub fn query(&self, prompt: impl Into<String>) -> SupervisorResult<QueryStream> {
        {
            let mut loading = self.inner.loading.lock();
            if *loading {
                debug!(target: "recap::supervisor", "Rejecting overlapping query");
                return Err(SupervisorError::QueryInFlight);
            }
            *loading = true;
            self.inner.bus.publish(Status::loading());
        }
        self.inner.rearm();

        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::clone(&self.inner);
        let prompt = prompt.into();
        tokio::spawn(async move {
            inner.run_query(prompt, tx).await;
        });

        Ok(QueryStream {
            inner: UnboundedReceiverStream::new(rx),
        })
    }

    /// Stop the keepalive timer. Queries keep working.
    pub fn shutdown(&self) {
        info!(target: "recap::supervisor", "Shutting down keepalive");
        self.inner.keepalive.cancel();
    }
}

impl Inner {
    async fn refresh(&self, reason: &'static str) -> Status {
        debug!(target: "recap::supervisor", reason, "Refreshing session");
        if let Err(err) = self.sessions.authenticate().await {
            warn!(
                target: "recap::supervisor",
                reason,
                error = %err,
                needs_user = err.requires_user_action(),
                "Authentication failed"
            );
        }
        self.rearm()
    }

    fn rearm(&self) -> Status {
        let status = self.bus.current();
        let period = self.policy.period_for(&status);
        self.keepalive.rearm(period);
        debug!(
            target: "recap::supervisor",
            status = status.label(),
            period_secs = period.as_secs(),
            "Keepalive re-armed"
        );
        status
    }

    async fn run_query(
        &self,
        prompt: String,
        tx: mpsc::UnboundedSender<SupervisorResult<Fragment>>,
    ) {
        let outcome = self.drive_query(&prompt, &tx).await;

        {
            let mut loading = self.loading.lock();
            *loading = false;
            match outcome {
                Ok(()) => {
                    info!(target: "recap::supervisor", "Query completed");
                    self.bus.publish(Status::connected());
                }
                Err(err) => {
                    warn!(target: "recap::supervisor", error = %err, "Query failed");
                    self.bus.publish(Status::error(err.to_string()));
                    let _ = tx.send(Err(err));
                }
            }
        }
        self.rearm();
    }

    async fn drive_query(
        &self,
        prompt: &str,
        tx: &mpsc::UnboundedSender<SupervisorResult<Fragment>>,
    ) -> SupervisorResult<()> {
        let session = match self.sessions.acquire().await {
            Ok(session) => session,
            Err(err) => match self.sessions.session() {
                // The failed refresh is reported; the query goes on with the
                // previous token and its own terminal status follows.
                Some(stale) => {
                    warn!(
                        target: "recap::supervisor",
                        error = %err,
                        age_secs = stale.age().num_seconds(),
                        "Session refresh failed; using previous token"
                    );
                    self.bus.publish(Status::error(err.to_string()));
                    self.rearm();
                    stale
                }
                None => return Err(err.into()),
            },
        };

        let body = self
            .within_read_timeout(self.client.send(prompt, &session))
            .await?
            .map_err(|err| {
                if err.session_possibly_stale() {
                    warn!(
                        target: "recap::supervisor",
                        error = %err,
                        age_secs = session.age().num_seconds(),
                        "Completion endpoint rejected the session token"
                    );
                }
                err
            })?;
        let mut fragments = FragmentStream::new(body);
        let mut delivered = 0usize;

        loop {
            match self.within_read_timeout(fragments.next()).await? {
                Some(Ok(fragment)) => {
                    delivered += 1;
                    // The consumer may be gone; keep reading to completion.
                    let _ = tx.send(Ok(fragment));
                }
                Some(Err(err)) => return Err(err.into()),
                None => break,
            }
        }

        let decoder = fragments.decoder();
        info!(
            target: "recap::supervisor",
            fragments = delivered,
            records = decoder.records(),
            anomalies = decoder.anomalies(),
            chars = decoder.text().chars().count(),
            "Response stream finished"
        );
        Ok(())
    }

    /// Await `future`, bounded by the read timeout when one is set.
    async fn within_read_timeout<F: Future>(&self, future: F) -> Result<F::Output, StreamError> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| StreamError::Timeout),
            None => Ok(future.await),
        }
    }
}

/// Fragments of one query.
///
/// Yields `Ok` fragments in arrival order. A failed query ends with a single
/// `Err` carrying the same message as the published `Error` status.
#[derive(Debug)]
pub struct QueryStream {
    inner: UnboundedReceiverStream<SupervisorResult<Fragment>>,
}

impl QueryStream {
    /// Collect the remaining fragments into one string.
    ///
    /// Stops at the first error.
    pub async fn collect_text(mut self) -> SupervisorResult<String> {
        let mut text = String::new();
        while let Some(item) = self.next().await {
            text.push_str(&item?);
        }
        Ok(text)
    }
}

impl Stream for QueryStream {
    type Item = SupervisorResult<Fragment>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
