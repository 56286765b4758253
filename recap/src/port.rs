//! Consumer ports.
//!
//! A port is one local consumer's bidirectional message channel. The
//! supervisor is injected into [`serve_port`], which bridges the two until
//! the consumer disconnects.

use async_trait::async_trait;
use futures::StreamExt;
use recap_core::{InboundMessage, OutboundMessage};
use recap_streaming::Fragment;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Split};
use tracing::{debug, info, warn};

use crate::error::{PortError, SupervisorResult};
use crate::supervisor::{ConnectionSupervisor, QueryStream};

/// A consumer's message channel.
#[async_trait]
pub trait ConsumerPort: Send {
    /// Wait for the next inbound message; `None` once the consumer is gone.
    ///
    /// Must be cancel safe: [`serve_port`] races it against outbound traffic.
    async fn recv(&mut self) -> Result<Option<InboundMessage>, PortError>;

    /// Deliver one outbound message.
    async fn post(&mut self, message: OutboundMessage) -> Result<(), PortError>;
}

/// Newline-delimited JSON over a byte stream pair.
///
/// Lines that are empty, not UTF-8, or do not parse as an inbound message
/// are skipped.
#[derive(Debug)]
pub struct JsonLinesPort<R, W> {
    segments: Split<BufReader<R>>,
    writer: W,
}

impl<R, W> JsonLinesPort<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a port reading from `reader` and writing to `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            segments: BufReader::new(reader).split(b'\n'),
            writer,
        }
    }
}

impl JsonLinesPort<tokio::io::Stdin, tokio::io::Stdout> {
    /// Port over the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> ConsumerPort for JsonLinesPort<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<InboundMessage>, PortError> {
        // `next_segment` is cancel safe.
        while let Some(segment) = self.segments.next_segment().await? {
            let line = match std::str::from_utf8(&segment) {
                Ok(line) => line.trim(),
                Err(err) => {
                    warn!(target: "recap::port", error = %err, "Ignoring non-UTF-8 line");
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match InboundMessage::from_json(line) {
                Ok(message) => return Ok(Some(message)),
                Err(err) => {
                    warn!(target: "recap::port", error = %err, "Ignoring malformed message");
                }
            }
        }
        Ok(None)
    }

    async fn post(&mut self, message: OutboundMessage) -> Result<(), PortError> {
        let mut line = message.to_json()?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Bridge `port` to `supervisor` until the consumer disconnects.
///
/// The port is subscribed to status transitions for its lifetime and
/// unsubscribed on return, including on error. Fragments of a running query
/// are forwarded before any status queued after them.
pub async fn serve_port<P>(supervisor: &ConnectionSupervisor, mut port: P) -> Result<(), PortError>
where
    P: ConsumerPort,
{
    let mut statuses = supervisor.subscribe();
    let subscription = statuses.id();
    let mut query: Option<QueryStream> = None;
    info!(target: "recap::port", %subscription, "Consumer attached");

    let result = 'serve: loop {
        tokio::select! {
            biased;

            item = next_query_item(&mut query) => match item {
                Some(Ok(fragment)) => {
                    if let Err(err) = port.post(OutboundMessage::fragment(fragment)).await {
                        break 'serve Err(err);
                    }
                }
                // The failure is also published as an `Error` status.
                Some(Err(err)) => {
                    debug!(target: "recap::port", error = %err, "Query ended with an error");
                }
                None => query = None,
            },

            Some(status) = statuses.recv() => {
                if let Err(err) = port.post(OutboundMessage::from(&status)).await {
                    break 'serve Err(err);
                }
            }

            inbound = port.recv() => match inbound {
                Ok(Some(InboundMessage::Status)) => {
                    let supervisor = supervisor.clone();
                    tokio::spawn(async move {
                        supervisor.probe().await;
                    });
                }
                Ok(Some(InboundMessage::Query { prompt })) => match supervisor.query(prompt) {
                    Ok(stream) => {
                        // `Loading` goes out ahead of the first fragment.
                        for status in statuses.drain() {
                            if let Err(err) = port.post(OutboundMessage::from(&status)).await {
                                break 'serve Err(err);
                            }
                        }
                        query = Some(stream);
                    }
                    Err(err) => {
                        if let Err(err) = port.post(OutboundMessage::error(err.to_string())).await {
                            break 'serve Err(err);
                        }
                    }
                },
                Ok(None) => break 'serve Ok(()),
                Err(err) => break 'serve Err(err),
            },
        }
    };

    supervisor.unsubscribe(subscription);
    info!(target: "recap::port", %subscription, "Consumer detached");
    result
}

async fn next_query_item(
    query: &mut Option<QueryStream>,
) -> Option<SupervisorResult<Fragment>> {
    match query {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
