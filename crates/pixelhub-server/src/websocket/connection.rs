//! One WebSocket connection: the shared handle, its reader, and its writer task.
//!
//! The socket is split on upgrade. The write half is owned by
//! [`run_writer`], which drains an mpsc queue so all writes go through a
//! single task. The read half is wrapped in a [`ConnectionReader`] owned by
//! the broadcast loop. Everyone else holds an `Arc<Connection>`.
//!
//! Closing is signalled through the connection's `CancellationToken`: the
//! reader and writer both select on it, so [`Connection::close`] promptly
//! unblocks a pending receive or send.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use pixelhub_core::{ConnError, ConnectionId};
use pixelhub_protocol::RawMessage;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Item on a connection's outbound queue.
#[derive(Debug)]
pub enum Outbound {
    /// A data frame to write.
    Frame(Message),
    /// A liveness probe; the writer reports the outcome of the ping write.
    Probe(oneshot::Sender<Result<(), ConnError>>),
}

/// Shared handle to a connected client.
pub struct Connection {
    id: ConnectionId,
    remote: String,
    tx: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
    connected_at: Instant,
    last_activity: Mutex<Instant>,
    send_timeout: Duration,
}

impl Connection {
    /// Create a connection that writes through `tx`.
    ///
    /// `cancel` should be a child of the server's shutdown token.
    pub fn new(
        id: ConnectionId,
        remote: impl Into<String>,
        tx: mpsc::Sender<Outbound>,
        cancel: CancellationToken,
        send_timeout: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            remote: remote.into(),
            tx,
            cancel,
            connected_at: now,
            last_activity: Mutex::new(now),
            send_timeout,
        }
    }

    /// Connection ID.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Remote peer address, for logs.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Record inbound activity, pushing the idle deadline out.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Instant at which the connection idles out.
    pub fn idle_deadline(&self, idle_timeout: Duration) -> Instant {
        *self.last_activity.lock() + idle_timeout
    }

    /// Queue one frame for the writer task.
    ///
    /// Waits at most the send timeout for queue space. Any error is terminal
    /// for this connection; the caller is expected to evict it.
    pub async fn send(&self, message: Message) -> Result<(), ConnError> {
        if self.cancel.is_cancelled() {
            return Err(ConnError::Closed);
        }
        tokio::select! {
            () = self.cancel.cancelled() => Err(ConnError::Closed),
            res = self.tx.send_timeout(Outbound::Frame(message), self.send_timeout) => match res {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(ConnError::SendTimeout(self.send_timeout)),
                Err(SendTimeoutError::Closed(_)) => Err(ConnError::Closed),
            },
        }
    }

    /// Send a ping and wait for the writer to finish writing it.
    pub async fn probe(&self, timeout: Duration) -> Result<(), ConnError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let attempt = async {
            self.tx
                .send(Outbound::Probe(ack_tx))
                .await
                .map_err(|_| ConnError::Closed)?;
            ack_rx.await.map_err(|_| ConnError::Closed)?
        };
        tokio::select! {
            () = self.cancel.cancelled() => Err(ConnError::Closed),
            res = tokio::time::timeout(timeout, attempt) => {
                res.unwrap_or(Err(ConnError::ProbeTimeout(timeout)))
            }
        }
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether [`close`](Self::close) has been called (or the writer failed).
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("remote", &self.remote)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reader
// ─────────────────────────────────────────────────────────────────────────────

/// Read half of a connection.
pub struct ConnectionReader<S> {
    stream: S,
    conn: Arc<Connection>,
    idle_timeout: Duration,
}

impl<S, E> ConnectionReader<S>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    /// Wrap the read half of a socket.
    pub fn new(stream: S, conn: Arc<Connection>, idle_timeout: Duration) -> Self {
        Self {
            stream,
            conn,
            idle_timeout,
        }
    }

    /// The connection this reader belongs to.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Wait for the next data message.
    ///
    /// Data frames and pongs refresh the idle deadline. Pings are answered by
    /// the transport and skipped here.
    pub async fn receive(&mut self) -> Result<RawMessage, ConnError> {
        loop {
            let deadline = self.conn.idle_deadline(self.idle_timeout);
            let next = tokio::select! {
                () = self.conn.closed() => return Err(ConnError::Closed),
                next = tokio::time::timeout_at(deadline, self.stream.next()) => next,
            };
            let Ok(item) = next else {
                return Err(ConnError::IdleTimeout(self.idle_timeout));
            };
            match item {
                None | Some(Ok(Message::Close(_))) => return Err(ConnError::Closed),
                Some(Err(e)) => return Err(ConnError::transport(e)),
                Some(Ok(Message::Text(text))) => {
                    self.conn.touch();
                    return Ok(RawMessage::text(text.as_str()));
                }
                Some(Ok(Message::Binary(data))) => {
                    self.conn.touch();
                    return Ok(RawMessage::binary(data));
                }
                Some(Ok(Message::Pong(_))) => self.conn.touch(),
                Some(Ok(Message::Ping(_))) => {}
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Drain a connection's outbound queue into the socket.
///
/// Every write is bounded by `write_timeout`. A failed or timed-out write
/// closes the connection. On close a close frame is sent best-effort.
pub async fn run_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
    write_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(Outbound::Frame(message)) => {
                    if let Err(e) = write_frame(&mut sink, message, write_timeout).await {
                        debug!(error = %e, "write failed");
                        break;
                    }
                }
                Some(Outbound::Probe(ack)) => {
                    let res = write_frame(&mut sink, Message::Ping(Bytes::new()), write_timeout).await;
                    let failed = res.is_err();
                    let _ = ack.send(res);
                    if failed {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    cancel.cancel();
    let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
}

async fn write_frame<S>(sink: &mut S, message: Message, limit: Duration) -> Result<(), ConnError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match tokio::time::timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnError::transport(e)),
        Err(_) => Err(ConnError::SendTimeout(limit)),
    }
}
