//! Per-connection receive loop and fan-out to every registry member.
//!
//! Broadcasts are mirrored: the sender receives its own frames. A recipient
//! whose send fails is evicted on the spot and the fan-out continues.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::Stream;
use metrics::counter;
use pixelhub_core::ConnError;
use pixelhub_protocol::{Codec, FrameKind, MessageClass, RawMessage, WireFrame};
use tracing::{debug, info, warn};

use super::connection::{Connection, ConnectionReader};
use super::registry::Registry;
use crate::metrics::{WS_BROADCAST_EVICTIONS_TOTAL, WS_FRAMES_RELAYED_TOTAL};

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients the frame was queued for.
    pub delivered: usize,
    /// Recipients evicted because the send failed.
    pub evicted: usize,
}

/// Drives receive loops and fans re-framed messages out to the registry.
pub struct BroadcastEngine {
    registry: Arc<Registry>,
    codec: Codec,
    chunk_pacing: Duration,
}

impl BroadcastEngine {
    /// Create an engine over `registry`.
    pub fn new(registry: Arc<Registry>, codec: Codec, chunk_pacing: Duration) -> Self {
        Self {
            registry,
            codec,
            chunk_pacing,
        }
    }

    /// Receive loop for one connection.
    ///
    /// Runs until `receive()` fails, then evicts and closes the connection
    /// and returns the error that ended it.
    pub async fn run<S, E>(&self, mut reader: ConnectionReader<S>) -> ConnError
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let conn = reader.connection().clone();
        let err = loop {
            match reader.receive().await {
                Ok(raw) => self.relay(&conn, &raw).await,
                Err(e) => break e,
            }
        };
        let _ = self.registry.unregister(conn.id()).await;
        conn.close();
        err
    }

    /// Re-frame one inbound message and broadcast every resulting frame.
    pub async fn relay(&self, source: &Connection, raw: &RawMessage) {
        let out = self.codec.reframe(raw);
        match out.class {
            MessageClass::FullState => {
                info!(conn_id = %source.id(), bytes = raw.len(), "full state received");
            }
            MessageClass::Compressed { fields } => {
                info!(conn_id = %source.id(), fields, "batch received");
            }
            MessageClass::Chunked { fields, chunks } => {
                info!(conn_id = %source.id(), fields, "batch received");
                debug!(conn_id = %source.id(), fields, chunks, "batch split into chunks");
            }
            MessageClass::Clear => {
                info!(conn_id = %source.id(), "clear received");
            }
            MessageClass::Other => {
                debug!(conn_id = %source.id(), bytes = raw.len(), "relaying message");
            }
        }

        let paced = out.is_paced() && !self.chunk_pacing.is_zero();
        let last = out.frames.len().saturating_sub(1);
        for (i, frame) in out.frames.iter().enumerate() {
            let _ = self.broadcast(&to_message(frame)).await;
            if paced && i < last {
                tokio::time::sleep(self.chunk_pacing).await;
            }
        }
    }

    /// Send one frame to every current registry member.
    pub async fn broadcast(&self, message: &Message) -> BroadcastReport {
        let recipients = self.registry.snapshot().await;
        let mut report = BroadcastReport::default();
        for conn in &recipients {
            match conn.send(message.clone()).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(conn_id = %conn.id(), remote = conn.remote(), error = %e, "send failed, evicting");
                    let _ = self.registry.unregister(conn.id()).await;
                    conn.close();
                    report.evicted += 1;
                }
            }
        }
        counter!(WS_FRAMES_RELAYED_TOTAL).increment(report.delivered as u64);
        if report.evicted > 0 {
            counter!(WS_BROADCAST_EVICTIONS_TOTAL).increment(report.evicted as u64);
        }
        debug!(
            recipients = recipients.len(),
            delivered = report.delivered,
            evicted = report.evicted,
            "broadcast frame"
        );
        report
    }
}

/// Convert a wire frame to a WebSocket message.
///
/// Text frames that are not valid UTF-8 cannot be sent as text; they go out
/// as binary.
pub fn to_message(frame: &WireFrame) -> Message {
    match (frame.kind, frame.as_str()) {
        (FrameKind::Text, Some(text)) => Message::Text(text.into()),
        _ => Message::Binary(frame.payload.clone()),
    }
}
