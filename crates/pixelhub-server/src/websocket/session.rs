//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures::StreamExt;
use metrics::counter;
use pixelhub_core::ConnectionId;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use super::admission::Slot;
use super::connection::{Connection, ConnectionReader, run_writer};
use super::liveness::run_liveness;
use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::server::AppState;

/// Run a session for an upgraded socket, holding `_slot` until it ends.
///
/// 1. Splits the socket and spawns the writer task
/// 2. Registers the connection and starts its liveness monitor
/// 3. Runs the broadcast receive loop until the connection fails or closes
/// 4. Waits for the writer and monitor to exit
#[instrument(skip_all, fields(remote = %remote))]
pub async fn run_session(socket: WebSocket, remote: SocketAddr, state: AppState, _slot: Slot) {
    let config = &state.config;
    let (sink, stream) = socket.split();

    let (tx, rx) = mpsc::channel(config.send_queue_capacity);
    let cancel = state.shutdown.token().child_token();
    let connection = Arc::new(Connection::new(
        ConnectionId::new(),
        remote.to_string(),
        tx,
        cancel.clone(),
        config.send_timeout,
    ));
    let writer = tokio::spawn(run_writer(sink, rx, cancel, config.send_timeout));

    let _ = state.registry.register(connection.clone()).await;
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    info!(
        conn_id = %connection.id(),
        total = state.registry.count(),
        "client connected"
    );

    let liveness = tokio::spawn(run_liveness(
        connection.clone(),
        config.ping_interval,
        config.ping_timeout,
    ));

    let reader = ConnectionReader::new(stream, connection.clone(), config.idle_timeout);
    let reason = state.engine.run(reader).await;

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    info!(
        conn_id = %connection.id(),
        reason = %reason,
        age_secs = connection.age().as_secs(),
        remaining = state.registry.count(),
        "client disconnected"
    );

    if let Ok(result) = liveness.await {
        debug!(conn_id = %connection.id(), ?result, "liveness monitor stopped");
    }
    let _ = writer.await;
}
