//! `GET <ws_path>` — admission checks and the WebSocket upgrade.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::session::run_session;
use crate::server::AppState;

/// Upgrade handler.
///
/// Rejections never create a connection or touch the registry:
/// - disallowed `Origin` → 403
/// - no connection slot free, or shutting down → 503
/// - malformed handshake → axum's upgrade rejection
pub async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or_default());
    if !state.config.origin_allowed(origin) {
        warn!(%remote, origin, "upgrade rejected: origin not allowed");
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    if state.shutdown.is_shutting_down() {
        warn!(%remote, "upgrade rejected: shutting down");
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }

    let Some(slot) = state.admission.try_admit() else {
        warn!(%remote, limit = state.admission.limit(), "upgrade rejected: connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(%remote, error = %rejection, "upgrade rejected");
            return rejection.into_response();
        }
    };

    let max_size = state.config.max_frame_size;
    ws.max_message_size(max_size)
        .max_frame_size(max_size)
        .on_failed_upgrade(move |e| warn!(%remote, error = %e, "upgrade failed"))
        .on_upgrade(move |socket| {
            let shutdown = state.shutdown.clone();
            shutdown.track(run_session(socket, remote, state, slot))
        })
}
