//! `HubServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use pixelhub_core::HubError;
use pixelhub_protocol::Codec;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::admission::Admission;
use crate::websocket::broadcast::BroadcastEngine;
use crate::websocket::registry::Registry;
use crate::websocket::upgrade::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live connections.
    pub registry: Arc<Registry>,
    /// Connection-limit slots.
    pub admission: Arc<Admission>,
    /// Receive loop and fan-out.
    pub engine: Arc<BroadcastEngine>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The pixel hub server.
pub struct HubServer {
    state: AppState,
}

impl HubServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let engine = Arc::new(BroadcastEngine::new(
            registry.clone(),
            Codec::new(config.max_batch_fields),
            config.chunk_pacing,
        ));
        let admission = Arc::new(Admission::new(config.max_connections));
        Self {
            state: AppState {
                config: Arc::new(config),
                registry,
                admission,
                engine,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                metrics: None,
            },
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let config = &self.state.config;
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route(&config.ws_path, get(ws_handler));
        if self.state.metrics.is_some() {
            router = router.route("/metrics", get(metrics_handler));
        }
        if let Some(dir) = &config.static_dir {
            router = router.fallback_service(ServeDir::new(dir));
        }
        router
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address and the serve task. The task ends once the
    /// shutdown token is cancelled and in-flight HTTP requests finish.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), HubError> {
        let addr = self.state.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| HubError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener.local_addr()?;
        info!(
            addr = %local,
            ws_path = %self.state.config.ws_path,
            static_dir = ?self.state.config.static_dir,
            "pixelhub listening"
        );

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(token.cancelled_owned());
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
        });
        Ok((local, handle))
    }

    /// Live connections.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.state.registry
    }

    /// Connection-limit slots.
    pub fn admission(&self) -> &Arc<Admission> {
        &self.state.admission
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(metrics::render)
        .unwrap_or_default()
}
