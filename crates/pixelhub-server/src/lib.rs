//! # pixelhub-server
//!
//! Axum WebSocket broadcast hub.
//!
//! - `WebSocket` endpoint: origin and connection-limit admission, upgrade
//! - Connection handling: single-writer task, idle deadline, liveness probes
//! - Registry of live connections and mirrored fan-out of re-framed messages
//! - HTTP endpoints: health check, Prometheus metrics, static assets
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, HubServer};
