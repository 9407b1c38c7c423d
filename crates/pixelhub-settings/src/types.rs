//! Settings types.
//!
//! Every section uses `#[serde(default)]` so a settings file only needs the
//! keys it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Listener, routing, and admission.
    pub server: ServerSettings,
    /// Per-connection transport behavior.
    pub transport: TransportSettings,
    /// Message re-framing.
    pub protocol: ProtocolSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl HubSettings {
    /// Reject combinations the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.protocol.max_batch_fields == 0 {
            return Err(invalid("protocol.maxBatchFields must be positive"));
        }
        if self.transport.max_frame_size == 0 {
            return Err(invalid("transport.maxFrameSize must be positive"));
        }
        if self.transport.ping_interval_secs == 0 {
            return Err(invalid("transport.pingIntervalSecs must be positive"));
        }
        if self.transport.ping_timeout_secs == 0 {
            return Err(invalid("transport.pingTimeoutSecs must be positive"));
        }
        if self.transport.send_queue_capacity == 0 {
            return Err(invalid("transport.sendQueueCapacity must be positive"));
        }
        if self.transport.send_timeout_ms == 0 {
            return Err(invalid("transport.sendTimeoutMs must be positive"));
        }
        if self.transport.idle_timeout_secs <= self.transport.ping_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "transport.idleTimeoutSecs ({}) must exceed pingIntervalSecs ({})",
                self.transport.idle_timeout_secs, self.transport.ping_interval_secs
            )));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> SettingsError {
    SettingsError::InvalidValue(msg.to_string())
}

/// Listener, routing, and admission settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Path of the WebSocket upgrade endpoint.
    pub ws_path: String,
    /// Directory served for non-WebSocket paths. Empty disables static serving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
    /// Accepted `Origin` header values. Empty accepts any origin.
    pub allowed_origins: Vec<String>,
    /// Maximum concurrent connections (0 = unlimited).
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ws_path: "/ws".to_string(),
            static_dir: Some("./static".to_string()),
            allowed_origins: Vec::new(),
            max_connections: 0,
        }
    }
}

impl ServerSettings {
    /// Static directory, if serving is enabled.
    pub fn static_dir(&self) -> Option<&str> {
        self.static_dir.as_deref().filter(|d| !d.is_empty())
    }
}

/// Per-connection transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Maximum inbound frame/message size in bytes.
    pub max_frame_size: usize,
    /// Seconds without inbound activity before a connection is closed.
    pub idle_timeout_secs: u64,
    /// Seconds between liveness probes.
    pub ping_interval_secs: u64,
    /// Seconds a probe write may take.
    pub ping_timeout_secs: u64,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Milliseconds a broadcast send may wait for queue space.
    pub send_timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_frame_size: 65_536,
            idle_timeout_secs: 60,
            ping_interval_secs: 15,
            ping_timeout_secs: 10,
            send_queue_capacity: 256,
            send_timeout_ms: 5_000,
        }
    }
}

/// Message re-framing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolSettings {
    /// Maximum fields in one outbound frame before a batch is chunked.
    pub max_batch_fields: usize,
    /// Milliseconds between successive chunk frames.
    pub chunk_pacing_ms: u64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            max_batch_fields: 32,
            chunk_pacing_ms: 10,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
