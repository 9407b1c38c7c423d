//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use pixelhub_settings::HubSettings;

/// Runtime configuration for the hub server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Path of the WebSocket upgrade endpoint.
    pub ws_path: String,
    /// Directory served for non-WebSocket paths.
    pub static_dir: Option<PathBuf>,
    /// Accepted `Origin` header values; empty accepts any.
    pub allowed_origins: Vec<String>,
    /// Maximum concurrent connections (0 = unlimited).
    pub max_connections: usize,
    /// Max inbound WebSocket frame and message size in bytes.
    pub max_frame_size: usize,
    /// Close a connection after this long without inbound activity.
    pub idle_timeout: Duration,
    /// Interval between liveness probes.
    pub ping_interval: Duration,
    /// Time a probe write may take.
    pub ping_timeout: Duration,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Time a send may wait for queue space or for the socket write.
    pub send_timeout: Duration,
    /// Maximum fields per outbound batch frame.
    pub max_batch_fields: usize,
    /// Delay between successive chunk frames of one message.
    pub chunk_pacing: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: "/ws".into(),
            static_dir: None,
            allowed_origins: Vec::new(),
            max_connections: 0,
            max_frame_size: 65_536,
            idle_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(15),
            ping_timeout: Duration::from_secs(10),
            send_queue_capacity: 256,
            send_timeout: Duration::from_secs(5),
            max_batch_fields: 32,
            chunk_pacing: Duration::from_millis(10),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the `Origin` header value may upgrade.
    ///
    /// A missing header is always accepted: embedded displays do not send one.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.allowed_origins.is_empty() => true,
            Some(origin) => self.allowed_origins.iter().any(|o| o == origin),
        }
    }
}

impl From<&HubSettings> for ServerConfig {
    fn from(settings: &HubSettings) -> Self {
        let server = &settings.server;
        let transport = &settings.transport;
        let protocol = &settings.protocol;
        Self {
            host: server.host.clone(),
            port: server.port,
            ws_path: server.ws_path.clone(),
            static_dir: server.static_dir().map(PathBuf::from),
            allowed_origins: server.allowed_origins.clone(),
            max_connections: server.max_connections,
            max_frame_size: transport.max_frame_size,
            idle_timeout: Duration::from_secs(transport.idle_timeout_secs),
            ping_interval: Duration::from_secs(transport.ping_interval_secs),
            ping_timeout: Duration::from_secs(transport.ping_timeout_secs),
            send_queue_capacity: transport.send_queue_capacity.max(1),
            send_timeout: Duration::from_millis(transport.send_timeout_ms),
            max_batch_fields: protocol.max_batch_fields,
            chunk_pacing: Duration::from_millis(protocol.chunk_pacing_ms),
        }
    }
}
