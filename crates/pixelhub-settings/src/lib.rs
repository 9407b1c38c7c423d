//! # pixelhub-settings
//!
//! Settings for the pixel hub, loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`HubSettings::default()`]
//! 2. **Settings file** — a JSON file deep-merged over defaults
//! 3. **Environment variables** — `PIXELHUB_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the daemon.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = HubSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.ws_path, "/ws");
        assert_eq!(settings.transport.max_frame_size, 65_536);
        assert_eq!(settings.transport.idle_timeout_secs, 60);
        assert_eq!(settings.transport.ping_interval_secs, 15);
        assert_eq!(settings.transport.ping_timeout_secs, 10);
        assert_eq!(settings.protocol.max_batch_fields, 32);
        assert_eq!(settings.protocol.chunk_pacing_ms, 10);
    }

    #[test]
    fn deep_merge_re_exported() {
        let a = serde_json::json!({"x": 1});
        let b = serde_json::json!({"y": 2});
        let merged = deep_merge(a, b);
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }
}
