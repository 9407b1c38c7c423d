//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HubSettings::default()`]
//! 2. If a settings file exists, deep-merge its values over defaults
//! 3. Apply `PIXELHUB_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::HubSettings;

/// Default settings file, relative to the working directory.
pub fn settings_path() -> PathBuf {
    PathBuf::from("pixelhub.json")
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error. The result is not validated; callers
/// apply their own overrides first and then call [`HubSettings::validate`].
pub fn load_settings_from_path(path: &Path) -> Result<HubSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<HubSettings> {
    let defaults = serde_json::to_value(HubSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Integers must parse and fall within the given range; invalid values are
/// logged and ignored (falling back to file/default).
pub fn apply_env_overrides(settings: &mut HubSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Split out from [`apply_env_overrides`] so tests need not touch the
/// process environment.
pub fn apply_overrides_from<F>(settings: &mut HubSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvSource(lookup);

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("PIXELHUB_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("PIXELHUB_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("PIXELHUB_WS_PATH") {
        if v.starts_with('/') {
            settings.server.ws_path = v;
        } else {
            tracing::warn!(key = "PIXELHUB_WS_PATH", value = %v, "path must start with '/', ignoring");
        }
    }
    // Set-but-empty disables static serving.
    if let Some(v) = env.raw("PIXELHUB_STATIC_DIR") {
        settings.server.static_dir = Some(v);
    }
    if let Some(v) = env.usize("PIXELHUB_MAX_CONNECTIONS", 0, 1_000_000) {
        settings.server.max_connections = v;
    }

    // ── Transport ───────────────────────────────────────────────────
    if let Some(v) = env.usize("PIXELHUB_MAX_FRAME_SIZE", 1, 64 * 1024 * 1024) {
        settings.transport.max_frame_size = v;
    }
    if let Some(v) = env.u64("PIXELHUB_IDLE_TIMEOUT_SECS", 1, 86_400) {
        settings.transport.idle_timeout_secs = v;
    }
    if let Some(v) = env.u64("PIXELHUB_PING_INTERVAL_SECS", 1, 3_600) {
        settings.transport.ping_interval_secs = v;
    }
    if let Some(v) = env.u64("PIXELHUB_PING_TIMEOUT_SECS", 1, 3_600) {
        settings.transport.ping_timeout_secs = v;
    }

    // ── Protocol ────────────────────────────────────────────────────
    if let Some(v) = env.usize("PIXELHUB_MAX_BATCH_FIELDS", 1, 1_000_000) {
        settings.protocol.max_batch_fields = v;
    }
    if let Some(v) = env.u64("PIXELHUB_CHUNK_PACING_MS", 0, 60_000) {
        settings.protocol.chunk_pacing_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PIXELHUB_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct EnvSource<F>(F);

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn string(&self, name: &str) -> Option<String> {
        self.raw(name).filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = self.raw(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.raw(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = self.raw(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
