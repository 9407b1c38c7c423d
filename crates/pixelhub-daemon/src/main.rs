//! # pixelhub
//!
//! Pixel hub server binary. Loads settings, applies CLI overrides, and runs
//! the WebSocket broadcast hub until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pixelhub_server::{HubServer, ServerConfig};
use pixelhub_settings::HubSettings;

/// Pixel hub server.
#[derive(Parser, Debug)]
#[command(name = "pixelhub", about = "Real-time pixel broadcast hub")]
struct Cli {
    /// Settings file (defaults to `pixelhub.json` in the working directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Directory of static client assets (overrides settings).
    #[arg(long, conflicts_with = "no_static")]
    static_dir: Option<String>,

    /// Disable static asset serving.
    #[arg(long)]
    no_static: bool,

    /// Log level filter, e.g. `debug` or `pixelhub_server=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(pixelhub_settings::loader::settings_path)
    }

    /// Layer CLI flags over the file/env settings.
    fn apply(&self, settings: &mut HubSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            settings.server.static_dir = Some(dir.clone());
        }
        if self.no_static {
            settings.server.static_dir = None;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn resolve_settings(cli: &Cli) -> Result<HubSettings> {
    let path = cli.settings_path();
    let mut settings = pixelhub_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    pixelhub_core::logging::init_subscriber(&settings.logging.level);

    let metrics = pixelhub_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = HubServer::new(ServerConfig::from(&settings)).with_metrics(metrics);
    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        "pixelhub listening on http://{addr} (websocket path {})",
        server.config().ws_path
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!(
        connections = server.registry().count(),
        "Shutting down..."
    );
    if !server.shutdown().graceful_shutdown(None).await {
        tracing::warn!("connection tasks did not finish before the shutdown timeout");
    }
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_untouched() {
        let cli = Cli::parse_from(["pixelhub"]);
        let mut settings = HubSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.static_dir(), Some("./static"));
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn cli_overrides_host_and_port() {
        let cli = Cli::parse_from(["pixelhub", "--host", "127.0.0.1", "--port", "9000"]);
        let mut settings = HubSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9000);
    }

    #[test]
    fn cli_static_dir_override() {
        let cli = Cli::parse_from(["pixelhub", "--static-dir", "/srv/canvas"]);
        let mut settings = HubSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.static_dir(), Some("/srv/canvas"));
    }

    #[test]
    fn cli_no_static_disables_serving() {
        let cli = Cli::parse_from(["pixelhub", "--no-static"]);
        let mut settings = HubSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.static_dir(), None);
        assert_eq!(ServerConfig::from(&settings).static_dir, None);
    }

    #[test]
    fn cli_static_flags_conflict() {
        let result = Cli::try_parse_from(["pixelhub", "--static-dir", "x", "--no-static"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_log_level_override() {
        let cli = Cli::parse_from(["pixelhub", "--log-level", "debug"]);
        let mut settings = HubSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn cli_config_path() {
        let cli = Cli::parse_from(["pixelhub", "--config", "/etc/pixelhub.json"]);
        assert_eq!(cli.settings_path(), PathBuf::from("/etc/pixelhub.json"));
        let cli = Cli::parse_from(["pixelhub"]);
        assert_eq!(cli.settings_path(), PathBuf::from("pixelhub.json"));
    }

    #[test]
    fn resolve_settings_layers_file_then_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixelhub.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 7000, "wsPath": "/pixels"}, "protocol": {"maxBatchFields": 16}}"#,
        )
        .unwrap();
        let cli = Cli::parse_from([
            "pixelhub",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "7001",
        ]);

        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.server.port, 7001);
        assert_eq!(settings.server.ws_path, "/pixels");
        assert_eq!(settings.protocol.max_batch_fields, 16);
    }

    #[test]
    fn resolve_settings_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixelhub.json");
        std::fs::write(&path, r#"{"transport": {"idleTimeoutSecs": 5, "pingIntervalSecs": 15}}"#)
            .unwrap();
        let cli = Cli::parse_from(["pixelhub", "--config", path.to_str().unwrap()]);

        let err = resolve_settings(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("idleTimeoutSecs"));
    }

    #[test]
    fn resolve_settings_rejects_zero_ping_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixelhub.json");
        std::fs::write(&path, r#"{"transport": {"pingTimeoutSecs": 0}}"#).unwrap();
        let cli = Cli::parse_from(["pixelhub", "--config", path.to_str().unwrap()]);

        let err = resolve_settings(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("pingTimeoutSecs"));
    }

    #[test]
    fn resolve_settings_reports_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixelhub.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cli = Cli::parse_from(["pixelhub", "--config", path.to_str().unwrap()]);

        let err = resolve_settings(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to load settings"));
    }

    #[tokio::test]
    async fn server_boots_and_responds() {
        let cli = Cli::parse_from([
            "pixelhub",
            "--config",
            "/nonexistent/pixelhub.json",
            "--host",
            "127.0.0.1",
            "--port",
            "0",
            "--no-static",
        ]);
        let settings = resolve_settings(&cli).unwrap();
        let server = HubServer::new(ServerConfig::from(&settings));
        let (addr, handle) = server.listen().await.unwrap();

        let resp = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        assert!(
            server
                .shutdown()
                .graceful_shutdown(Some(std::time::Duration::from_secs(5)))
                .await
        );
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .unwrap();
    }
}
