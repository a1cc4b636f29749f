//! # Configuration
//!
//! JSON file adjacent to the binary. Every field has a default so a missing
//! or partial file never stops the recorder; unknown fields are ignored.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use ocap_persistence::DbConfig;

pub const CONFIG_FILE: &str = "ocap_recorder.cfg.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// trace | debug | info | warn | error
    pub log_level: String,
    /// Tag stamped on missions that do not carry one
    pub default_tag: String,
    pub logs_dir: PathBuf,
    pub api: ApiConfig,
    pub db: DbConfig,
    pub influx: InfluxConfig,
    pub graylog: GraylogConfig,
    pub logio: LogioConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            default_tag: "Op".to_string(),
            logs_dir: PathBuf::from("./ocaplogs"),
            api: ApiConfig::default(),
            db: DbConfig::default(),
            influx: InfluxConfig::default(),
            graylog: GraylogConfig::default(),
            logio: LogioConfig::default(),
        }
    }
}

/// Recording upload endpoint used by the web frontend's importer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    pub server_url: String,
    pub api_key: String,
}

/// Optional InfluxDB metrics sink settings. Parsed and surfaced; the sink
/// client itself ships with the host integration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfluxConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub token: String,
    pub org: String,
}

/// Optional Graylog log-streaming sidecar settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraylogConfig {
    pub enabled: bool,
    pub address: String,
}

/// Optional log.io sidecar settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogioConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load from an explicit path, or from `CONFIG_FILE` next to the
    /// binary. Missing or unreadable files fall back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => install_dir().join(CONFIG_FILE),
        };

        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "config parse failed, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Directory the binary lives in; snapshots, the status file, and exported
/// recordings land here.
pub fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str("{\"logLevel\":\"debug\"}").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.default_tag, "Op");
        assert_eq!(config.logs_dir, PathBuf::from("./ocaplogs"));
        assert_eq!(config.db.port, 5432);
        assert!(!config.influx.enabled);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config: Config =
            serde_json::from_str("{\"notARealOption\": 1, \"db\": {\"host\": \"10.0.0.2\"}}")
                .unwrap();
        assert_eq!(config.db.host, "10.0.0.2");
        assert_eq!(config.db.database, "ocap");
    }
}
