//! Layered configuration for the demo harness: a config file (if present),
//! overridden by `RAFTLOG_*` environment variables, overridden by CLI flags.
//! The core library itself takes a bare path and never reads configuration —
//! only the demo binary needs this.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Harness configuration. Not consulted by [`crate::core::LogCore`] itself —
/// it exists purely to drive the demo binary.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the append-only log file.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Whether to fsync after every applied batch/propose, or leave it to an
    /// explicit `sync_now`. Defaults to `true` so a crash can't silently lose
    /// an acknowledged write.
    #[serde(default = "default_fsync")]
    pub fsync: bool,

    /// Log level for the `simplelog` logger installed by the binary.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("raftlog.log")
}

fn default_fsync() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self { log_path: default_log_path(), fsync: default_fsync(), log_level: default_log_level() }
    }
}

impl Config {
    /// Loads configuration layered file < environment, where `path` (if
    /// given) is an optional TOML file and environment variables are
    /// prefixed `RAFTLOG_` (e.g. `RAFTLOG_FSYNC=false`).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("log_path", "raftlog.log")
            .map_err(config_err)?
            .set_default("fsync", true)
            .map_err(config_err)?
            .set_default("log_level", "info")
            .map_err(config_err)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("RAFTLOG"));

        let config = builder.build().map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }
}

fn config_err(err: config::ConfigError) -> Error {
    Error::InvalidFormat(format!("config error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_file_or_env() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.log_path, PathBuf::from("raftlog.log"));
        assert!(config.fsync);
        assert_eq!(config.log_level, "info");
    }
}
