/// Application configuration management
/// Stores user preferences in <config dir>/gamma-cli/config.toml

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::utils::{
    DEFAULT_CPU_SAMPLE_INTERVAL, DEFAULT_DB_CONNECT_TIMEOUT, DEFAULT_DB_HOST, DEFAULT_DB_NAME,
    DEFAULT_DB_PORT, DEFAULT_DB_QUERY_TIMEOUT, DEFAULT_DB_USER, DEFAULT_SERVER_PROCESSES,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the local MySQL instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub database: String,
    #[serde(with = "humantime_serde_compat")]
    pub connect_timeout: Duration,
    /// Bound on each query and on closing the connection
    #[serde(with = "humantime_serde_compat")]
    pub query_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: None,
            database: DEFAULT_DB_NAME.to_string(),
            connect_timeout: DEFAULT_DB_CONNECT_TIMEOUT,
            query_timeout: DEFAULT_DB_QUERY_TIMEOUT,
        }
    }
}

impl DatabaseConfig {
    /// Superuser without a password, as shipped by the bundled server
    pub fn is_insecure_default(&self) -> bool {
        self.user == "root" && self.password.as_deref().map_or(true, str::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    #[serde(with = "humantime_serde_compat")]
    pub cpu_sample_interval: Duration,
    /// Periodic refresh; `None` refreshes only on demand
    #[serde(with = "humantime_serde_compat::option", skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<Duration>,
    /// Process names that identify a running database server
    pub server_process: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            cpu_sample_interval: DEFAULT_CPU_SAMPLE_INTERVAL,
            auto_refresh: None,
            server_process: DEFAULT_SERVER_PROCESSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl AppConfig {
    /// Directory holding config.toml and the default log file
    pub fn config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine the user config directory"))?;
        Ok(base.join("gamma-cli"))
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Override database settings from GAMMA_DB_* variables (.env is loaded by main)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GAMMA_DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("GAMMA_DB_PORT") {
            match port.parse() {
                Ok(port) => self.database.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid GAMMA_DB_PORT"),
            }
        }
        if let Some(user) = lookup("GAMMA_DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("GAMMA_DB_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(name) = lookup("GAMMA_DB_NAME") {
            self.database.database = name;
        }
    }
}

/// Durations as humantime strings ("1s", "250ms", "2m")
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => super::serialize(duration, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.database, DatabaseConfig::default());
        assert_eq!(config.metrics.cpu_sample_interval, Duration::from_secs(1));
        assert!(config.metrics.auto_refresh.is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database]").unwrap();
        writeln!(file, "user = \"monitor\"").unwrap();
        writeln!(file, "connect_timeout = \"500ms\"").unwrap();
        writeln!(file, "[metrics]").unwrap();
        writeln!(file, "auto_refresh = \"10s\"").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();

        assert_eq!(config.database.user, "monitor");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.metrics.auto_refresh, Some(Duration::from_secs(10)));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[metrics]").unwrap();
        writeln!(file, "cpu_sample_interval = \"soon\"").unwrap();

        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.database.password = Some("s3cret".to_string());
        config.metrics.auto_refresh = Some(Duration::from_secs(30));
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.database, config.database);
        assert_eq!(loaded.metrics, config.metrics);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GAMMA_DB_HOST", "db.local"),
            ("GAMMA_DB_PORT", "3307"),
            ("GAMMA_DB_PASSWORD", "pw"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.host, "db.local");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.password.as_deref(), Some("pw"));
        assert_eq!(config.database.user, "root");
    }

    #[test]
    fn test_bad_port_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|key| (key == "GAMMA_DB_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.database.port, 3306);
    }

    #[test]
    fn test_insecure_default_detection() {
        let mut db = DatabaseConfig::default();
        assert!(db.is_insecure_default());

        db.password = Some(String::new());
        assert!(db.is_insecure_default());

        db.password = Some("pw".to_string());
        assert!(!db.is_insecure_default());
    }
}
