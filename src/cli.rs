/// CLI argument parsing

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::app_config::DatabaseConfig;

// Build timestamp injected at compile time
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser, Debug)]
#[command(name = "gamma-cli")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: <config dir>/gamma-cli/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Auto-refresh interval for the dashboard, e.g. "10s"
    #[arg(long, value_parser = parse_duration, value_name = "DURATION")]
    pub interval: Option<Duration>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Connection overrides; take precedence over file and environment
#[derive(Args, Debug, Default, Clone)]
pub struct DatabaseArgs {
    /// Database host
    #[arg(long = "db-host", global = true, value_name = "HOST")]
    pub host: Option<String>,

    /// Database port
    #[arg(long = "db-port", global = true, value_name = "PORT")]
    pub port: Option<u16>,

    /// Database user
    #[arg(long = "db-user", global = true, value_name = "USER")]
    pub user: Option<String>,

    /// Default schema
    #[arg(long = "db-name", global = true, value_name = "NAME")]
    pub name: Option<String>,
}

impl DatabaseArgs {
    pub fn apply(&self, config: &mut DatabaseConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(name) = &self.name {
            config.database = name.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect and print performance metrics
    Metrics {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Re-collect and print every interval until interrupted, e.g. "5s"
        #[arg(short, long, value_parser = parse_duration, value_name = "DURATION")]
        watch: Option<Duration>,
    },

    /// Show whether the database server is running and reachable
    Status,

    /// List databases
    Databases {
        /// Include built-in schemas (mysql, sys, ...)
        #[arg(short, long)]
        all: bool,
    },

    /// List tables in a database
    Tables {
        database: String,
    },

    /// Show the columns of a table
    Describe {
        database: String,
        table: String,
    },

    /// Show the first rows of a table
    Preview {
        database: String,
        table: String,

        /// Number of rows to fetch
        #[arg(short = 'n', long, default_value_t = crate::utils::DEFAULT_PREVIEW_ROWS)]
        rows: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run HTTP API server mode
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Enable CORS for cross-origin requests
        #[arg(long)]
        cors: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// View configuration (password masked)
    View,

    /// Print the configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_command_parses() {
        let cli = Cli::try_parse_from(["gamma-cli", "metrics", "--format", "json", "--watch", "5s"]).unwrap();
        match cli.command {
            Some(Commands::Metrics { format, watch }) => {
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(watch, Some(Duration::from_secs(5)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        assert!(Cli::try_parse_from(["gamma-cli", "--interval", "0s"]).is_err());
    }

    #[test]
    fn test_database_overrides_apply() {
        let cli = Cli::try_parse_from(["gamma-cli", "status", "--db-port", "3307", "--db-user", "app"]).unwrap();
        let mut config = DatabaseConfig::default();
        cli.database.apply(&mut config);

        assert_eq!(config.port, 3307);
        assert_eq!(config.user, "app");
        assert_eq!(config.host, crate::utils::DEFAULT_DB_HOST);
    }

    #[test]
    fn test_preview_defaults_row_count() {
        let cli = Cli::try_parse_from(["gamma-cli", "preview", "shop", "orders"]).unwrap();
        match cli.command {
            Some(Commands::Preview { rows, .. }) => assert_eq!(rows, crate::utils::DEFAULT_PREVIEW_ROWS),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
