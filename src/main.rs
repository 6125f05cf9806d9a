use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gamma_cli::app::App;
use gamma_cli::cli::{Cli, Commands, ConfigCommands, OutputFormat};
use gamma_cli::core::metrics::{MetricSnapshot, DATABASE_PLACEHOLDER, HOST_PLACEHOLDER};
use gamma_cli::core::{server_process_running, LiveCollector, MetricsRefresher, MySqlClient, SchemaBrowser, StatusSource};
use gamma_cli::utils::logging::{init_logging, LogTarget};
use gamma_cli::utils::{format_duration, truncate_string, AppConfig};

// Widest cell printed by `preview`
const MAX_CELL_WIDTH: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::config_path()?,
    };
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => AppConfig::load()?,
    };
    cli.database.apply(&mut config.database);
    if let Some(interval) = cli.interval {
        config.metrics.auto_refresh = Some(interval);
    }

    // The TUI owns the terminal, so it logs to a file
    let log_target = match cli.command {
        None => LogTarget::File(log_file(&config)?),
        Some(_) => LogTarget::Stderr,
    };
    let _log_guard = init_logging(&config.logging, log_target)?;

    match cli.command {
        None => {
            // No command - run interactive TUI
            let mut app = App::new(&config)?;
            app.run().await?;
        }
        Some(Commands::Metrics { format, watch }) => {
            handle_metrics(&config, format, watch).await?;
        }
        Some(Commands::Status) => {
            handle_status(&config).await?;
        }
        Some(Commands::Databases { all }) => {
            handle_databases(&config, all).await?;
        }
        Some(Commands::Tables { database }) => {
            handle_tables(&config, &database).await?;
        }
        Some(Commands::Describe { database, table }) => {
            handle_describe(&config, &database, &table).await?;
        }
        Some(Commands::Preview { database, table, rows }) => {
            handle_preview(&config, &database, &table, rows).await?;
        }
        Some(Commands::Config { command }) => {
            handle_config(command, &config, &config_path)?;
        }
        #[cfg(feature = "server")]
        Some(Commands::Serve { port, host, cors }) => {
            gamma_cli::server::run(&config, host, port, cors).await?;
        }
    }

    Ok(())
}

fn log_file(config: &AppConfig) -> Result<PathBuf> {
    match &config.logging.file {
        Some(file) => Ok(file.clone()),
        None => Ok(AppConfig::config_dir()?.join("gamma.log")),
    }
}

async fn handle_metrics(config: &AppConfig, format: OutputFormat, watch: Option<Duration>) -> Result<()> {
    let refresher = MetricsRefresher::new(LiveCollector::from_config(config));

    loop {
        let rx = refresher
            .trigger()
            .context("A metrics refresh is already running")?;
        let snapshot = rx.await.context("Metrics refresh ended without a snapshot")?;

        match format {
            OutputFormat::Table => print_metrics_table(&snapshot),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        }

        let Some(interval) = watch else {
            break;
        };
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        if format == OutputFormat::Table {
            println!();
        }
    }

    Ok(())
}

fn print_metrics_table(snapshot: &MetricSnapshot) {
    println!(
        "Performance Metrics ({})\n",
        snapshot.collected_at().format("%Y-%m-%d %H:%M:%S")
    );
    println!("{:<28} {}", "Metric", "Value");
    println!("{}", "-".repeat(80));

    for (label, value) in snapshot.iter() {
        let value = if value == DATABASE_PLACEHOLDER || value == HOST_PLACEHOLDER {
            value.dimmed()
        } else {
            value.normal()
        };
        println!("{:<28} {}", label, value);
    }
}

async fn handle_status(config: &AppConfig) -> Result<()> {
    let names = config.metrics.server_process.clone();
    let running = tokio::task::spawn_blocking(move || server_process_running(&names))
        .await
        .context("Process scan failed")?;

    let client = MySqlClient::new(&config.database);

    println!("Database Server Status\n");
    println!("{:<12} {}", "Endpoint:", client.endpoint());
    println!(
        "{:<12} {}",
        "Process:",
        if running { "running".green() } else { "not running".red() }
    );

    match client.status_variable("Uptime").await {
        Ok(uptime) => {
            println!("{:<12} {}", "Connection:", "ok".green());
            if let Some(secs) = uptime.and_then(|u| u.parse::<u64>().ok()) {
                println!("{:<12} {}", "Uptime:", format_duration(secs));
            }
        }
        Err(e) => {
            println!("{:<12} {}", "Connection:", "failed".red());
            println!("{:<12} {}", "", e.to_string().dimmed());
        }
    }

    if config.database.is_insecure_default() {
        println!(
            "\n{} connecting as root without a password; set GAMMA_DB_PASSWORD",
            "Warning:".yellow()
        );
    }

    Ok(())
}

async fn handle_databases(config: &AppConfig, all: bool) -> Result<()> {
    let browser = SchemaBrowser::new(MySqlClient::new(&config.database));
    let databases = browser.list_databases(all).await?;

    println!("{:<40} {}", "Database", "Type");
    println!("{}", "-".repeat(50));
    for db in &databases {
        let kind = if db.builtin { "built-in".dimmed() } else { "user".normal() };
        println!("{:<40} {}", db.name, kind);
    }
    println!("\n{} database(s)", databases.len());

    Ok(())
}

async fn handle_tables(config: &AppConfig, database: &str) -> Result<()> {
    let browser = SchemaBrowser::new(MySqlClient::new(&config.database));
    let tables = browser.list_tables(database).await?;

    println!("Tables in {}\n", database.bold());
    for table in &tables {
        println!("  {}", table);
    }
    println!("\n{} table(s)", tables.len());

    Ok(())
}

async fn handle_describe(config: &AppConfig, database: &str, table: &str) -> Result<()> {
    let browser = SchemaBrowser::new(MySqlClient::new(&config.database));
    let columns = browser.describe_table(database, table).await?;

    println!(
        "{:<24} {:<24} {:<5} {:<5} {:<16} {}",
        "Field", "Type", "Null", "Key", "Default", "Extra"
    );
    println!("{}", "-".repeat(90));
    for c in columns {
        println!(
            "{:<24} {:<24} {:<5} {:<5} {:<16} {}",
            c.field,
            c.column_type,
            c.null,
            c.key,
            c.default.as_deref().unwrap_or("NULL"),
            c.extra
        );
    }

    Ok(())
}

async fn handle_preview(config: &AppConfig, database: &str, table: &str, limit: usize) -> Result<()> {
    let browser = SchemaBrowser::new(MySqlClient::new(&config.database));
    let preview = browser.preview_rows(database, table, limit).await?;

    let cells: Vec<Vec<String>> = preview
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| truncate_string(cell, MAX_CELL_WIDTH)).collect())
        .collect();

    let widths: Vec<usize> = preview
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(name.chars().count().min(MAX_CELL_WIDTH)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = preview
        .columns
        .iter()
        .zip(&widths)
        .map(|(name, width)| format!("{:<width$}", truncate_string(name, MAX_CELL_WIDTH), width = width))
        .collect();
    println!("{}", header.join(" | ").bold());
    println!("{}", "-".repeat(header.join(" | ").chars().count()));

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        println!("{}", line.join(" | "));
    }
    println!("\n{} row(s)", cells.len());

    Ok(())
}

fn handle_config(command: ConfigCommands, config: &AppConfig, path: &Path) -> Result<()> {
    match command {
        ConfigCommands::View => {
            let mut shown = config.clone();
            if shown.database.password.as_deref().is_some_and(|p| !p.is_empty()) {
                shown.database.password = Some("****".to_string());
            }
            println!("# {}\n", path.display());
            println!("{}", toml::to_string_pretty(&shown).context("Failed to serialize config")?);
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AppConfig::default().save_to(path)?;
            println!("{} Wrote default configuration to {}", "✓".green(), path.display());
        }
    }

    Ok(())
}
