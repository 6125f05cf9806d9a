/// HTTP API Server module
/// Serves metric snapshots and schema listings over the same core as the TUI

#[cfg(feature = "server")]
pub mod routes;

#[cfg(feature = "server")]
pub mod handlers;

#[cfg(feature = "server")]
pub mod websocket;

#[cfg(feature = "server")]
pub use routes::create_router;

#[cfg(feature = "server")]
pub use state::AppState;

#[cfg(feature = "server")]
mod state {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;

    use crate::core::browser::SchemaBrowser;
    use crate::core::database::MySqlClient;
    use crate::core::host::SysinfoProbe;
    use crate::core::metrics::MetricSnapshot;
    use crate::core::{LiveCollector, MetricsRefresher};
    use crate::utils::AppConfig;

    /// Default push interval of /ws/metrics when auto_refresh is not configured
    const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_secs(5);

    #[derive(Clone)]
    pub struct AppState {
        pub refresher: MetricsRefresher<MySqlClient, SysinfoProbe>,
        pub browser: SchemaBrowser,
        pub client: MySqlClient,
        pub server_processes: Arc<Vec<String>>,
        /// Last delivered snapshot, served while a refresh is in flight
        pub latest: Arc<RwLock<Option<MetricSnapshot>>>,
        pub stream_interval: Duration,
    }

    impl AppState {
        pub fn new(config: &AppConfig) -> Self {
            let client = MySqlClient::new(&config.database);
            Self {
                refresher: MetricsRefresher::new(LiveCollector::from_config(config)),
                browser: SchemaBrowser::new(client.clone()),
                client,
                server_processes: Arc::new(config.metrics.server_process.clone()),
                latest: Arc::new(RwLock::new(None)),
                stream_interval: config.metrics.auto_refresh.unwrap_or(DEFAULT_STREAM_INTERVAL),
            }
        }
    }
}

#[cfg(feature = "server")]
pub async fn run(config: &crate::utils::AppConfig, host: String, port: u16, enable_cors: bool) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::net::SocketAddr;

    let state = AppState::new(config);
    let app = create_router(state, enable_cors);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    println!("Gamma Metrics Server");
    println!("   API:      http://{}/api", addr);
    println!("   Database: {}", config.database.host);
    println!();
    println!("API Endpoints:");
    println!("   GET  /api/metrics    - Collect a metrics snapshot");
    println!("   GET  /api/status     - Server process and connectivity");
    println!("   GET  /api/databases  - List databases (?all=true for built-ins)");
    println!("   GET  /api/health     - Health check");
    println!("   GET  /ws/metrics     - WebSocket snapshot stream");
    println!();

    tracing::info!(%addr, cors = enable_cors, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
