/// Local MySQL access
///
/// Every operation runs inside `with_session`: open a fresh connection, run
/// the work, close the connection whatever the outcome. Nothing is pooled or
/// cached, so an absent or stalled server only affects the call that hit it.

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Executor, Row};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::error::MetricError;
use crate::utils::app_config::DatabaseConfig;

/// Reads one server status variable
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// `Ok(None)` when the query ran but the variable does not exist
    async fn status_variable(&self, name: &str) -> Result<Option<String>, MetricError>;
}

#[derive(Clone)]
pub struct MySqlClient {
    options: MySqlConnectOptions,
    connect_timeout: Duration,
    query_timeout: Duration,
    endpoint: String,
}

impl MySqlClient {
    pub fn new(config: &DatabaseConfig) -> Self {
        if config.is_insecure_default() {
            warn!(
                user = %config.user,
                "Connecting as root without a password; set GAMMA_DB_PASSWORD or [database].password"
            );
        }

        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .database(&config.database);

        if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
            options = options.password(password);
        }

        Self {
            options,
            connect_timeout: config.connect_timeout,
            query_timeout: config.query_timeout,
            endpoint: format!("{}@{}:{}", config.user, config.host, config.port),
        }
    }

    /// `user@host:port`, for messages
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Acquire a connection, run `work` on it, release it.
    ///
    /// The connection is closed even when `work` fails. Connecting is bounded
    /// by `connect_timeout`; the work and the close are each bounded by
    /// `query_timeout`, so a server that stalls mid-session still yields an
    /// error instead of hanging the caller.
    pub async fn with_session<T, F>(&self, work: F) -> Result<T, MetricError>
    where
        F: for<'c> FnOnce(&'c mut MySqlConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>,
    {
        let mut conn = timeout(self.connect_timeout, MySqlConnection::connect_with(&self.options))
            .await
            .map_err(|_| self.timed_out("connection", self.connect_timeout))??;

        let result = match timeout(self.query_timeout, work(&mut conn)).await {
            Ok(result) => result.map_err(MetricError::from),
            // Dropping the connection abandons the stalled query
            Err(_) => return Err(self.timed_out("query", self.query_timeout)),
        };

        match timeout(self.query_timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(endpoint = %self.endpoint, error = %e, "Failed to close connection cleanly")
            }
            Err(_) => debug!(endpoint = %self.endpoint, "Timed out closing connection"),
        }

        result
    }

    fn timed_out(&self, stage: &str, limit: Duration) -> MetricError {
        MetricError::database(format!(
            "{} to {} timed out after {}",
            stage,
            self.endpoint,
            humantime::format_duration(limit)
        ))
    }

    /// Check that the server accepts connections
    pub async fn ping(&self) -> Result<(), MetricError> {
        self.with_session(|conn| Box::pin(async move { conn.ping().await }))
            .await
    }
}

#[async_trait]
impl StatusSource for MySqlClient {
    async fn status_variable(&self, name: &str) -> Result<Option<String>, MetricError> {
        let sql = status_query(name)?;

        self.with_session(move |conn| {
            Box::pin(async move {
                let row = conn.fetch_optional(sql.as_str()).await?;
                row.map(|r| r.try_get_unchecked::<String, _>(1)).transpose()
            })
        })
        .await
    }
}

/// `SHOW GLOBAL STATUS` for a single variable.
///
/// SHOW statements cannot be prepared on older servers, so the name is
/// inlined and therefore restricted to `[A-Za-z0-9_]`.
pub fn status_query(name: &str) -> Result<String, MetricError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(MetricError::database(format!("invalid status variable name: {:?}", name)));
    }
    Ok(format!("SHOW GLOBAL STATUS WHERE Variable_name = '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::DATABASE_PLACEHOLDER;

    #[test]
    fn test_status_query() {
        assert_eq!(
            status_query("Threads_connected").unwrap(),
            "SHOW GLOBAL STATUS WHERE Variable_name = 'Threads_connected'"
        );
        assert!(status_query("x' OR '1'='1").is_err());
        assert!(status_query("").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Port 1 on localhost refuses connections
        let config = DatabaseConfig {
            port: 1,
            connect_timeout: Duration::from_millis(500),
            ..DatabaseConfig::default()
        };
        let client = MySqlClient::new(&config);

        let err = client.status_variable("Uptime").await.unwrap_err();
        assert_eq!(err.placeholder(), DATABASE_PLACEHOLDER);
    }

    // Minimal MySQL peer: greets, accepts any login, answers the session
    // `SET ...` with OK, then never answers another command.
    mod stalling_server {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        // OK packet with SERVER_STATUS_AUTOCOMMIT
        const OK: &[u8] = &[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];

        fn greeting() -> Vec<u8> {
            // PROTOCOL_41 | CONNECT_WITH_DB | SECURE_CONNECTION | PLUGIN_AUTH
            let capabilities: u32 = 0x0200 | 0x0008 | 0x8000 | 0x0008_0000;

            let mut p = vec![0x0a];
            p.extend_from_slice(b"8.0.36\0");
            p.extend_from_slice(&7u32.to_le_bytes());
            p.extend_from_slice(b"abcdefgh");
            p.push(0);
            p.extend_from_slice(&(capabilities as u16).to_le_bytes());
            p.push(0x21);
            p.extend_from_slice(&0x0002u16.to_le_bytes());
            p.extend_from_slice(&((capabilities >> 16) as u16).to_le_bytes());
            p.push(21);
            p.extend_from_slice(&[0; 10]);
            p.extend_from_slice(b"ijklmnopqrst\0");
            p.extend_from_slice(b"mysql_native_password\0");
            p
        }

        async fn read_packet(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
            let mut header = [0u8; 4];
            stream.read_exact(&mut header).await?;
            let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
            let mut payload = vec![0u8; len];
            stream.read_exact(&mut payload).await?;
            Ok(payload)
        }

        async fn write_packet(stream: &mut TcpStream, seq: u8, payload: &[u8]) -> std::io::Result<()> {
            let mut packet = (payload.len() as u32).to_le_bytes()[..3].to_vec();
            packet.push(seq);
            packet.extend_from_slice(payload);
            stream.write_all(&packet).await
        }

        async fn serve(mut stream: TcpStream) -> std::io::Result<()> {
            write_packet(&mut stream, 0, &greeting()).await?;
            read_packet(&mut stream).await?;
            write_packet(&mut stream, 2, OK).await?;

            loop {
                let payload = read_packet(&mut stream).await?;
                if payload.starts_with(b"\x03SET") {
                    write_packet(&mut stream, 1, OK).await?;
                }
            }
        }

        pub async fn spawn() -> u16 {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve(stream));
                }
            });
            port
        }
    }

    #[tokio::test]
    async fn test_stalled_server_times_out() {
        let port = stalling_server::spawn().await;
        let config = DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout: Duration::from_secs(2),
            query_timeout: Duration::from_millis(300),
            ..DatabaseConfig::default()
        };
        let client = MySqlClient::new(&config);

        let outcome = tokio::time::timeout(Duration::from_secs(5), client.status_variable("Uptime"))
            .await
            .expect("status query outlived its timeout");

        let err = outcome.unwrap_err();
        assert_eq!(err.placeholder(), DATABASE_PLACEHOLDER);
        assert!(err.to_string().contains("query to"), "unexpected error: {}", err);
        assert!(err.to_string().contains("timed out"), "unexpected error: {}", err);
    }

    #[tokio::test]
    #[ignore] // Only run when a local MySQL server is running
    async fn test_status_variable_live() {
        let client = MySqlClient::new(&crate::utils::AppConfig::load().unwrap().database);
        let uptime = client.status_variable("Uptime").await.unwrap();
        assert!(uptime.unwrap().parse::<u64>().is_ok());
    }
}
