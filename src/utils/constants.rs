/// Defaults and fixed names for the bundled MySQL server

use std::time::Duration;

pub const DEFAULT_DB_HOST: &str = "127.0.0.1";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_USER: &str = "root";
pub const DEFAULT_DB_NAME: &str = "mysql";
pub const DEFAULT_DB_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_DB_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// CPU usage is averaged over this window
pub const DEFAULT_CPU_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Executable names of the bundled server (Windows build ships mysqld.exe)
pub const DEFAULT_SERVER_PROCESSES: &[&str] = &["mysqld", "mysqld.exe"];

/// Schemas created by MySQL itself, hidden in the browser by default
pub const BUILTIN_SCHEMAS: &[&str] = &[
    "information_schema",
    "performance_schema",
    "mysql",
    "sys",
];

/// Rows fetched by `preview` unless overridden
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Environment variable overriding the log filter
pub const LOG_ENV_VAR: &str = "GAMMA_LOG";

pub fn is_builtin_schema(name: &str) -> bool {
    BUILTIN_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas() {
        assert!(is_builtin_schema("mysql"));
        assert!(is_builtin_schema("INFORMATION_SCHEMA"));
        assert!(!is_builtin_schema("shop"));
    }
}
