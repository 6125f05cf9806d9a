/// Read-only schema browser for the local server

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::mysql::MySqlRow;
use sqlx::{Executor, Row};
use tracing::debug;

use crate::core::database::MySqlClient;
use crate::utils::{is_builtin_schema, quote_identifier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseEntry {
    pub name: String,
    pub builtin: bool,
}

/// One row of `DESCRIBE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub field: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub null: String,
    pub key: String,
    pub default: Option<String>,
    pub extra: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Clone)]
pub struct SchemaBrowser {
    client: MySqlClient,
}

impl SchemaBrowser {
    pub fn new(client: MySqlClient) -> Self {
        Self { client }
    }

    pub async fn list_databases(&self, include_builtin: bool) -> Result<Vec<DatabaseEntry>> {
        let names = self
            .client
            .with_session(|conn| {
                Box::pin(async move {
                    let rows = conn.fetch_all("SHOW DATABASES").await?;
                    rows.iter()
                        .map(|row| row.try_get_unchecked::<String, _>(0))
                        .collect::<Result<Vec<_>, _>>()
                })
            })
            .await
            .context("Failed to list databases")?;

        debug!(count = names.len(), include_builtin, "Listed databases");
        Ok(filter_databases(names, include_builtin))
    }

    pub async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        let sql = format!("SHOW TABLES FROM {}", quote_identifier(database));

        self.client
            .with_session(move |conn| {
                Box::pin(async move {
                    let rows = conn.fetch_all(sql.as_str()).await?;
                    rows.iter()
                        .map(|row| row.try_get_unchecked::<String, _>(0))
                        .collect::<Result<Vec<_>, _>>()
                })
            })
            .await
            .with_context(|| format!("Failed to list tables in '{}'", database))
    }

    pub async fn describe_table(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!("DESCRIBE {}", qualified_name(database, table));

        self.client
            .with_session(move |conn| {
                Box::pin(async move {
                    let rows = conn.fetch_all(sql.as_str()).await?;
                    Ok::<_, sqlx::Error>(rows.iter().map(column_info).collect())
                })
            })
            .await
            .with_context(|| format!("Failed to describe {}.{}", database, table))
    }

    /// Column names plus up to `limit` rows rendered as text
    pub async fn preview_rows(&self, database: &str, table: &str, limit: usize) -> Result<TablePreview> {
        let name = qualified_name(database, table);
        let describe = format!("DESCRIBE {}", name);
        let select = format!("SELECT * FROM {} LIMIT {}", name, limit);

        self.client
            .with_session(move |conn| {
                Box::pin(async move {
                    // Column names come from DESCRIBE so empty tables still have a header
                    let columns: Vec<String> = (&mut *conn)
                        .fetch_all(describe.as_str())
                        .await?
                        .iter()
                        .map(|row| cell_text(row, 0))
                        .collect();

                    let rows: Vec<Vec<String>> = (&mut *conn)
                        .fetch_all(select.as_str())
                        .await?
                        .iter()
                        .map(|row| {
                            (0..row.columns().len())
                                .map(|i| cell_text(row, i))
                                .collect::<Vec<_>>()
                        })
                        .collect();

                    Ok::<_, sqlx::Error>(TablePreview { columns, rows })
                })
            })
            .await
            .with_context(|| format!("Failed to preview {}.{}", database, table))
    }
}

/// Sort builtin schemas out unless requested; flag them when kept
pub fn filter_databases(names: Vec<String>, include_builtin: bool) -> Vec<DatabaseEntry> {
    names
        .into_iter()
        .map(|name| DatabaseEntry {
            builtin: is_builtin_schema(&name),
            name,
        })
        .filter(|entry| include_builtin || !entry.builtin)
        .collect()
}

fn qualified_name(database: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(database), quote_identifier(table))
}

fn column_info(row: &MySqlRow) -> ColumnInfo {
    let default = match row.try_get_unchecked::<Option<String>, _>(4) {
        Ok(value) => value,
        Err(_) => Some(BINARY_CELL.to_string()),
    };

    ColumnInfo {
        field: cell_text(row, 0),
        column_type: cell_text(row, 1),
        null: cell_text(row, 2),
        key: cell_text(row, 3),
        default,
        extra: cell_text(row, 5),
    }
}

const NULL_CELL: &str = "NULL";
const BINARY_CELL: &str = "<binary>";

/// Any column as display text. Queries run over the text protocol, so
/// everything except non-UTF-8 blobs decodes as a string.
fn cell_text(row: &MySqlRow, index: usize) -> String {
    match row.try_get_unchecked::<Option<String>, _>(index) {
        Ok(Some(value)) => value,
        Ok(None) => NULL_CELL.to_string(),
        Err(_) => BINARY_CELL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_schemas_hidden_by_default() {
        let all = names(&["information_schema", "shop", "mysql", "performance_schema", "sys", "crm"]);

        let visible = filter_databases(all.clone(), false);
        let visible_names: Vec<&str> = visible.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(visible_names, vec!["shop", "crm"]);

        let everything = filter_databases(all, true);
        assert_eq!(everything.len(), 6);
        assert!(everything.iter().find(|d| d.name == "sys").unwrap().builtin);
        assert!(!everything.iter().find(|d| d.name == "crm").unwrap().builtin);
    }

    #[test]
    fn test_qualified_name_quotes_both_parts() {
        assert_eq!(qualified_name("shop", "orders"), "`shop`.`orders`");
        assert_eq!(qualified_name("we`ird", "t"), "`we``ird`.`t`");
    }

    #[test]
    fn test_column_info_serializes_type_field() {
        let info = ColumnInfo {
            field: "id".to_string(),
            column_type: "int".to_string(),
            null: "NO".to_string(),
            key: "PRI".to_string(),
            default: None,
            extra: "auto_increment".to_string(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "int");
        assert!(json["default"].is_null());
    }

    #[tokio::test]
    #[ignore] // Only run when a local MySQL server is running
    async fn test_list_databases_live() {
        let config = crate::utils::AppConfig::load().unwrap();
        let browser = SchemaBrowser::new(MySqlClient::new(&config.database));

        let all = browser.list_databases(true).await.unwrap();
        assert!(all.iter().any(|d| d.name == "mysql" && d.builtin));

        let tables = browser.list_tables("mysql").await.unwrap();
        assert!(tables.iter().any(|t| t == "user"));
    }
}
