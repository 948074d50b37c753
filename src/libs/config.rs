use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::libs::dialect::Dialect;
use crate::libs::error::{ConsoleError, ConsoleResult};
use crate::libs::permissions::PermissionModel;

/// Runtime settings for the console.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    pub database_url: String,
    /// Overrides the dialect guessed from `database_url`.
    #[serde(default)]
    pub dialect: Option<Dialect>,
    /// Per-table key column; tables not listed key on their first column.
    #[serde(default)]
    pub key_columns: HashMap<String, String>,
    /// JSON permission table; the built-in library table when absent.
    #[serde(default)]
    pub permissions_file: Option<PathBuf>,
}

impl ConsoleConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            dialect: None,
            key_columns: HashMap::new(),
            permissions_file: None,
        }
    }

    pub fn with_key_column(mut self, table: &str, column: &str) -> Self {
        self.key_columns.insert(table.to_string(), column.to_string());
        self
    }

    /// Reads `BOOKHAVEN_*` variables, falling back to `DATABASE_URL`.
    pub fn from_env() -> ConsoleResult<Self> {
        let database_url = env::var("BOOKHAVEN_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .map_err(|_| ConsoleError::InvalidConfig("BOOKHAVEN_DATABASE_URL is not set".into()))?;

        let mut config = Self::new(database_url);
        if let Ok(dialect) = env::var("BOOKHAVEN_DIALECT") {
            config.dialect = Some(dialect.parse()?);
        }
        if let Ok(path) = env::var("BOOKHAVEN_PERMISSIONS") {
            config.permissions_file = Some(PathBuf::from(path));
        }
        if let Ok(keys) = env::var("BOOKHAVEN_KEY_COLUMNS") {
            config.key_columns = parse_key_columns(&keys)?;
        }
        Ok(config)
    }

    pub fn dialect(&self) -> ConsoleResult<Dialect> {
        self.dialect
            .or_else(|| Dialect::from_url(&self.database_url))
            .ok_or_else(|| {
                ConsoleError::InvalidConfig(format!(
                    "cannot infer dialect from {}",
                    self.database_url.split(':').next().unwrap_or_default()
                ))
            })
    }

    pub fn permissions(&self) -> ConsoleResult<PermissionModel> {
        match &self.permissions_file {
            Some(path) => PermissionModel::from_file(path),
            None => Ok(PermissionModel::library()),
        }
    }
}

/// `book=isbn,member=member_id`
fn parse_key_columns(raw: &str) -> ConsoleResult<HashMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((table, column)) if !table.trim().is_empty() && !column.trim().is_empty() => {
                Ok((table.trim().to_string(), column.trim().to_string()))
            }
            _ => Err(ConsoleError::InvalidConfig(format!("bad key column entry {pair:?}"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_column_overrides() {
        let keys = parse_key_columns("book = isbn, member=member_id,").unwrap();
        assert_eq!(keys.get("book").map(String::as_str), Some("isbn"));
        assert_eq!(keys.get("member").map(String::as_str), Some("member_id"));
        assert!(parse_key_columns("book").is_err());
    }

    #[test]
    fn explicit_dialect_wins() {
        let mut config = ConsoleConfig::new("sqlite://lib.db");
        assert_eq!(config.dialect().unwrap(), Dialect::Sqlite);
        config.dialect = Some(Dialect::MySql);
        assert_eq!(config.dialect().unwrap(), Dialect::MySql);
        assert!(ConsoleConfig::new("odbc:lib").dialect().is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let config: ConsoleConfig = serde_json::from_str(
            r#"{ "database_url": "postgres://localhost/lib", "key_columns": { "book": "isbn" } }"#,
        )
        .unwrap();
        assert_eq!(config.dialect().unwrap(), Dialect::Postgres);
        assert_eq!(config.key_columns["book"], "isbn");
        assert!(config.permissions_file.is_none());
    }
}
