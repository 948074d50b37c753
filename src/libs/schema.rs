use std::collections::{BTreeSet, HashMap};

use sqlx::Row;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::libs::connection::ConnectionProvider;
use crate::libs::error::{ConsoleError, ConsoleResult};
use crate::libs::query_builder::{Ident, Statement};

/// Introspected shape of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    /// Column names in database order
    pub columns: Vec<String>,
    /// Columns the database generates; never written by the console
    pub identity_columns: BTreeSet<String>,
    /// Declared type per column, parallel to `columns`; empty when unknown
    column_types: Vec<String>,
    key_column: usize,
}

impl TableSchema {
    /// Keys on the first column.
    pub fn new(name: &str, columns: Vec<String>, identity_columns: BTreeSet<String>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            identity_columns,
            column_types: Vec::new(),
            key_column: 0,
        }
    }

    pub fn with_column_types(mut self, types: Vec<String>) -> Self {
        self.column_types = types;
        self
    }

    /// Keys on `column` instead, if the table has it.
    pub fn with_key_column(mut self, column: &str) -> Self {
        match self.position(column) {
            Some(idx) => self.key_column = idx,
            None => warn!(
                table = %self.name,
                column,
                "configured key column not found, keying on first column"
            ),
        }
        self
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn ident(&self, column: &str) -> Option<Ident<'_>> {
        self.position(column)
            .map(|idx| Ident::from_schema(&self.columns[idx]))
    }

    /// Declared type of `column` as the database reports it.
    pub fn column_type(&self, column: &str) -> Option<Ident<'_>> {
        self.position(column)
            .and_then(|idx| self.column_types.get(idx))
            .filter(|ty| !ty.is_empty())
            .map(|ty| Ident::from_schema(ty))
    }

    pub fn idents(&self) -> impl Iterator<Item = Ident<'_>> {
        self.columns.iter().map(|c| Ident::from_schema(c))
    }

    pub fn table_ident(&self) -> Ident<'_> {
        Ident::from_schema(&self.name)
    }

    pub fn key(&self) -> Ident<'_> {
        Ident::from_schema(
            self.columns
                .get(self.key_column)
                .map_or("", String::as_str),
        )
    }

    pub fn is_identity(&self, column: &str) -> bool {
        self.identity_columns.contains(column)
    }

    /// Non-identity columns, in database order.
    pub fn writable_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|c| !self.is_identity(c))
    }
}

/// Generated columns for every table, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct IdentityColumns {
    by_table: HashMap<String, BTreeSet<String>>,
}

impl IdentityColumns {
    pub fn from_pairs<I, T, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: Into<String>,
        C: Into<String>,
    {
        let mut by_table: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (table, column) in pairs {
            by_table.entry(table.into()).or_default().insert(column.into());
        }
        Self { by_table }
    }

    /// Runs the dialect's metadata query. Any failure yields an empty map,
    /// which leaves every column writable.
    pub async fn load(provider: &ConnectionProvider) -> Self {
        match Self::try_load(provider).await {
            Ok(found) => {
                info!(tables = found.by_table.len(), "identity columns loaded");
                found
            }
            Err(e) => {
                warn!(error = %e, "identity column metadata unavailable, treating all columns as writable");
                Self::default()
            }
        }
    }

    async fn try_load(provider: &ConnectionProvider) -> ConsoleResult<Self> {
        let stmt = Statement {
            sql: provider.dialect().identity_columns_sql().to_string(),
            params: Vec::new(),
        };
        let mut conn = provider.open().await?;
        let rows = conn.fetch_all(&stmt).await?;
        conn.close().await;

        let pairs = rows
            .iter()
            .map(|row| {
                let table: String = row.try_get(0).map_err(ConsoleError::query)?;
                let column: String = row.try_get(1).map_err(ConsoleError::query)?;
                Ok((table, column))
            })
            .collect::<ConsoleResult<Vec<_>>>()?;
        Ok(Self::from_pairs(pairs))
    }

    pub fn for_table(&self, table: &str) -> BTreeSet<String> {
        self.by_table.get(table).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }
}

/// Reads table schemas on demand and caches them for the process lifetime.
pub struct SchemaInspector {
    provider: ConnectionProvider,
    identity: IdentityColumns,
    key_columns: HashMap<String, String>,
    cache: RwLock<HashMap<String, TableSchema>>,
}

impl SchemaInspector {
    pub fn new(
        provider: ConnectionProvider,
        identity: IdentityColumns,
        key_columns: HashMap<String, String>,
    ) -> Self {
        Self {
            provider,
            identity,
            key_columns,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Loads identity metadata, then builds the inspector.
    pub async fn init(provider: ConnectionProvider, key_columns: HashMap<String, String>) -> Self {
        let identity = IdentityColumns::load(&provider).await;
        Self::new(provider, identity, key_columns)
    }

    /// Column names in database order. Empty when the table cannot be read.
    pub async fn columns(&self, table: &str) -> Vec<String> {
        self.table_schema(table)
            .await
            .map(|schema| schema.columns)
            .unwrap_or_default()
    }

    pub fn identity_columns(&self, table: &str) -> BTreeSet<String> {
        self.identity.for_table(table)
    }

    /// Full schema, or `SchemaUnavailable` when no columns could be read.
    /// Only successful lookups are cached, so a failed one is retried.
    pub async fn table_schema(&self, table: &str) -> ConsoleResult<TableSchema> {
        if let Some(schema) = self.cache.read().await.get(table) {
            return Ok(schema.clone());
        }

        let described = match self.describe(table).await {
            Ok(described) => described,
            Err(e) => {
                warn!(table, error = %e, "could not read table columns");
                Vec::new()
            }
        };
        if described.is_empty() {
            return Err(ConsoleError::SchemaUnavailable {
                table: table.to_string(),
            });
        }
        debug!(table, columns = described.len(), "columns discovered");

        let (columns, types): (Vec<String>, Vec<String>) = described.into_iter().unzip();
        let schema = TableSchema::new(table, columns, self.identity_columns(table))
            .with_column_types(types);
        let schema = match self.key_columns.get(table) {
            Some(key) => schema.with_key_column(key),
            None => schema,
        };

        let mut cache = self.cache.write().await;
        Ok(cache.entry(table.to_string()).or_insert(schema).clone())
    }

    /// Column names and types from the catalog; reads no table rows, so it
    /// works on empty tables and whatever the column types are.
    async fn describe(&self, table: &str) -> ConsoleResult<Vec<(String, String)>> {
        let stmt = Statement {
            sql: self.provider.dialect().table_columns_sql().to_string(),
            params: vec![Some(table.to_string())],
        };
        let mut conn = self.provider.open().await?;
        let rows = conn.fetch_all(&stmt).await?;
        conn.close().await;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(ConsoleError::query)?;
                let ty: Option<String> = row.try_get(1).map_err(ConsoleError::query)?;
                Ok((name, ty.unwrap_or_default()))
            })
            .collect()
    }
}
