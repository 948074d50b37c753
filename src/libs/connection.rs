use sqlx::any::AnyRow;
use sqlx::{Any, AnyConnection, Connection};
use tracing::{debug, warn};

use crate::libs::dialect::Dialect;
use crate::libs::error::{ConsoleError, ConsoleResult};
use crate::libs::query_builder::Statement;

/// Opens one connection per operation. No pooling.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    database_url: String,
    dialect: Dialect,
}

impl ConnectionProvider {
    pub fn new(database_url: impl Into<String>, dialect: Dialect) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            database_url: database_url.into(),
            dialect,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn open(&self) -> ConsoleResult<DbConnection> {
        let conn = AnyConnection::connect(&self.database_url)
            .await
            .map_err(|e| {
                warn!(error = %e, "connection failed");
                ConsoleError::connect(e)
            })?;
        Ok(DbConnection { conn: Some(conn) })
    }
}

/// A connection scoped to a single operation.
///
/// Call [`close`](Self::close) on the success path; dropping it on an error
/// path releases the underlying connection as well.
pub struct DbConnection {
    conn: Option<AnyConnection>,
}

impl DbConnection {
    fn inner(&mut self) -> ConsoleResult<&mut AnyConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| ConsoleError::ConnectionFailure("connection already closed".into()))
    }

    pub async fn fetch_all(&mut self, stmt: &Statement) -> ConsoleResult<Vec<AnyRow>> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "fetch");
        let mut query = sqlx::query::<Any>(&stmt.sql);
        for param in &stmt.params {
            query = query.bind(param.clone());
        }
        query.fetch_all(self.inner()?).await.map_err(ConsoleError::query)
    }

    /// Runs one auto-committed statement, returning the affected row count.
    pub async fn execute(&mut self, stmt: &Statement) -> ConsoleResult<u64> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "execute");
        let mut query = sqlx::query::<Any>(&stmt.sql);
        for param in &stmt.params {
            query = query.bind(param.clone());
        }
        let done = query.execute(self.inner()?).await.map_err(ConsoleError::query)?;
        Ok(done.rows_affected())
    }

    pub async fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "error while closing connection");
            }
        }
    }
}
