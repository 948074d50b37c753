use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::libs::auth::Session;
use crate::libs::config::ConsoleConfig;
use crate::libs::connection::ConnectionProvider;
use crate::libs::error::{ConsoleError, ConsoleResult};
use crate::libs::permissions::{Action, MenuEntry, PermissionModel};
use crate::libs::query_builder::{QueryBuilder, Statement};
use crate::libs::record::{Record, RowSet};
use crate::libs::schema::{SchemaInspector, TableSchema};

/// Process-wide state: connection settings, schema metadata and the
/// permission table. Built once at startup, read-only afterwards.
#[derive(Clone)]
pub struct Console {
    provider: ConnectionProvider,
    inspector: Arc<SchemaInspector>,
    permissions: Arc<PermissionModel>,
}

impl Console {
    pub async fn bootstrap(config: &ConsoleConfig) -> ConsoleResult<Self> {
        let provider = ConnectionProvider::new(config.database_url.clone(), config.dialect()?);
        let permissions = config.permissions()?;
        let inspector = SchemaInspector::init(provider.clone(), config.key_columns.clone()).await;
        info!(dialect = %provider.dialect(), "console ready");
        Ok(Self::new(provider, inspector, permissions))
    }

    pub fn new(
        provider: ConnectionProvider,
        inspector: SchemaInspector,
        permissions: PermissionModel,
    ) -> Self {
        Self {
            provider,
            inspector: Arc::new(inspector),
            permissions: Arc::new(permissions),
        }
    }

    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    pub fn engine(&self, session: Session) -> CrudEngine {
        CrudEngine {
            provider: self.provider.clone(),
            inspector: Arc::clone(&self.inspector),
            permissions: Arc::clone(&self.permissions),
            session,
        }
    }
}

/// Outcome of a search that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Matches(RowSet),
    NoResults,
}

/// Which actions the session may take on one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub view: bool,
    pub add: bool,
    pub edit: bool,
    pub delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub column: String,
    pub value: Option<String>,
    /// False for identity columns, which are shown but never sent back
    pub editable: bool,
}

/// Edit dialog contents for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    /// Key value before any edit; the update targets this row
    pub key_value: String,
    pub fields: Vec<FormField>,
}

impl EditForm {
    /// Changes an editable field. Returns false for unknown or read-only columns.
    pub fn set(&mut self, column: &str, value: Option<String>) -> bool {
        match self.fields.iter_mut().find(|f| f.column == column && f.editable) {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }

    /// Every editable field, changed or not.
    pub fn values(&self) -> Vec<(String, Option<String>)> {
        self.fields
            .iter()
            .filter(|f| f.editable)
            .map(|f| (f.column.clone(), f.value.clone()))
            .collect()
    }
}

/// Permission-checked list/search/create/update/delete over any visible table.
pub struct CrudEngine {
    provider: ConnectionProvider,
    inspector: Arc<SchemaInspector>,
    permissions: Arc<PermissionModel>,
    session: Session,
}

impl CrudEngine {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn allowed(&self, action: Action, table: &str) -> bool {
        self.permissions.allowed(self.session.role, action, table)
    }

    fn require(&self, action: Action, table: &str) -> ConsoleResult<()> {
        if self.allowed(action, table) {
            return Ok(());
        }
        warn!(role = %self.session.role, %action, table, "access denied");
        Err(ConsoleError::PermissionDenied {
            action,
            table: table.to_string(),
        })
    }

    pub fn capabilities(&self, table: &str) -> Capabilities {
        Capabilities {
            view: self.allowed(Action::View, table),
            add: self.allowed(Action::Add, table),
            edit: self.allowed(Action::Edit, table),
            delete: self.allowed(Action::Delete, table),
        }
    }

    /// Tables the session can open, entity tables before relationships.
    pub fn visible_tables(&self) -> Vec<MenuEntry> {
        self.permissions.menu(self.session.role)
    }

    async fn schema(&self, table: &str) -> ConsoleResult<TableSchema> {
        self.inspector.table_schema(table).await
    }

    async fn fetch(&self, schema: &TableSchema, stmt: &Statement) -> ConsoleResult<RowSet> {
        let mut conn = self.provider.open().await?;
        let rows = conn.fetch_all(stmt).await?;
        conn.close().await;
        Ok(RowSet::from_rows(schema.columns.clone(), &rows))
    }

    async fn execute(&self, stmt: &Statement) -> ConsoleResult<u64> {
        let mut conn = self.provider.open().await?;
        let affected = conn.execute(stmt).await?;
        conn.close().await;
        Ok(affected)
    }

    /// All rows of the table.
    pub async fn list(&self, table: &str) -> ConsoleResult<RowSet> {
        self.require(Action::View, table)?;
        let schema = self.schema(table).await?;
        let stmt = QueryBuilder::new(&schema, self.provider.dialect()).select_all();
        self.fetch(&schema, &stmt).await
    }

    /// Rows where any searchable column contains `term`.
    pub async fn search(&self, table: &str, term: &str) -> ConsoleResult<SearchOutcome> {
        self.require(Action::View, table)?;
        if term.trim().is_empty() {
            return Err(ConsoleError::EmptyInput("Enter search term"));
        }
        let schema = self.schema(table).await?;
        let stmt = QueryBuilder::new(&schema, self.provider.dialect()).search(term)?;
        let rows = self.fetch(&schema, &stmt).await?;
        debug!(table, matches = rows.len(), "search");
        Ok(if rows.is_empty() {
            SearchOutcome::NoResults
        } else {
            SearchOutcome::Matches(rows)
        })
    }

    /// Non-identity columns to collect for a new record.
    pub async fn create_form(&self, table: &str) -> ConsoleResult<Vec<String>> {
        self.require(Action::Add, table)?;
        let schema = self.schema(table).await?;
        Ok(schema.writable_columns().map(str::to_string).collect())
    }

    /// Inserts the non-blank, non-identity fields and returns the refreshed list.
    pub async fn create(&self, table: &str, fields: &[(String, String)]) -> ConsoleResult<RowSet> {
        self.require(Action::Add, table)?;
        if fields.iter().all(|(_, v)| v.trim().is_empty()) {
            return Err(ConsoleError::EmptyInput("Fill at least one field"));
        }
        let schema = self.schema(table).await?;
        let writable: Vec<(String, String)> = fields
            .iter()
            .filter(|(column, _)| {
                let identity = schema.is_identity(column);
                if identity {
                    debug!(table, column, "dropping identity column from insert");
                }
                !identity
            })
            .cloned()
            .collect();
        let stmt = QueryBuilder::new(&schema, self.provider.dialect()).insert(&writable)?;
        self.execute(&stmt).await?;
        info!(table, role = %self.session.role, "record added");
        self.list(table).await
    }

    /// Edit dialog for a listed record, identity columns read-only.
    pub async fn edit_form(&self, table: &str, record: &Record) -> ConsoleResult<EditForm> {
        self.require(Action::Edit, table)?;
        let schema = self.schema(table).await?;
        let key_value = key_value(&schema, record)?;
        let fields = schema
            .columns
            .iter()
            .map(|column| FormField {
                column: column.clone(),
                value: record.get(column).map(str::to_string),
                editable: !schema.is_identity(column),
            })
            .collect();
        Ok(EditForm { key_value, fields })
    }

    /// Key value of a listed record, for update and delete.
    pub async fn key_of(&self, table: &str, record: &Record) -> ConsoleResult<String> {
        self.require(Action::View, table)?;
        let schema = self.schema(table).await?;
        key_value(&schema, record)
    }

    /// The listed record whose key equals `key_value`.
    pub async fn record(&self, table: &str, key_value: &str) -> ConsoleResult<Record> {
        let rows = self.list(table).await?;
        let schema = self.schema(table).await?;
        rows.find(schema.key().as_str(), key_value)
            .cloned()
            .ok_or(ConsoleError::NoSelection)
    }

    /// Writes every supplied non-identity field to the row keyed by `key_value`.
    pub async fn update(
        &self,
        table: &str,
        key_value: &str,
        fields: &[(String, Option<String>)],
    ) -> ConsoleResult<RowSet> {
        self.require(Action::Edit, table)?;
        let schema = self.schema(table).await?;
        let writable: Vec<(String, Option<String>)> = fields
            .iter()
            .filter(|(column, _)| !schema.is_identity(column))
            .cloned()
            .collect();
        let stmt = QueryBuilder::new(&schema, self.provider.dialect()).update(
            &writable,
            schema.key(),
            key_value,
        )?;
        let affected = self.execute(&stmt).await?;
        if affected == 0 {
            warn!(table, key = key_value, "update matched no rows");
        }
        info!(table, key = key_value, role = %self.session.role, "record updated");
        self.list(table).await
    }

    /// Deletes the row keyed by `key_value`. `confirmed` is the user's answer
    /// to the confirmation prompt, obtained by the caller.
    pub async fn delete(&self, table: &str, key_value: &str, confirmed: bool) -> ConsoleResult<RowSet> {
        self.require(Action::Delete, table)?;
        if !confirmed {
            return Err(ConsoleError::Unconfirmed {
                table: table.to_string(),
                key: key_value.to_string(),
            });
        }
        let schema = self.schema(table).await?;
        let stmt = QueryBuilder::new(&schema, self.provider.dialect()).delete(schema.key(), key_value);
        self.execute(&stmt).await?;
        info!(table, key = key_value, role = %self.session.role, "record deleted");
        self.list(table).await
    }
}

fn key_value(schema: &TableSchema, record: &Record) -> ConsoleResult<String> {
    record
        .get(schema.key().as_str())
        .map(str::to_string)
        .ok_or(ConsoleError::NoSelection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> EditForm {
        EditForm {
            key_value: "4".into(),
            fields: vec![
                FormField {
                    column: "copy_id".into(),
                    value: Some("4".into()),
                    editable: false,
                },
                FormField {
                    column: "status".into(),
                    value: Some("on shelf".into()),
                    editable: true,
                },
                FormField {
                    column: "shelf".into(),
                    value: None,
                    editable: true,
                },
            ],
        }
    }

    #[test]
    fn edit_form_values_skip_read_only_fields() {
        let mut f = form();
        assert!(f.set("status", Some("lost".into())));
        assert!(!f.set("copy_id", Some("99".into())));
        assert!(!f.set("missing", None));
        assert_eq!(
            f.values(),
            vec![
                ("status".to_string(), Some("lost".to_string())),
                ("shelf".to_string(), None),
            ]
        );
        assert_eq!(f.key_value, "4");
    }
}
