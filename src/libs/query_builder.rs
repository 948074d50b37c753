//! Parameterized statement construction.
//!
//! Building happens in two steps. A [`Template`] is assembled from
//! [`Ident`]s, which can only be obtained from an introspected
//! [`TableSchema`], and bind slots. Values are attached afterwards by
//! [`Template::bind`], so user input never reaches the SQL text.
//!
//! Every column is read back as text, so any column type the backend has
//! comes out as a string or NULL.

use tracing::debug;

use crate::libs::dialect::Dialect;
use crate::libs::error::{ConsoleError, ConsoleResult};
use crate::libs::schema::TableSchema;

/// Lower-cased name fragments that make a column searchable.
pub const SEARCH_TOKENS: [&str; 7] = ["id", "name", "title", "email", "isbn", "fname", "lname"];

/// A table or column name taken from schema introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'a>(&'a str);

impl<'a> Ident<'a> {
    pub(crate) fn from_schema(name: &'a str) -> Self {
        Ident(name)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

/// SQL text with numbered bind slots and no values.
#[derive(Debug)]
struct Template {
    dialect: Dialect,
    sql: String,
    slots: usize,
}

impl Template {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            slots: 0,
        }
    }

    fn keyword(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    fn ident(&mut self, ident: Ident<'_>) -> &mut Self {
        self.sql.push_str(ident.as_str());
        self
    }

    fn slot(&mut self) -> &mut Self {
        self.slots += 1;
        let marker = self.dialect.placeholder(self.slots);
        self.sql.push_str(&marker);
        self
    }

    /// A slot for a value written to or compared with a column of
    /// `column_type`. Cast on dialects that do not coerce text parameters.
    fn typed_slot(&mut self, column_type: Option<Ident<'_>>) -> &mut Self {
        match column_type {
            Some(ty) if self.dialect.casts_params() => self
                .keyword("CAST(")
                .slot()
                .keyword(" AS ")
                .ident(ty)
                .keyword(")"),
            _ => self.slot(),
        }
    }

    fn bind(self, params: Vec<Option<String>>) -> Statement {
        debug_assert_eq!(self.slots, params.len(), "bind count mismatch for {}", self.sql);
        Statement {
            sql: self.sql,
            params,
        }
    }
}

/// Builds statements against one introspected table.
pub struct QueryBuilder<'a> {
    schema: &'a TableSchema,
    dialect: Dialect,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a TableSchema, dialect: Dialect) -> Self {
        Self { schema, dialect }
    }

    fn column(&self, name: &str) -> ConsoleResult<Ident<'a>> {
        self.schema
            .ident(name)
            .ok_or_else(|| ConsoleError::UnknownColumn {
                table: self.schema.name.clone(),
                column: name.to_string(),
            })
    }

    /// `SELECT CAST(a AS text) AS a, ... FROM {table}`
    fn select_text(&self, t: &mut Template) {
        t.keyword("SELECT ");
        for (i, col) in self.schema.idents().enumerate() {
            if i > 0 {
                t.keyword(", ");
            }
            t.keyword("CAST(")
                .ident(col)
                .keyword(" AS ")
                .keyword(self.dialect.text_type())
                .keyword(") AS ")
                .ident(col);
        }
        t.keyword(" FROM ").ident(self.schema.table_ident());
    }

    /// Every row, every column as text.
    pub fn select_all(&self) -> Statement {
        let mut t = Template::new(self.dialect);
        self.select_text(&mut t);
        t.bind(Vec::new())
    }

    /// Columns whose name contains one of [`SEARCH_TOKENS`].
    pub fn searchable_columns(&self) -> Vec<Ident<'a>> {
        self.schema
            .idents()
            .filter(|c| {
                let lower = c.as_str().to_lowercase();
                SEARCH_TOKENS.iter().any(|token| lower.contains(token))
            })
            .collect()
    }

    /// Disjunction of `CAST(col AS text) LIKE %term%` over searchable columns.
    pub fn search(&self, term: &str) -> ConsoleResult<Statement> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ConsoleError::EmptyInput("Enter search term"));
        }
        let candidates = self.searchable_columns();
        if candidates.is_empty() {
            return Err(ConsoleError::NoSearchableColumns {
                table: self.schema.name.clone(),
            });
        }

        let mut t = Template::new(self.dialect);
        self.select_text(&mut t);
        t.keyword(" WHERE ");
        for (i, col) in candidates.iter().enumerate() {
            if i > 0 {
                t.keyword(" OR ");
            }
            t.keyword("CAST(")
                .ident(*col)
                .keyword(" AS ")
                .keyword(self.dialect.text_type())
                .keyword(") LIKE ")
                .slot();
        }

        let pattern = format!("%{term}%");
        Ok(t.bind(vec![Some(pattern); candidates.len()]))
    }

    /// Inserts only the fields with a non-blank value, trimmed.
    pub fn insert(&self, values: &[(String, String)]) -> ConsoleResult<Statement> {
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for (name, value) in values {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            columns.push(self.column(name)?);
            params.push(Some(value.to_string()));
        }
        if columns.is_empty() {
            return Err(ConsoleError::EmptyInput("Fill at least one field"));
        }

        let mut t = Template::new(self.dialect);
        t.keyword("INSERT INTO ")
            .ident(self.schema.table_ident())
            .keyword(" (");
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                t.keyword(",");
            }
            t.ident(*col);
        }
        t.keyword(") VALUES (");
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                t.keyword(",");
            }
            t.typed_slot(self.schema.column_type(col.as_str()));
        }
        t.keyword(")");
        Ok(t.bind(params))
    }

    /// Sets every supplied column; `None` writes NULL.
    pub fn update(
        &self,
        values: &[(String, Option<String>)],
        key: Ident<'_>,
        key_value: &str,
    ) -> ConsoleResult<Statement> {
        if values.is_empty() {
            return Err(ConsoleError::EmptyInput("Nothing to update"));
        }

        let mut t = Template::new(self.dialect);
        t.keyword("UPDATE ")
            .ident(self.schema.table_ident())
            .keyword(" SET ");
        let mut params = Vec::with_capacity(values.len() + 1);
        for (i, (name, value)) in values.iter().enumerate() {
            if i > 0 {
                t.keyword(",");
            }
            let col = self.column(name)?;
            t.ident(col)
                .keyword("=")
                .typed_slot(self.schema.column_type(col.as_str()));
            params.push(value.clone());
        }
        t.keyword(" WHERE ")
            .ident(key)
            .keyword("=")
            .typed_slot(self.schema.column_type(key.as_str()));
        params.push(Some(key_value.to_string()));
        Ok(t.bind(params))
    }

    pub fn delete(&self, key: Ident<'_>, key_value: &str) -> Statement {
        let mut t = Template::new(self.dialect);
        t.keyword("DELETE FROM ")
            .ident(self.schema.table_ident())
            .keyword(" WHERE ")
            .ident(key)
            .keyword("=")
            .typed_slot(self.schema.column_type(key.as_str()));
        let stmt = t.bind(vec![Some(key_value.to_string())]);
        debug!(sql = %stmt.sql, "built delete");
        stmt
    }
}
