use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use sqlx::any::AnyRow;
use sqlx::{Column, Row};
use tracing::debug;

/// One row as an ordered column → value mapping.
///
/// Values are stringified and trimmed; SQL NULL stays `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new(fields: Vec<(String, Option<String>)>) -> Self {
        Self { fields }
    }

    pub fn from_row(row: &AnyRow) -> Self {
        let fields = row
            .columns()
            .iter()
            .map(|col| (col.name().to_string(), cell_text(row, col.ordinal())))
            .collect();
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn is_null(&self, column: &str) -> bool {
        self.fields.iter().any(|(c, v)| c == column && v.is_none())
    }

    pub fn fields(&self) -> &[(String, Option<String>)] {
        &self.fields
    }

    /// Values as shown in a grid: NULL renders as an empty cell.
    pub fn display_values(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|(_, v)| v.clone().unwrap_or_default())
            .collect()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Result grid for a list or search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl RowSet {
    pub fn from_rows(columns: Vec<String>, rows: &[AnyRow]) -> Self {
        Self {
            columns,
            rows: rows.iter().map(Record::from_row).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row whose `column` equals `value`.
    pub fn find(&self, column: &str, value: &str) -> Option<&Record> {
        self.rows.iter().find(|r| r.get(column) == Some(value))
    }
}

/// Tries integer, float, bool, then text. Unsupported types read as NULL.
fn cell_text(row: &AnyRow, idx: usize) -> Option<String> {
    let text = match row.try_get::<Option<i64>, _>(idx) {
        Ok(v) => v.map(|v| v.to_string()),
        Err(_) => match row.try_get::<Option<f64>, _>(idx) {
            Ok(v) => v.map(|v| v.to_string()),
            Err(_) => match row.try_get::<Option<bool>, _>(idx) {
                Ok(v) => v.map(|v| v.to_string()),
                Err(_) => match row.try_get::<Option<String>, _>(idx) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!(column = idx, error = %e, "undecodable value");
                        None
                    }
                },
            },
        },
    };
    text.map(|t| t.trim().to_string())
}
