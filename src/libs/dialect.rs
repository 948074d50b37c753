use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::libs::error::ConsoleError;

/// SQL differences between the supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    /// Guess the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Dialect::Sqlite),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            _ => None,
        }
    }

    /// Bind marker for the `n`th parameter, 1-based.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }

    pub fn text_type(&self) -> &'static str {
        match self {
            Dialect::MySql => "char",
            Dialect::Sqlite | Dialect::Postgres => "text",
        }
    }

    /// `(column_name, column_type)` for one table, in column order. Takes the
    /// table name as its only parameter and returns no rows for a missing table.
    pub fn table_columns_sql(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "SELECT name, type FROM pragma_table_info(?) ORDER BY cid",
            Dialect::Postgres => {
                "SELECT column_name::text, udt_name::text FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name::text = $1 \
                 ORDER BY ordinal_position"
            }
            Dialect::MySql => {
                "SELECT CAST(column_name AS char), CAST(data_type AS char) \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                 ORDER BY ordinal_position"
            }
        }
    }

    /// Whether bind slots must be cast to the target column type. Postgres
    /// does not coerce text parameters to other column types.
    pub fn casts_params(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// One query listing `(table_name, column_name)` for every generated column.
    pub fn identity_columns_sql(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                "SELECT m.name, p.name FROM sqlite_master m \
                 JOIN pragma_table_info(m.name) p \
                 WHERE m.type = 'table' AND p.pk = 1 AND upper(p.type) = 'INTEGER' \
                 AND (SELECT count(*) FROM pragma_table_info(m.name) k WHERE k.pk > 0) = 1"
            }
            Dialect::Postgres => {
                "SELECT table_name::text, column_name::text FROM information_schema.columns \
                 WHERE table_schema = current_schema() \
                 AND (is_identity = 'YES' OR column_default LIKE 'nextval(%')"
            }
            Dialect::MySql => {
                "SELECT CAST(table_name AS char), CAST(column_name AS char) \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND extra LIKE '%auto_increment%'"
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        })
    }
}

impl FromStr for Dialect {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            other => Err(ConsoleError::InvalidConfig(format!("unknown dialect {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dialect_from_url() {
        assert_eq!(Dialect::from_url("sqlite://lib.db?mode=rwc"), Some(Dialect::Sqlite));
        assert_eq!(
            Dialect::from_url("postgres://postgres@localhost:5432/postgres"),
            Some(Dialect::Postgres)
        );
        assert_eq!(Dialect::from_url("mysql://root@localhost/lib"), Some(Dialect::MySql));
        assert_eq!(Dialect::from_url("mssql://sa@localhost"), None);
    }

    #[test]
    fn placeholders_follow_backend() {
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn only_postgres_casts_params() {
        assert!(Dialect::Postgres.casts_params());
        assert!(!Dialect::Sqlite.casts_params());
        assert!(!Dialect::MySql.casts_params());
        assert!(Dialect::Postgres.table_columns_sql().contains("$1"));
        assert!(Dialect::Sqlite.table_columns_sql().contains("pragma_table_info(?)"));
    }
}
