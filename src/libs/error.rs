//! Console error types

use thiserror::Error;

use crate::libs::permissions::Action;

/// Errors surfaced to the presentation shell.
///
/// The `Display` text of every variant is the message shown to the user.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// The database could not be reached
    #[error("Failed to connect: {0}")]
    ConnectionFailure(String),

    /// The session's role may not perform this action on this table
    #[error("Access denied: no permission to {action} {table}")]
    PermissionDenied { action: Action, table: String },

    /// Column metadata for the table could not be read
    #[error("Schema for {table} is unavailable")]
    SchemaUnavailable { table: String },

    /// No column of the table qualifies for free-text search
    #[error("No searchable columns in {table}")]
    NoSearchableColumns { table: String },

    /// Required input was missing or blank
    #[error("{0}")]
    EmptyInput(&'static str),

    /// A field name does not belong to the table
    #[error("Unknown column {column} in {table}")]
    UnknownColumn { table: String, column: String },

    /// No listed record matches the selection
    #[error("Select a record")]
    NoSelection,

    /// The view cannot perform the operation in its current state
    #[error("{0}")]
    InvalidState(&'static str),

    /// Delete was requested without confirmation
    #[error("Delete of {table} record {key} was not confirmed")]
    Unconfirmed { table: String, key: String },

    /// The database rejected the statement
    #[error("Query failed: {0}")]
    QueryFailure(String),

    /// Credentials did not match a staff member
    #[error("Invalid credentials")]
    AuthenticationFailed,

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConsoleError {
    /// True for failures detected before any database call.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ConsoleError::PermissionDenied { .. }
                | ConsoleError::NoSearchableColumns { .. }
                | ConsoleError::EmptyInput(_)
                | ConsoleError::NoSelection
                | ConsoleError::InvalidState(_)
                | ConsoleError::UnknownColumn { .. }
                | ConsoleError::Unconfirmed { .. }
        )
    }

    pub(crate) fn query(err: sqlx::Error) -> Self {
        ConsoleError::QueryFailure(err.to_string())
    }

    pub(crate) fn connect(err: sqlx::Error) -> Self {
        ConsoleError::ConnectionFailure(err.to_string())
    }
}

/// Result type for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;
