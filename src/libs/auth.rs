use async_trait::async_trait;
use tracing::{info, warn};

use crate::libs::connection::ConnectionProvider;
use crate::libs::error::{ConsoleError, ConsoleResult};
use crate::libs::permissions::Role;
use crate::libs::query_builder::Statement;
use crate::libs::record::Record;

/// Authenticated identity, held for the lifetime of the main interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub role: Role,
    pub display_name: String,
    pub staff_id: Option<String>,
}

impl Session {
    pub fn new(role: Role, display_name: impl Into<String>) -> Self {
        Self {
            role,
            display_name: display_name.into(),
            staff_id: None,
        }
    }

    /// `Ann Lee (Librarian)`
    pub fn banner(&self) -> String {
        format!("{} ({})", self.display_name, self.role)
    }
}

/// Turns credentials into a [`Session`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> ConsoleResult<Session>;
}

/// Checks credentials against the `staff` table.
pub struct StaffAuthenticator {
    provider: ConnectionProvider,
}

impl StaffAuthenticator {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    fn statement(&self, email: &str, password: &str) -> Statement {
        let dialect = self.provider.dialect();
        Statement {
            sql: format!(
                "SELECT staff_id, fname, lname, role FROM staff WHERE email = {} AND password = {}",
                dialect.placeholder(1),
                dialect.placeholder(2)
            ),
            params: vec![Some(email.to_string()), Some(password.to_string())],
        }
    }
}

#[async_trait]
impl Authenticator for StaffAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> ConsoleResult<Session> {
        let email = email.trim();
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ConsoleError::EmptyInput("Enter email and password"));
        }

        let mut conn = self.provider.open().await?;
        let rows = conn.fetch_all(&self.statement(email, password)).await?;
        conn.close().await;

        let Some(row) = rows.first().map(Record::from_row) else {
            warn!(email, "login rejected");
            return Err(ConsoleError::AuthenticationFailed);
        };
        let role: Role = row.get("role").unwrap_or_default().parse().map_err(|e| {
            warn!(email, role = ?row.get("role"), "staff member has an unknown role");
            e
        })?;
        let display_name = format!(
            "{} {}",
            row.get("fname").unwrap_or_default(),
            row.get("lname").unwrap_or_default()
        )
        .trim()
        .to_string();

        info!(email, %role, "login");
        Ok(Session {
            role,
            display_name,
            staff_id: row.get("staff_id").map(str::to_string),
        })
    }
}
