use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::libs::error::{ConsoleError, ConsoleResult};

/// Permission profile assigned to an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Assistant,
    Librarian,
    Manager,
    Technician,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Assistant,
        Role::Librarian,
        Role::Manager,
        Role::Technician,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Assistant => "Assistant",
            Role::Librarian => "Librarian",
            Role::Manager => "Manager",
            Role::Technician => "Technician",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or(ConsoleError::AuthenticationFailed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    View,
    Add,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Add, Action::Edit, Action::Delete];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::View => "view",
            Action::Add => "add",
            Action::Edit => "edit",
            Action::Delete => "delete",
        })
    }
}

/// Either every table or an explicit set of tables.
///
/// In a permission file this is the string `"all"` or a list of table names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "PermissionSpec")]
pub enum Permission {
    AllTables,
    TableSet(BTreeSet<String>),
}

impl Permission {
    pub fn none() -> Self {
        Permission::TableSet(BTreeSet::new())
    }

    pub fn tables(tables: &[&str]) -> Self {
        Permission::TableSet(tables.iter().map(|t| t.to_string()).collect())
    }

    pub fn contains(&self, table: &str) -> bool {
        match self {
            Permission::AllTables => true,
            Permission::TableSet(set) => set.contains(table),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PermissionSpec {
    Keyword(String),
    Tables(Vec<String>),
}

impl TryFrom<PermissionSpec> for Permission {
    type Error = String;

    fn try_from(spec: PermissionSpec) -> Result<Self, Self::Error> {
        match spec {
            PermissionSpec::Keyword(k) if k.eq_ignore_ascii_case("all") => {
                Ok(Permission::AllTables)
            }
            PermissionSpec::Keyword(k) => Err(format!("expected \"all\" or a table list, got {k:?}")),
            PermissionSpec::Tables(t) => Ok(Permission::TableSet(t.into_iter().collect())),
        }
    }
}

/// What one role may see and change.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionSet {
    /// Visible tables, in menu order
    pub tables: Vec<String>,
    #[serde(default = "Permission::none")]
    pub add: Permission,
    #[serde(default = "Permission::none")]
    pub edit: Permission,
    #[serde(default = "Permission::none")]
    pub delete: Permission,
}

impl PermissionSet {
    pub fn can_view(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    pub fn allows(&self, action: Action, table: &str) -> bool {
        if !self.can_view(table) {
            return false;
        }
        match action {
            Action::View => true,
            Action::Add => self.add.contains(table),
            Action::Edit => self.edit.contains(table),
            Action::Delete => self.delete.contains(table),
        }
    }
}

/// Menu section a table is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableGroup {
    Tables,
    Relationships,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub table: String,
    pub title: String,
    pub group: TableGroup,
}

/// Static role → permission mapping, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionModel {
    roles: HashMap<Role, PermissionSet>,
    #[serde(default)]
    relationships: BTreeSet<String>,
}

impl PermissionModel {
    pub fn new(roles: HashMap<Role, PermissionSet>) -> Self {
        Self {
            roles,
            relationships: BTreeSet::new(),
        }
    }

    pub fn with_relationships(mut self, tables: &[&str]) -> Self {
        self.relationships = tables.iter().map(|t| t.to_string()).collect();
        self
    }

    /// The library staff table this console ships with.
    pub fn library() -> Self {
        let all_add = [
            "author",
            "book",
            "book_copy",
            "category",
            "description",
            "book_author",
            "book_category",
        ];
        let mut roles = HashMap::new();
        roles.insert(
            Role::Assistant,
            PermissionSet {
                tables: to_vec(&["member", "reservation", "reservation_details"]),
                add: Permission::tables(&["member", "reservation", "reservation_details"]),
                edit: Permission::tables(&["reservation", "reservation_details"]),
                delete: Permission::none(),
            },
        );
        roles.insert(
            Role::Librarian,
            PermissionSet {
                tables: to_vec(&[
                    "author",
                    "book",
                    "book_copy",
                    "category",
                    "description",
                    "book_author",
                    "book_category",
                    "member",
                ]),
                add: Permission::tables(&all_add),
                edit: Permission::tables(&all_add),
                delete: Permission::tables(&["book_copy", "book_author", "book_category"]),
            },
        );
        roles.insert(
            Role::Manager,
            PermissionSet {
                tables: to_vec(&[
                    "author",
                    "book",
                    "book_copy",
                    "category",
                    "description",
                    "staff",
                    "member",
                    "reservation",
                    "reservation_details",
                    "book_author",
                    "book_category",
                ]),
                add: Permission::AllTables,
                edit: Permission::AllTables,
                delete: Permission::AllTables,
            },
        );
        roles.insert(
            Role::Technician,
            PermissionSet {
                tables: to_vec(&["book_copy"]),
                add: Permission::none(),
                edit: Permission::tables(&["book_copy"]),
                delete: Permission::none(),
            },
        );
        Self::new(roles).with_relationships(&["book_author", "book_category", "reservation_details"])
    }

    pub fn from_json(json: &str) -> ConsoleResult<Self> {
        serde_json::from_str(json).map_err(|e| ConsoleError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: &Path) -> ConsoleResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConsoleError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn role(&self, role: Role) -> Option<&PermissionSet> {
        self.roles.get(&role)
    }

    /// Fails closed: a role without an entry is allowed nothing.
    pub fn allowed(&self, role: Role, action: Action, table: &str) -> bool {
        let granted = self
            .roles
            .get(&role)
            .is_some_and(|set| set.allows(action, table));
        debug!(%role, %action, table, granted, "permission check");
        granted
    }

    /// Like [`allowed`](Self::allowed), for a role name coming from outside.
    pub fn allowed_by_name(&self, role: &str, action: Action, table: &str) -> bool {
        role.parse::<Role>()
            .is_ok_and(|role| self.allowed(role, action, table))
    }

    /// Visible tables for the role: entity tables first, then relationships.
    pub fn menu(&self, role: Role) -> Vec<MenuEntry> {
        let Some(set) = self.roles.get(&role) else {
            return Vec::new();
        };
        let mut entries: Vec<MenuEntry> = set
            .tables
            .iter()
            .map(|t| MenuEntry {
                table: t.clone(),
                title: table_title(t),
                group: if self.relationships.contains(t) {
                    TableGroup::Relationships
                } else {
                    TableGroup::Tables
                },
            })
            .collect();
        entries.sort_by_key(|e| e.group == TableGroup::Relationships);
        entries
    }
}

/// `book_copy` → `Book Copy`
pub fn table_title(table: &str) -> String {
    table
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn to_vec(tables: &[&str]) -> Vec<String> {
    tables.iter().map(|t| t.to_string()).collect()
}
