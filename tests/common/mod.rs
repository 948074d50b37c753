#![allow(dead_code)]

use std::collections::HashMap;

use bookhaven::{
    Console, ConnectionProvider, CrudEngine, Dialect, PermissionModel, Role, SchemaInspector,
    Session,
};
use sqlx::{AnyConnection, Connection, Executor};
use tempfile::TempDir;

const DDL: [&str; 8] = [
    "CREATE TABLE book (book_id INTEGER PRIMARY KEY, isbn TEXT, title TEXT, price DECIMAL(6,2), available BOOLEAN)",
    "CREATE TABLE reservation (reservation_id INTEGER PRIMARY KEY, member_id INTEGER, reserved_on DATE)",
    "CREATE TABLE book_copy (copy_id INTEGER PRIMARY KEY AUTOINCREMENT, book_id INTEGER, status TEXT, shelf TEXT)",
    "CREATE TABLE member (member_id INTEGER PRIMARY KEY, fname TEXT NOT NULL, lname TEXT, email TEXT, phone TEXT)",
    "CREATE TABLE description (body TEXT)",
    "CREATE TABLE book_author (book_id INTEGER, author_id INTEGER, PRIMARY KEY (book_id, author_id))",
    "CREATE TABLE staff (staff_id INTEGER PRIMARY KEY, fname TEXT, lname TEXT, email TEXT, password TEXT, role TEXT)",
    "INSERT INTO staff (fname, lname, email, password, role) VALUES \
     ('Ann', 'Lee', 'ann@library.test', 'secret', 'Librarian'), \
     ('Jo', 'Park', 'jo@library.test', 'pw', 'Janitor')",
];

/// A fresh on-disk SQLite library database. Keep the `TempDir` alive.
pub async fn setup_test_db() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("library.db").display());

    sqlx::any::install_default_drivers();
    let mut conn = AnyConnection::connect(&url).await.expect("connect");
    for sql in DDL {
        conn.execute(sql).await.expect("schema setup");
    }
    conn.close().await.expect("close");
    (dir, url)
}

pub async fn setup_console(url: &str, key_columns: HashMap<String, String>) -> Console {
    let provider = ConnectionProvider::new(url, Dialect::Sqlite);
    let inspector = SchemaInspector::init(provider.clone(), key_columns).await;
    Console::new(provider, inspector, PermissionModel::library())
}

pub async fn engine_for(url: &str, role: Role) -> CrudEngine {
    setup_console(url, HashMap::new())
        .await
        .engine(Session::new(role, "Test User"))
}

pub fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(c, v)| (c.to_string(), v.to_string()))
        .collect()
}
