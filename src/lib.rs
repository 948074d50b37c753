//! Role-gated, schema-driven CRUD console over a relational database.
//!
//! Tables are discovered at runtime; every list, search, insert, update and
//! delete is checked against a static per-role permission table and issued as
//! a single parameterized, auto-committed statement.

pub mod libs;

pub use libs::*;
