pub mod auth;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod permissions;
pub mod query_builder;
pub mod record;
pub mod schema;
pub mod view;

// Re-export them for easier access from main.rs
pub use auth::*;
pub use config::*;
pub use connection::*;
pub use dialect::*;
pub use engine::*;
pub use error::*;
pub use permissions::*;
pub use query_builder::*;
pub use record::*;
pub use schema::*;
pub use view::*;
