//! Local persistence for Till
//!
//! A libSQL-backed key-value store with three namespaces (products, sales,
//! pending writes) plus a typed cache on top of it.

mod cache;
mod connection;
mod kv;
mod migrations;

pub use cache::LocalCache;
pub use connection::Database;
pub use kv::{LibSqlStore, LocalStore, Namespace};
pub use migrations::{Migration, LOCAL_STORE_MIGRATIONS};
