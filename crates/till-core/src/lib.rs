//! till-core - Core library for Till
//!
//! Offline-first sync layer shared by the Till interfaces: a durable local
//! store, the HTTP gateway to the backend, the sync-aware repository that
//! chooses between them, and the replayer that drains queued writes once
//! the backend is reachable again.

pub mod cart;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod gateway;
pub mod models;
pub mod replay;
pub mod repository;
pub mod store;
pub mod util;

pub use cart::{Cart, CartLine};
pub use config::ClientConfig;
pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivitySignal};
pub use error::{Error, Result};
pub use gateway::{HttpGateway, RemoteGateway};
pub use models::{
    HttpMethod, InventoryChange, Product, QueuedWrite, Sale, SaleId, SaleItem, SalePayload,
};
pub use replay::{QueueReplayer, ReplayOutcome, ReplayReport};
pub use repository::SyncRepository;
pub use store::{Database, LibSqlStore, LocalCache, LocalStore, Migration, Namespace};
