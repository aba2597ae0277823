//! PostgreSQL storage adapter.
//!
//! This module implements the `TipRecordStore` port defined in `tipjar-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgTipRecordStore`] - Tip records and their paid recipients
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_cli(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let store = PgTipRecordStore::new(&db);
//! ```

mod database;
mod helpers;
mod tip_repo;

pub use database::{Database, DatabaseConfig};
pub use tip_repo::PgTipRecordStore;
