//! Storage layer for the tipjar engine.
//!
//! This crate provides the PostgreSQL implementation of the `TipRecordStore`
//! port defined in `tipjar-core`. It handles connection pooling, migrations
//! and tip record reads and writes.
//!
//! # Usage
//!
//! ```ignore
//! use tipjar_storage::{Database, DatabaseConfig, PgTipRecordStore};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_cli(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! let store = Arc::new(PgTipRecordStore::new(&db));
//! ```

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, PgTipRecordStore};
