//! Core domain layer for the tipjar distribution engine.
//!
//! This crate contains the domain models, port traits (interfaces), the pure
//! amount/batch/plan engine and the orchestration services. It follows
//! hexagonal architecture principles - this is the innermost layer with
//! no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     tipjar (binary)                         │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │        tipjar-wallet         │        tipjar-storage        │
//! │        (JSON-RPC)            │        (PostgreSQL)          │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                     tipjar-core  ← YOU ARE HERE             │
//! │          (models, engine, executor, ports, services)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (TipRequest, CallPlan, ExecutionResult, etc.)
//! - [`engine`] - Amount conversion, batching and call plan construction
//! - [`executor`] - Atomic and sequential submission strategies
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Orchestration (TipService) and reconciliation
//! - [`adapters`] - In-process port implementations
//! - [`config`] - Static engine configuration
//! - [`error`] - Error types
//! - [`metrics`] - Metrics definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! - [`ports::PriceSource`] - USD quotes per currency
//! - [`ports::RosterResolver`] - Role tag to wallet address lookup
//! - [`ports::WalletTransport`] - Submit calls to the payer's wallet
//! - [`ports::TipNotifier`] - Announce sent tips
//! - [`ports::TipRecordStore`] - Persist tip bookkeeping
//!
//! ## Tip Lifecycle
//!
//! 1. Resolve recipients (roles against the live roster)
//! 2. Convert USD to smallest units and split evenly
//! 3. Chunk recipients into batches and build the call plan
//! 4. Submit atomically or sequentially, one submission per payer at a time
//! 5. Notify and persist only what actually executed

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
