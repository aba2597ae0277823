//! Wallet adapter for the tipjar engine.
//!
//! This crate implements the `WalletTransport` port from `tipjar-core` over
//! a wallet's JSON-RPC endpoint, covering both atomic bundles
//! (`wallet_sendCalls`) and one-at-a-time transactions.

pub mod client;

pub use client::{JsonRpcWallet, JsonRpcWalletConfig};
