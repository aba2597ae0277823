//! Port trait for the wallet transaction interface.
//!
//! Wallets expose either an atomic multi-call bundle, single-call
//! submission, or both. The executor probes [`WalletTransport::capabilities`]
//! once and picks a strategy accordingly.

use async_trait::async_trait;

use crate::error::{WalletError, WalletResult};
use crate::models::{Call, TxHash};

/// Submission modes a wallet reports supporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletCapabilities {
    /// All-or-nothing multi-call bundles.
    pub atomic_batch: bool,
}

/// Receipt of a confirmed atomic bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReceipt {
    /// Transaction hashes, one per call or a single one for the bundle.
    pub tx_hashes: Vec<TxHash>,
}

impl BundleReceipt {
    /// Hash to attribute to the call at `index`.
    pub fn hash_for(&self, index: usize) -> Option<TxHash> {
        self.tx_hashes
            .get(index)
            .or_else(|| self.tx_hashes.first())
            .copied()
    }
}

/// Wallet transaction interface.
///
/// Both submit methods wait for the call(s) to be confirmed or to fail.
/// A user rejection must be reported as [`WalletError::Rejected`].
#[async_trait]
pub trait WalletTransport: Send + Sync {
    /// Report which submission modes are available.
    async fn capabilities(&self) -> WalletResult<WalletCapabilities>;

    /// Submit every call as one all-or-nothing bundle.
    async fn submit_atomic(&self, _calls: &[Call]) -> WalletResult<BundleReceipt> {
        Err(WalletError::Unsupported("atomic bundles"))
    }

    /// Submit a single call.
    async fn submit_one(&self, _call: &Call) -> WalletResult<TxHash> {
        Err(WalletError::Unsupported("single call submission"))
    }
}
