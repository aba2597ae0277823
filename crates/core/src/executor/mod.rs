//! Call plan submission.
//!
//! Two strategies implement [`TransactionExecutor`]:
//!
//! - [`AtomicBundleExecutor`] - whole plan as one all-or-nothing bundle
//! - [`SequentialExecutor`] - one call at a time, stopping at the first failure
//!
//! [`select_executor`] probes the wallet once and picks the strategy. The
//! per-payer single-flight rule lives in [`InFlightRegistry`].

mod atomic;
mod inflight;
mod sequential;
mod state;

pub use atomic::AtomicBundleExecutor;
pub use inflight::{InFlightGuard, InFlightRegistry};
pub use sequential::SequentialExecutor;
pub use state::SubmissionState;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::WalletError;
use crate::models::{CallPlan, ExecutionResult, ExecutionStrategy, FailureReason};
use crate::ports::WalletTransport;

/// Submits a call plan and reports one outcome per call.
///
/// Never retries and never returns an error: every wallet failure is folded
/// into the [`ExecutionResult`].
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    fn strategy(&self) -> ExecutionStrategy;

    async fn submit(&self, plan: &CallPlan) -> ExecutionResult;
}

/// Choose the executor matching what `wallet` supports.
///
/// A failed capability probe falls back to sequential submission, which
/// every wallet can serve.
pub async fn select_executor(wallet: Arc<dyn WalletTransport>) -> Arc<dyn TransactionExecutor> {
    match wallet.capabilities().await {
        Ok(caps) if caps.atomic_batch => {
            debug!("Wallet supports atomic bundles");
            Arc::new(AtomicBundleExecutor::new(wallet))
        }
        Ok(_) => {
            debug!("Wallet lacks atomic bundles, using sequential submission");
            Arc::new(SequentialExecutor::new(wallet))
        }
        Err(e) => {
            warn!(error = %e, "⚠️  Wallet capability probe failed, using sequential submission");
            Arc::new(SequentialExecutor::new(wallet))
        }
    }
}

/// Map a wallet error onto the call-level failure reason.
pub(crate) fn failure_reason(err: &WalletError) -> FailureReason {
    match err {
        WalletError::Rejected => FailureReason::Rejected,
        WalletError::Unconfirmed { reference, .. } => FailureReason::Unconfirmed(reference.clone()),
        other => FailureReason::ExecutionFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WalletResult;
    use crate::ports::WalletCapabilities;

    struct ProbeWallet(WalletResult<WalletCapabilities>);

    #[async_trait]
    impl WalletTransport for ProbeWallet {
        async fn capabilities(&self) -> WalletResult<WalletCapabilities> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_atomic_capable_wallet_gets_bundles() {
        let wallet = Arc::new(ProbeWallet(Ok(WalletCapabilities { atomic_batch: true })));
        assert_eq!(
            select_executor(wallet).await.strategy(),
            ExecutionStrategy::AtomicBundle
        );
    }

    #[tokio::test]
    async fn test_plain_wallet_gets_sequential() {
        let wallet = Arc::new(ProbeWallet(Ok(WalletCapabilities::default())));
        assert_eq!(
            select_executor(wallet).await.strategy(),
            ExecutionStrategy::Sequential
        );
    }

    // Critical: a failed probe still yields a usable executor
    #[tokio::test]
    async fn test_failed_probe_falls_back_to_sequential() {
        let wallet = Arc::new(ProbeWallet(Err(WalletError::Transport("down".into()))));
        assert_eq!(
            select_executor(wallet).await.strategy(),
            ExecutionStrategy::Sequential
        );
    }

    #[test]
    fn test_rejection_keeps_its_own_reason() {
        assert_eq!(failure_reason(&WalletError::Rejected), FailureReason::Rejected);
        assert!(matches!(
            failure_reason(&WalletError::Reverted("boom".into())),
            FailureReason::ExecutionFailed(msg) if msg.contains("boom")
        ));
    }

    // Critical: a timed-out confirmation is never reported as a plain failure
    #[test]
    fn test_unconfirmed_keeps_reference() {
        let err = WalletError::Unconfirmed {
            reference: "0xabab".into(),
            reason: "timed out waiting for receipt".into(),
        };
        assert_eq!(
            failure_reason(&err),
            FailureReason::Unconfirmed("0xabab".into())
        );
    }
}
