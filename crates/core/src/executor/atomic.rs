//! All-or-nothing bundle submission.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::models::{CallFailure, CallOutcome, CallPlan, ExecutionResult, ExecutionStrategy};
use crate::ports::WalletTransport;

use super::{TransactionExecutor, failure_reason};

/// Submits the whole plan as a single atomic bundle.
///
/// The wallet guarantees atomicity, so the result is binary: every call
/// succeeded, or every call failed. There is no partial failure here.
pub struct AtomicBundleExecutor {
    wallet: Arc<dyn WalletTransport>,
}

impl AtomicBundleExecutor {
    pub fn new(wallet: Arc<dyn WalletTransport>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl TransactionExecutor for AtomicBundleExecutor {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::AtomicBundle
    }

    #[instrument(skip_all, fields(calls = plan.len()))]
    async fn submit(&self, plan: &CallPlan) -> ExecutionResult {
        if plan.is_empty() {
            return ExecutionResult::new(self.strategy(), Vec::new(), None);
        }

        match self.wallet.submit_atomic(&plan.calls).await {
            Ok(receipt) => {
                debug!(txs = receipt.tx_hashes.len(), "Bundle confirmed");
                let outcomes = (0..plan.len())
                    .map(|i| CallOutcome::succeeded(receipt.hash_for(i)))
                    .collect();
                ExecutionResult::new(self.strategy(), outcomes, None)
            }
            Err(e) => {
                warn!(error = %e, "⚠️  Bundle failed");
                let outcomes = vec![CallOutcome::failed(); plan.len()];
                let failure = CallFailure {
                    call_index: 0,
                    reason: failure_reason(&e),
                };
                ExecutionResult::new(self.strategy(), outcomes, Some(failure))
            }
        }
    }
}
