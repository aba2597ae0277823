//! One-call-at-a-time submission for wallets without atomic bundles.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::models::{CallFailure, CallOutcome, CallPlan, ExecutionResult, ExecutionStrategy};
use crate::ports::WalletTransport;

use super::{TransactionExecutor, failure_reason};

/// Submits calls in plan order and stops at the first failure.
///
/// Calls before the failure are SUCCEEDED, the failing call is FAILED and
/// the rest are NOT_ATTEMPTED. Earlier calls stay executed on-chain.
pub struct SequentialExecutor {
    wallet: Arc<dyn WalletTransport>,
}

impl SequentialExecutor {
    pub fn new(wallet: Arc<dyn WalletTransport>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl TransactionExecutor for SequentialExecutor {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Sequential
    }

    #[instrument(skip_all, fields(calls = plan.len()))]
    async fn submit(&self, plan: &CallPlan) -> ExecutionResult {
        let mut outcomes = vec![CallOutcome::not_attempted(); plan.len()];
        let mut failure = None;

        for (index, call) in plan.calls.iter().enumerate() {
            match self.wallet.submit_one(call).await {
                Ok(tx_hash) => {
                    debug!(call = index, tx = %tx_hash, "Call confirmed");
                    outcomes[index] = CallOutcome::succeeded(Some(tx_hash));
                }
                Err(e) => {
                    warn!(call = index, error = %e, "⚠️  Call failed, stopping submission");
                    outcomes[index] = CallOutcome::failed();
                    failure = Some(CallFailure {
                        call_index: index,
                        reason: failure_reason(&e),
                    });
                    break;
                }
            }
        }

        ExecutionResult::new(self.strategy(), outcomes, failure)
    }
}
