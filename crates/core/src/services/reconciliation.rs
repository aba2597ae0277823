//! Post-submission reconciliation.
//!
//! Turns an [`ExecutionResult`] into side effects and a user-facing
//! outcome. Only recipients whose distribution call actually executed are
//! ever announced or recorded.

use std::collections::HashSet;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::SettlementError;
use crate::metrics::record_persistence_failure;
use crate::models::{
    CallFailure, ExecutionResult, ExecutionStatus, FailureReason, TipEvent, TipRecord,
};
use crate::ports::{TipNotifier, TipRecordStore};

use super::tipping::PreparedTip;

/// Result of reconciling one submission.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationOutcome {
    pub status: ExecutionStatus,
    /// Present when at least one recipient was paid.
    pub record: Option<TipRecord>,
    /// Recipients from the request that were not paid.
    pub uncovered: Vec<Address>,
    /// Execution-side problem, if any.
    pub execution_error: Option<SettlementError>,
    /// Set when the record could not be saved.
    pub persistence_error: Option<SettlementError>,
    /// Tx hash or bundle id of a submission whose outcome is unknown.
    pub unconfirmed: Option<String>,
}

impl ReconciliationOutcome {
    /// Whether any recipient received funds.
    pub fn payment_went_through(&self) -> bool {
        self.record.is_some()
    }

    /// True unless nothing can have been paid.
    ///
    /// An unconfirmed submission may still execute, so it counts here even
    /// when no recipient is known to be paid.
    pub fn payment_may_have_gone_through(&self) -> bool {
        self.record.is_some() || self.unconfirmed.is_some()
    }

    /// One-line message suitable for the user.
    ///
    /// Always says whether anything was paid: "nothing happened" and
    /// "some recipients got paid" call for different actions.
    pub fn summary(&self) -> String {
        let mut msg = match (&self.record, &self.execution_error) {
            (Some(record), None) => format!(
                "Tip sent to {} recipient(s).",
                record.recipients.len()
            ),
            (Some(record), Some(err)) => format!(
                "Tip partially sent: {} recipient(s) paid, {} not paid. {}",
                record.recipients.len(),
                self.uncovered.len(),
                err
            ),
            (None, Some(err @ SettlementError::OutcomeUnknown(_))) => err.to_string(),
            (None, Some(err)) => format!("No payment went through. {}", err),
            (None, None) => "No payment went through.".to_string(),
        };
        if self.record.is_some() && !self.uncovered.is_empty() {
            let unpaid: Vec<String> = self.uncovered.iter().map(|a| a.to_string()).collect();
            let label = if self.unconfirmed.is_some() {
                "Not confirmed"
            } else {
                "Not paid"
            };
            msg.push_str(&format!(" {}: {}.", label, unpaid.join(", ")));
        }
        if let Some(err) = &self.persistence_error {
            msg.push(' ');
            msg.push_str(&err.to_string());
        }
        msg
    }
}

/// Runs the exactly-once side effects of a terminal submission.
///
/// Invoked once per terminal executor state; it never re-invokes itself.
pub struct ReconciliationHandler {
    notifier: Arc<dyn TipNotifier>,
    store: Arc<dyn TipRecordStore>,
}

impl ReconciliationHandler {
    pub fn new(notifier: Arc<dyn TipNotifier>, store: Arc<dyn TipRecordStore>) -> Self {
        Self { notifier, store }
    }

    #[instrument(skip_all, fields(payer = %prepared.request.payer, status = result.status.as_str()))]
    pub async fn reconcile(
        &self,
        prepared: &PreparedTip,
        result: &ExecutionResult,
    ) -> ReconciliationOutcome {
        let covered = covered_recipients(prepared, result);
        let covered_set: HashSet<Address> = covered.iter().copied().collect();
        let uncovered: Vec<Address> = prepared
            .recipients
            .as_slice()
            .iter()
            .filter(|a| !covered_set.contains(*a))
            .copied()
            .collect();
        let total = prepared.recipients.as_slice().len();
        let execution_error = classify(result.failure.as_ref(), covered.len(), total);
        let unconfirmed = result.failure.as_ref().and_then(|f| match &f.reason {
            FailureReason::Unconfirmed(reference) => Some(reference.clone()),
            _ => None,
        });
        if let Some(reference) = &unconfirmed {
            warn!(%reference, "⚠️  Submission outcome unknown, it may still execute");
        }

        if covered.is_empty() {
            debug!("Nothing paid, skipping notification and persistence");
            return ReconciliationOutcome {
                status: result.status,
                record: None,
                uncovered,
                execution_error,
                persistence_error: None,
                unconfirmed,
            };
        }

        let share = prepared.distribution.share;
        let usd_amount = covered_usd(prepared.request.usd_amount, covered.len(), total);

        self.notifier.broadcast(TipEvent {
            payer: prepared.request.payer.clone(),
            recipients: covered.clone(),
            usd_amount,
            currency_id: prepared.request.currency.id.clone(),
            amount_per_recipient: share,
        });

        let record = TipRecord {
            payer: prepared.request.payer.clone(),
            amount: share * U256::from(covered.len()),
            recipients: covered,
            usd_amount,
            currency_id: prepared.request.currency.id.clone(),
            amount_per_recipient: share,
            tx_hashes: result.tx_hashes(),
            created_at: chrono::Utc::now(),
        };

        let persistence_error = match self.store.save_tip_record(&record).await {
            Ok(()) => {
                debug!("Tip record saved");
                None
            }
            Err(e) => {
                warn!(error = %e, "⚠️  Failed to save tip record, payment stands");
                record_persistence_failure();
                Some(SettlementError::PersistenceFailure(e.to_string()))
            }
        };

        info!(
            paid = record.recipients.len(),
            unpaid = uncovered.len(),
            usd = %record.usd_amount,
            "💸 Tip reconciled"
        );

        ReconciliationOutcome {
            status: result.status,
            record: Some(record),
            uncovered,
            execution_error,
            persistence_error,
            unconfirmed,
        }
    }
}

/// Recipients of every batch whose distribution call succeeded, in order.
fn covered_recipients(prepared: &PreparedTip, result: &ExecutionResult) -> Vec<Address> {
    result
        .succeeded_batches(&prepared.plan)
        .into_iter()
        .filter_map(|index| prepared.batches.get(index))
        .flat_map(|batch| batch.recipients.iter().copied())
        .collect()
}

/// USD value of the paid portion.
fn covered_usd(usd_amount: Decimal, covered: usize, total: usize) -> Decimal {
    if covered == total || total == 0 {
        return usd_amount;
    }
    (usd_amount * Decimal::from(covered) / Decimal::from(total)).round_dp(usd_amount.scale().max(2))
}

fn classify(
    failure: Option<&CallFailure>,
    covered: usize,
    total: usize,
) -> Option<SettlementError> {
    let failure = failure?;
    if covered > 0 {
        return Some(SettlementError::PartialBatchFailure {
            covered,
            total,
            reason: failure.reason.to_string(),
        });
    }
    Some(match &failure.reason {
        FailureReason::Rejected => SettlementError::CallSubmissionRejected,
        FailureReason::ExecutionFailed(msg) => SettlementError::OnChainExecutionFailed(msg.clone()),
        FailureReason::Unconfirmed(reference) => SettlementError::OutcomeUnknown(reference.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTipRecordStore;
    use crate::engine::{BatchSize, ContractAddresses, build_call_plan, compute_per_recipient_share, split_into_batches};
    use crate::error::{StorageError, StorageResult};
    use crate::executor::SubmissionState;
    use crate::models::{
        CallOutcome, Currency, CurrencyKind, ExecutionStrategy, PayerId, PricingMode,
        RecipientSelector, ResolvedRecipients, TipRequest,
    };
    use alloy_primitives::B256;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<TipEvent>>);

    impl TipNotifier for RecordingNotifier {
        fn broadcast(&self, event: TipEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    struct FailingStore;

    #[async_trait]
    impl TipRecordStore for FailingStore {
        async fn save_tip_record(&self, _record: &TipRecord) -> StorageResult<()> {
            Err(StorageError::QueryError("disk full".into()))
        }
    }

    fn addresses(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("0x{:040x}", i)).collect()
    }

    /// Native tip of $6 split 3 per batch, one distribution call per batch.
    fn prepared(count: usize, batch_size: usize) -> PreparedTip {
        let currency = Currency {
            id: "eth".into(),
            decimals: 18,
            kind: CurrencyKind::Native,
            pricing: PricingMode::Market,
        };
        let raw = addresses(count);
        let recipients = ResolvedRecipients::from_raw(&raw).unwrap();
        let distribution = compute_per_recipient_share(U256::from(600u16), recipients.count());
        let batches = split_into_batches(
            recipients.as_slice(),
            BatchSize::new(batch_size).unwrap(),
            distribution.share,
        );
        let plan = build_call_plan(
            &currency,
            &batches,
            &ContractAddresses {
                distribution: Address::repeat_byte(0xd1),
            },
        );
        PreparedTip {
            request: TipRequest {
                payer: PayerId::from("alice"),
                recipients: RecipientSelector::Addresses(raw),
                usd_amount: dec!(6),
                currency,
            },
            recipients,
            price: Some(dec!(2500)),
            distribution,
            batches,
            plan,
            state: SubmissionState::Built,
        }
    }

    fn sequential(outcomes: Vec<CallOutcome>, failure: Option<CallFailure>) -> ExecutionResult {
        ExecutionResult::new(ExecutionStrategy::Sequential, outcomes, failure)
    }

    #[tokio::test]
    async fn test_success_notifies_and_persists_everyone() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryTipRecordStore::new());
        let handler = ReconciliationHandler::new(notifier.clone(), store.clone());

        let tip = prepared(3, 20);
        let result = sequential(vec![CallOutcome::succeeded(Some(B256::repeat_byte(1)))], None);
        let outcome = handler.reconcile(&tip, &result).await;

        assert!(outcome.payment_went_through());
        assert!(outcome.uncovered.is_empty());
        assert_eq!(notifier.0.lock().unwrap().len(), 1);
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].recipients.len(), 3);
        assert_eq!(records[0].amount, U256::from(600u16));
        assert_eq!(records[0].usd_amount, dec!(6));
        assert!(outcome.summary().starts_with("Tip sent to 3"));
    }

    // Critical: partial failure records only the batches that executed
    #[tokio::test]
    async fn test_partial_failure_covers_only_succeeded_batches() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryTipRecordStore::new());
        let handler = ReconciliationHandler::new(notifier.clone(), store.clone());

        // 6 recipients, batches of 2 -> 3 calls; call 2 fails
        let tip = prepared(6, 2);
        let result = sequential(
            vec![
                CallOutcome::succeeded(Some(B256::repeat_byte(1))),
                CallOutcome::failed(),
                CallOutcome::not_attempted(),
            ],
            Some(CallFailure {
                call_index: 1,
                reason: FailureReason::ExecutionFailed("reverted".into()),
            }),
        );
        let outcome = handler.reconcile(&tip, &result).await;

        let paid = tip.batches[0].recipients.clone();
        let events = notifier.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].recipients, paid);

        let record = outcome.record.clone().unwrap();
        assert_eq!(record.recipients, paid);
        assert_eq!(record.amount, U256::from(200u16));
        assert_eq!(record.usd_amount, dec!(2.00));
        assert_eq!(outcome.uncovered.len(), 4);
        assert!(matches!(
            outcome.execution_error,
            Some(SettlementError::PartialBatchFailure { covered: 2, total: 6, .. })
        ));
        let summary = outcome.summary();
        assert!(summary.contains("partially sent"));
        assert!(summary.contains(&outcome.uncovered[0].to_string()));
        assert_eq!(store.records(), vec![record]);
    }

    #[tokio::test]
    async fn test_unconfirmed_batch_is_not_called_unpaid() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryTipRecordStore::new());
        let handler = ReconciliationHandler::new(notifier.clone(), store.clone());

        let tip = prepared(6, 2);
        let result = sequential(
            vec![
                CallOutcome::succeeded(Some(B256::repeat_byte(1))),
                CallOutcome::failed(),
                CallOutcome::not_attempted(),
            ],
            Some(CallFailure {
                call_index: 1,
                reason: FailureReason::Unconfirmed("0xabab".into()),
            }),
        );
        let outcome = handler.reconcile(&tip, &result).await;

        // only the confirmed batch is recorded
        assert_eq!(store.records()[0].recipients, tip.batches[0].recipients);
        assert_eq!(outcome.unconfirmed.as_deref(), Some("0xabab"));
        let summary = outcome.summary();
        assert!(summary.contains("0xabab submitted but not confirmed"));
        assert!(summary.contains("Not confirmed:"));
        assert!(!summary.contains("Not paid:"));
    }

    #[tokio::test]
    async fn test_failure_has_no_side_effects() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryTipRecordStore::new());
        let handler = ReconciliationHandler::new(notifier.clone(), store.clone());

        let tip = prepared(3, 20);
        let result = sequential(
            vec![CallOutcome::failed()],
            Some(CallFailure {
                call_index: 0,
                reason: FailureReason::Rejected,
            }),
        );
        let outcome = handler.reconcile(&tip, &result).await;

        assert!(!outcome.payment_went_through());
        assert!(notifier.0.lock().unwrap().is_empty());
        assert!(store.records().is_empty());
        assert_eq!(
            outcome.execution_error,
            Some(SettlementError::CallSubmissionRejected)
        );
        assert!(outcome.summary().starts_with("No payment went through"));
        assert!(!outcome.payment_may_have_gone_through());
    }

    // Critical: a bookkeeping failure never hides a completed payment
    #[tokio::test]
    async fn test_persistence_failure_keeps_success() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = ReconciliationHandler::new(notifier.clone(), Arc::new(FailingStore));

        let tip = prepared(3, 20);
        let result = sequential(vec![CallOutcome::succeeded(None)], None);
        let outcome = handler.reconcile(&tip, &result).await;

        assert_eq!(outcome.status, ExecutionStatus::Succeeded);
        assert!(outcome.payment_went_through());
        assert_eq!(notifier.0.lock().unwrap().len(), 1);
        assert!(matches!(
            outcome.persistence_error,
            Some(SettlementError::PersistenceFailure(ref msg)) if msg.contains("disk full")
        ));
    }

    #[test]
    fn test_covered_usd_is_pro_rated() {
        assert_eq!(covered_usd(dec!(10), 1, 3), dec!(3.33));
        assert_eq!(covered_usd(dec!(10), 3, 3), dec!(10));
    }
}
