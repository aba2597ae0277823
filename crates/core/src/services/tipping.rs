//! Tip orchestration.
//!
//! # Flow
//!
//! ```text
//! request -> prepare -> [in-flight guard] -> submit -> reconcile
//!            (resolve, quote, split, batch, plan)
//! ```
//!
//! Everything up to the plan is pure and fails fast with a
//! [`DomainError`]. Once a plan is handed to the executor the outcome is
//! always reported, never turned into an error.

use std::sync::Arc;

use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::engine::{
    BatchSize, ContractAddresses, build_call_plan, compute_on_chain_amount,
    compute_per_recipient_share, split_into_batches,
};
use crate::error::{DomainError, DomainResult, TipError, TipResult};
use crate::executor::{InFlightRegistry, SubmissionState, TransactionExecutor};
use crate::metrics::{SubmissionTimer, record_tip_outcome, record_tip_rejected, record_tip_submitted};
use crate::models::{
    Batch, CallPlan, CallStatus, Currency, Distribution, ExecutionResult, PayerId,
    RecipientSelector, ResolvedRecipients, TipRequest, ensure_positive_usd,
};
use crate::ports::{PriceSource, RosterResolver, TipNotifier, TipRecordStore};

use super::reconciliation::{ReconciliationHandler, ReconciliationOutcome};

/// A validated tip with its call plan, ready for submission.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedTip {
    pub request: TipRequest,
    /// Recipients as resolved at preparation time.
    pub recipients: ResolvedRecipients,
    /// USD quote used, if the currency needed one.
    pub price: Option<Decimal>,
    pub distribution: Distribution,
    pub batches: Vec<Batch>,
    pub plan: CallPlan,
    pub state: SubmissionState,
}

/// Everything that happened to one submitted tip.
#[derive(Debug, Clone, Serialize)]
pub struct TipReceipt {
    pub prepared: PreparedTip,
    pub execution: ExecutionResult,
    pub reconciliation: ReconciliationOutcome,
}

impl TipReceipt {
    /// Smallest units that actually left the payer's wallet.
    pub fn amount_sent(&self) -> U256 {
        self.reconciliation
            .record
            .as_ref()
            .map(|r| r.amount)
            .unwrap_or(U256::ZERO)
    }
}

/// Orchestrates tip preparation, submission and reconciliation.
pub struct TipService {
    currencies: Vec<Currency>,
    batch_size: BatchSize,
    contracts: ContractAddresses,
    prices: Arc<dyn PriceSource>,
    roster: Arc<dyn RosterResolver>,
    executor: Arc<dyn TransactionExecutor>,
    reconciler: ReconciliationHandler,
    in_flight: InFlightRegistry,
}

impl TipService {
    /// Create a service from validated configuration and adapters.
    ///
    /// Fails when the configuration does not validate.
    pub fn new(
        config: &EngineConfig,
        prices: Arc<dyn PriceSource>,
        roster: Arc<dyn RosterResolver>,
        executor: Arc<dyn TransactionExecutor>,
        notifier: Arc<dyn TipNotifier>,
        store: Arc<dyn TipRecordStore>,
    ) -> TipResult<Self> {
        let batch_size = config.validate()?;
        info!(
            batch_size = batch_size.get(),
            currencies = config.currencies.len(),
            strategy = executor.strategy().as_str(),
            "Tip service ready"
        );
        Ok(Self {
            currencies: config.currencies.clone(),
            batch_size,
            contracts: config.contracts(),
            prices,
            roster,
            executor,
            reconciler: ReconciliationHandler::new(notifier, store),
            in_flight: InFlightRegistry::new(),
        })
    }

    /// Build a request against a configured currency.
    pub fn request(
        &self,
        payer: PayerId,
        recipients: RecipientSelector,
        usd_amount: Decimal,
        currency_id: &str,
    ) -> TipResult<TipRequest> {
        let currency = self
            .currencies
            .iter()
            .find(|c| c.id == currency_id)
            .cloned()
            .ok_or_else(|| DomainError::UnknownCurrency(currency_id.to_string()))?;
        Ok(TipRequest {
            payer,
            recipients,
            usd_amount,
            currency,
        })
    }

    /// Whether `payer` currently has a submission running.
    pub fn is_in_flight(&self, payer: &PayerId) -> bool {
        self.in_flight.is_in_flight(payer)
    }

    /// Validate a request and build its call plan without submitting.
    ///
    /// Roles are resolved here, once, against the live roster.
    #[instrument(skip_all, fields(payer = %request.payer, currency = %request.currency.id))]
    pub async fn prepare(&self, request: TipRequest) -> TipResult<PreparedTip> {
        let mut prepared = self.build(request).await.inspect_err(|e| {
            debug!(error = %e, "Tip request rejected");
            record_tip_rejected(rejection_reason(e));
        })?;
        prepared.state = prepared.state.transition(SubmissionState::Built)?;
        Ok(prepared)
    }

    async fn build(&self, request: TipRequest) -> DomainResult<PreparedTip> {
        let recipients = self.resolve_recipients(&request.recipients).await?;
        ensure_positive_usd(request.usd_amount)?;

        let currency = &request.currency;
        let price = if currency.requires_quote() {
            let quote = self.prices.usd_price(&currency.id).await;
            if quote.is_none() {
                warn!("⚠️  No USD quote available");
            }
            quote
        } else {
            None
        };

        let total = compute_on_chain_amount(request.usd_amount, currency, price)?;
        let distribution = compute_per_recipient_share(total, recipients.count());
        if distribution.share.is_zero() {
            return Err(DomainError::InvalidAmount(format!(
                "${} is too small to split across {} recipient(s)",
                request.usd_amount, distribution.recipient_count
            )));
        }

        let batches = split_into_batches(recipients.as_slice(), self.batch_size, distribution.share);
        let plan = build_call_plan(currency, &batches, &self.contracts);

        debug!(
            recipients = distribution.recipient_count,
            share = %distribution.share,
            remainder = %distribution.remainder,
            batches = batches.len(),
            calls = plan.len(),
            "Call plan built"
        );

        Ok(PreparedTip {
            request,
            recipients,
            price,
            distribution,
            batches,
            plan,
            state: SubmissionState::Idle,
        })
    }

    async fn resolve_recipients(
        &self,
        selector: &RecipientSelector,
    ) -> DomainResult<ResolvedRecipients> {
        match selector {
            RecipientSelector::Addresses(raw) => ResolvedRecipients::from_raw(raw),
            RecipientSelector::Roles(roles) => {
                let mut raw = Vec::new();
                for role in roles {
                    let holders = self.roster.resolve_role(role).await;
                    debug!(role = %role, holders = holders.len(), "Role resolved");
                    raw.extend(holders);
                }
                ResolvedRecipients::from_raw(raw)
            }
        }
    }

    /// Prepare, submit and reconcile a tip.
    ///
    /// Rejects with `SubmissionInFlight` if the payer already has a tip
    /// being submitted. Post-submission failures are reported in the
    /// receipt, not as errors.
    #[instrument(skip_all, fields(payer = %request.payer, usd = %request.usd_amount))]
    pub async fn send(&self, request: TipRequest) -> TipResult<TipReceipt> {
        // Reject before any roster or price lookup; try_acquire below closes the race.
        if self.in_flight.is_in_flight(&request.payer) {
            record_tip_rejected("in_flight");
            return Err(TipError::SubmissionInFlight(request.payer.to_string()));
        }
        let mut prepared = self.prepare(request).await?;

        let guard = self
            .in_flight
            .try_acquire(&prepared.request.payer)
            .inspect_err(|_| record_tip_rejected("in_flight"))?;
        prepared.state = prepared.state.transition(SubmissionState::Submitting)?;

        let strategy = self.executor.strategy();
        record_tip_submitted(strategy);
        info!(
            strategy = strategy.as_str(),
            calls = prepared.plan.len(),
            "🚀 Submitting tip"
        );

        let execution = {
            let _timer = SubmissionTimer::new();
            self.executor.submit(&prepared.plan).await
        };
        drop(guard);

        let statuses: Vec<CallStatus> = execution.outcomes.iter().map(|o| o.status).collect();
        record_tip_outcome(execution.status, &statuses);
        prepared.state = prepared.state.transition(execution.status.into())?;

        let reconciliation = self.reconciler.reconcile(&prepared, &execution).await;
        info!(status = execution.status.as_str(), "{}", reconciliation.summary());

        Ok(TipReceipt {
            prepared,
            execution,
            reconciliation,
        })
    }
}

fn rejection_reason(err: &DomainError) -> &'static str {
    match err {
        DomainError::InvalidAmount(_) => "invalid_amount",
        DomainError::NoRecipients => "no_recipients",
        DomainError::PriceUnavailable(_) => "price_unavailable",
        DomainError::UnknownCurrency(_) => "unknown_currency",
    }
}
