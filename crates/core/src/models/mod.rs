//! Domain models for tip distribution.
//!
//! These models are transport- and storage-agnostic and represent the
//! canonical form of a tip as it moves through the engine.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::str::FromStr;

use alloy_primitives::{Address, B256, Bytes, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Transaction hash returned by the wallet.
pub type TxHash = B256;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of the user sending a tip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayerId(pub String);

impl std::fmt::Display for PayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Role held by room participants (e.g. "host", "speaker").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleTag(pub String);

impl std::fmt::Display for RoleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Currencies
// =============================================================================

/// How a currency is laid out on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CurrencyKind {
    /// Chain native currency, sent as call value.
    Native,
    /// ERC-20 token, approved then pulled by the distribution contract.
    Token { contract: Address },
}

/// How a currency converts from USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Needs a USD-per-unit quote.
    #[default]
    Market,
    /// One unit is one USD.
    UsdPegged,
}

/// Static description of a tippable currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Configuration id (e.g. "eth", "usdc").
    pub id: String,
    /// Smallest-unit decimal precision.
    pub decimals: u8,
    pub kind: CurrencyKind,
    #[serde(default)]
    pub pricing: PricingMode,
}

impl Currency {
    /// Whether an external USD quote must be fetched before amount math.
    pub fn requires_quote(&self) -> bool {
        matches!(self.kind, CurrencyKind::Native) || self.pricing == PricingMode::Market
    }

    /// Token contract address, if any.
    pub fn token_contract(&self) -> Option<Address> {
        match self.kind {
            CurrencyKind::Native => None,
            CurrencyKind::Token { contract } => Some(contract),
        }
    }
}

// =============================================================================
// Requests & Recipients
// =============================================================================

/// Who a tip should go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientSelector {
    /// Explicit wallet addresses, possibly unvalidated.
    Addresses(Vec<String>),
    /// Role tags resolved against the live room roster at submission time.
    Roles(Vec<RoleTag>),
}

/// A user's intent to tip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipRequest {
    pub payer: PayerId,
    pub recipients: RecipientSelector,
    /// Amount in USD entered by the user.
    pub usd_amount: Decimal,
    pub currency: Currency,
}

/// Parse a user-entered USD amount.
///
/// Rejects anything that is not a strictly positive decimal number.
pub fn parse_usd_amount(input: &str) -> DomainResult<Decimal> {
    let amount = Decimal::from_str(input.trim())
        .map_err(|_| DomainError::InvalidAmount(format!("'{}' is not a number", input)))?;
    ensure_positive_usd(amount)?;
    Ok(amount)
}

/// Check that a USD amount is strictly positive.
pub fn ensure_positive_usd(amount: Decimal) -> DomainResult<()> {
    if amount.is_zero() || amount.is_sign_negative() {
        return Err(DomainError::InvalidAmount(format!(
            "USD amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// Deduplicated, order-stable, non-empty list of recipient addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRecipients(Vec<Address>);

impl ResolvedRecipients {
    /// Build from raw address strings.
    ///
    /// Blank, unparseable and zero addresses are dropped; the first
    /// occurrence of a duplicate wins. Fails with `NoRecipients` when
    /// nothing usable is left.
    pub fn from_raw<I, S>(raw: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let addresses: Vec<Address> = raw
            .into_iter()
            .filter_map(|s| {
                let s = s.as_ref().trim();
                if s.is_empty() {
                    return None;
                }
                Address::from_str(s).ok()
            })
            .filter(|addr| !addr.is_zero())
            .filter(|addr| seen.insert(*addr))
            .collect();

        if addresses.is_empty() {
            return Err(DomainError::NoRecipients);
        }
        Ok(Self(addresses))
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }

    /// Number of recipients. Never zero.
    pub fn count(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.0.len()).unwrap_or(NonZeroUsize::MIN)
    }
}

// =============================================================================
// Amounts & Batches
// =============================================================================

/// Integer split of a total on-chain amount across recipients.
///
/// `share * recipient_count + remainder == total` and
/// `remainder < recipient_count`. The remainder is not distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub total: U256,
    pub share: U256,
    pub remainder: U256,
    pub recipient_count: usize,
}

impl Distribution {
    /// Amount that actually leaves the payer's wallet.
    pub fn distributed(&self) -> U256 {
        self.share * U256::from(self.recipient_count)
    }
}

/// Contiguous chunk of recipients paid by one distribution call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Position in the batch sequence (0-based).
    pub index: usize,
    pub recipients: Vec<Address>,
    /// `share * recipients.len()`; call value for native, token amount otherwise.
    pub total: U256,
}

// =============================================================================
// Call Plans
// =============================================================================

/// Role of a call inside a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallKind {
    /// ERC-20 approval of the distribution contract.
    Approval,
    /// Distribution to the batch at `batch`.
    Distribution { batch: usize },
}

/// One contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub target: Address,
    pub value: U256,
    pub payload: Bytes,
    pub kind: CallKind,
}

/// Ordered calls for one tip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPlan {
    pub calls: Vec<Call>,
}

impl CallPlan {
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Sum of value attached across all calls.
    pub fn total_value(&self) -> U256 {
        self.calls.iter().fold(U256::ZERO, |acc, c| acc + c.value)
    }
}

// =============================================================================
// Execution
// =============================================================================

/// Submission mode used for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    AtomicBundle,
    Sequential,
}

impl ExecutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStrategy::AtomicBundle => "atomic_bundle",
            ExecutionStrategy::Sequential => "sequential",
        }
    }
}

/// Outcome of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Succeeded,
    Failed,
    NotAttempted,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Succeeded => "succeeded",
            CallStatus::Failed => "failed",
            CallStatus::NotAttempted => "not_attempted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub status: CallStatus,
    pub tx_hash: Option<TxHash>,
}

impl CallOutcome {
    pub fn succeeded(tx_hash: Option<TxHash>) -> Self {
        Self {
            status: CallStatus::Succeeded,
            tx_hash,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: CallStatus::Failed,
            tx_hash: None,
        }
    }

    pub fn not_attempted() -> Self {
        Self {
            status: CallStatus::NotAttempted,
            tx_hash: None,
        }
    }
}

/// Why a call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// User declined in the wallet.
    Rejected,
    /// Reverted or otherwise failed after submission.
    ExecutionFailed(String),
    /// Accepted by the wallet, outcome unknown. Carries the tx hash or bundle id.
    Unconfirmed(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Rejected => f.write_str("rejected in wallet"),
            FailureReason::ExecutionFailed(msg) => write!(f, "execution failed: {}", msg),
            FailureReason::Unconfirmed(reference) => {
                write!(f, "{} submitted but not confirmed, it may still execute", reference)
            }
        }
    }
}

/// First failing call of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFailure {
    pub call_index: usize,
    pub reason: FailureReason,
}

/// Overall status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    PartialFailure,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::PartialFailure => "partial_failure",
            ExecutionStatus::Failed => "failed",
        }
    }

    /// Derive the overall status from per-call outcomes.
    pub fn from_outcomes(outcomes: &[CallOutcome]) -> Self {
        let succeeded = outcomes
            .iter()
            .filter(|o| o.status == CallStatus::Succeeded)
            .count();
        match succeeded {
            0 => ExecutionStatus::Failed,
            n if n == outcomes.len() => ExecutionStatus::Succeeded,
            _ => ExecutionStatus::PartialFailure,
        }
    }
}

/// Immutable record of what happened to every call in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub strategy: ExecutionStrategy,
    /// One entry per call, in plan order.
    pub outcomes: Vec<CallOutcome>,
    pub status: ExecutionStatus,
    pub failure: Option<CallFailure>,
}

impl ExecutionResult {
    pub fn new(
        strategy: ExecutionStrategy,
        outcomes: Vec<CallOutcome>,
        failure: Option<CallFailure>,
    ) -> Self {
        let status = ExecutionStatus::from_outcomes(&outcomes);
        Self {
            strategy,
            outcomes,
            status,
            failure,
        }
    }

    /// Indices of batches whose distribution call succeeded.
    pub fn succeeded_batches(&self, plan: &CallPlan) -> Vec<usize> {
        plan.calls
            .iter()
            .zip(&self.outcomes)
            .filter_map(|(call, outcome)| match call.kind {
                CallKind::Distribution { batch } if outcome.status == CallStatus::Succeeded => {
                    Some(batch)
                }
                _ => None,
            })
            .collect()
    }

    /// Hashes of every succeeded call, deduplicated in order.
    pub fn tx_hashes(&self) -> Vec<TxHash> {
        let mut seen = HashSet::new();
        self.outcomes
            .iter()
            .filter(|o| o.status == CallStatus::Succeeded)
            .filter_map(|o| o.tx_hash)
            .filter(|h| seen.insert(*h))
            .collect()
    }
}

// =============================================================================
// Side Effects
// =============================================================================

/// Broadcast payload announcing a sent tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipEvent {
    pub payer: PayerId,
    /// Only recipients whose batch actually executed.
    pub recipients: Vec<Address>,
    pub usd_amount: Decimal,
    pub currency_id: String,
    pub amount_per_recipient: U256,
}

/// Persisted bookkeeping of a tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipRecord {
    pub payer: PayerId,
    /// Only recipients whose batch actually executed.
    pub recipients: Vec<Address>,
    /// USD value of the covered part of the tip.
    pub usd_amount: Decimal,
    pub currency_id: String,
    /// Smallest units actually sent (`share * recipients.len()`).
    pub amount: U256,
    pub amount_per_recipient: U256,
    pub tx_hashes: Vec<TxHash>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn addr(byte: u8) -> String {
        format!("0x{}", format!("{:02x}", byte).repeat(20))
    }

    #[test]
    fn resolved_recipients_dedupes_in_order() {
        let resolved =
            ResolvedRecipients::from_raw([addr(2), addr(1), addr(2), addr(3), addr(1)]).unwrap();
        let expected: Vec<Address> = [2u8, 1, 3]
            .iter()
            .map(|b| Address::repeat_byte(*b))
            .collect();
        assert_eq!(resolved.as_slice(), expected.as_slice());
        assert_eq!(resolved.count().get(), 3);
    }

    #[test]
    fn resolved_recipients_filters_invalid() {
        let resolved = ResolvedRecipients::from_raw([
            "".to_string(),
            "   ".to_string(),
            "not-an-address".to_string(),
            "0x1234".to_string(),
            Address::ZERO.to_string(),
            addr(7),
        ])
        .unwrap();
        assert_eq!(resolved.as_slice(), &[Address::repeat_byte(7)]);
    }

    // Critical: nothing usable means NoRecipients, never an empty list
    #[test]
    fn resolved_recipients_empty_is_error() {
        let err = ResolvedRecipients::from_raw(["", "garbage"]).unwrap_err();
        assert_eq!(err, DomainError::NoRecipients);
        let none: [&str; 0] = [];
        assert_eq!(
            ResolvedRecipients::from_raw(none).unwrap_err(),
            DomainError::NoRecipients
        );
    }

    #[test]
    fn parse_usd_amount_accepts_positive_decimals() {
        assert_eq!(parse_usd_amount("1.00").unwrap(), dec!(1.00));
        assert_eq!(parse_usd_amount(" 5 ").unwrap(), dec!(5));
    }

    #[test]
    fn parse_usd_amount_rejects_bad_input() {
        for input in ["0", "-1", "abc", "", "NaN", "0.00"] {
            assert!(
                matches!(parse_usd_amount(input), Err(DomainError::InvalidAmount(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn execution_status_from_outcomes() {
        let ok = CallOutcome::succeeded(None);
        let failed = CallOutcome::failed();
        let skipped = CallOutcome::not_attempted();

        assert_eq!(
            ExecutionStatus::from_outcomes(&[ok.clone(), ok.clone()]),
            ExecutionStatus::Succeeded
        );
        assert_eq!(
            ExecutionStatus::from_outcomes(&[ok, failed.clone(), skipped.clone()]),
            ExecutionStatus::PartialFailure
        );
        assert_eq!(
            ExecutionStatus::from_outcomes(&[failed, skipped]),
            ExecutionStatus::Failed
        );
        assert_eq!(ExecutionStatus::from_outcomes(&[]), ExecutionStatus::Failed);
    }

    #[test]
    fn currency_quote_requirement() {
        let native = Currency {
            id: "eth".into(),
            decimals: 18,
            kind: CurrencyKind::Native,
            pricing: PricingMode::Market,
        };
        let stable = Currency {
            id: "usdc".into(),
            decimals: 6,
            kind: CurrencyKind::Token {
                contract: Address::repeat_byte(0xaa),
            },
            pricing: PricingMode::UsdPegged,
        };
        assert!(native.requires_quote());
        assert!(!stable.requires_quote());
        assert_eq!(stable.token_contract(), Some(Address::repeat_byte(0xaa)));
    }

    #[test]
    fn currency_deserializes_from_config_json() {
        let json = r#"{
            "id": "usdc",
            "decimals": 6,
            "kind": { "type": "token", "contract": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" },
            "pricing": "usd_pegged"
        }"#;
        let currency: Currency = serde_json::from_str(json).unwrap();
        assert_eq!(currency.pricing, PricingMode::UsdPegged);
        assert_eq!(currency.token_contract(), Some(Address::repeat_byte(0xaa)));
    }
}
