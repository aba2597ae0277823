//! Error types for the tipping domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Validation failures detected before any call is built
//! - [`WalletError`] - Wallet transport failures and user rejections
//! - [`StorageError`] - Tip record persistence errors
//! - [`SettlementError`] - Post-submission failures reported to the user
//! - [`TipError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Domain Errors
// =============================================================================

/// Tip request validation failures.
///
/// Every variant here is detected synchronously, before a call plan is
/// built, so nothing has been submitted when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// USD amount is non-positive, unparseable, or rounds to nothing on-chain.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Recipient list is empty after resolution and filtering.
    #[error("No recipients to tip")]
    NoRecipients,

    /// A required USD quote is missing or zero.
    #[error("Price unavailable for currency {0}")]
    PriceUnavailable(String),

    /// Currency id is not part of the static configuration.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

// =============================================================================
// Wallet Errors
// =============================================================================

/// Wallet transaction interface errors.
///
/// `Rejected` and `Reverted` both end up as a FAILED call outcome; they are
/// kept apart so the caller can tell the user what actually happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// User declined the request in their wallet.
    #[error("Transaction rejected by user")]
    Rejected,

    /// Call was accepted by the network and then reverted.
    #[error("Execution reverted: {0}")]
    Reverted(String),

    /// RPC or network failure talking to the wallet.
    #[error("Wallet transport error: {0}")]
    Transport(String),

    /// The wallet does not implement the requested submission mode.
    #[error("Wallet does not support {0}")]
    Unsupported(&'static str),

    /// The wallet accepted the submission but its outcome could not be
    /// confirmed. It may still execute on-chain.
    #[error("Submitted as {reference} but not confirmed: {reason}")]
    Unconfirmed {
        /// Transaction hash or bundle id handed back by the wallet.
        reference: String,
        reason: String,
    },
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Tip record persistence errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Transaction could not be started or committed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Stored value could not be converted back into a domain type.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Settlement Errors
// =============================================================================

/// Problems only knowable after submission.
///
/// These never abort the flow; they are attached to the reconciliation
/// outcome so the caller can tell the user exactly what went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum SettlementError {
    /// User declined the transaction in their wallet.
    #[error("Transaction was rejected in the wallet")]
    CallSubmissionRejected,

    /// A submitted call reverted or otherwise failed.
    #[error("On-chain execution failed: {0}")]
    OnChainExecutionFailed(String),

    /// A submitted call was never confirmed either way.
    #[error("Payment may have gone through: {0} was submitted but not confirmed. Check it before retrying")]
    OutcomeUnknown(String),

    /// Sequential submission stopped part way through.
    #[error("Only {covered} of {total} recipients were paid: {reason}")]
    PartialBatchFailure {
        /// Recipients whose batch executed.
        covered: usize,
        /// Recipients in the request.
        total: usize,
        /// Why the failing call failed.
        reason: String,
    },

    /// Tip record could not be saved. The payment itself stands.
    #[error("Tip record could not be saved: {0}")]
    PersistenceFailure(String),
}

// =============================================================================
// Tip Errors
// =============================================================================

/// Top-level tipping errors.
///
/// This is the error type returned by [`crate::services::TipService`].
/// Post-submission failures are not errors at this level: they come back as
/// an [`crate::models::ExecutionResult`] so partial coverage is never lost.
#[derive(Debug, Error)]
pub enum TipError {
    /// Request validation failed.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Wallet could not be probed or used.
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Persistence adapter failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid static configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The payer already has a submission in flight.
    #[error("A tip from {0} is already being submitted")]
    SubmissionInFlight(String),

    /// Illegal submission state transition.
    #[error("Invalid submission state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the submission was in.
        from: &'static str,
        /// State that was requested.
        to: &'static str,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for tipping operations.
pub type TipResult<T> = Result<T, TipError>;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    // Critical: ? works from every layer up to TipError
    #[test]
    fn test_error_conversion_chain() {
        let tip_err: TipError = DomainError::NoRecipients.into();
        assert!(tip_err.to_string().contains("No recipients"));

        let tip_err: TipError = StorageError::QueryError("db failed".into()).into();
        assert!(tip_err.to_string().contains("db failed"));

        let tip_err: TipError = WalletError::Transport("rpc down".into()).into();
        assert!(tip_err.to_string().contains("rpc down"));
    }

    #[test]
    fn test_unconfirmed_names_reference() {
        let err = WalletError::Unconfirmed {
            reference: "0xabab".into(),
            reason: "timed out".into(),
        };
        assert!(err.to_string().contains("0xabab"));

        let err = SettlementError::OutcomeUnknown("0xabab".into());
        assert!(err.to_string().starts_with("Payment may have gone through"));
        assert!(err.to_string().contains("0xabab"));
    }

    // Critical: the currency id is visible when a quote is missing
    #[test]
    fn test_price_unavailable_names_currency() {
        let err = DomainError::PriceUnavailable("eth".into());
        assert!(err.to_string().contains("eth"));
    }
}
