//! Port trait for USD price quotes.

use async_trait::async_trait;
use rust_decimal::Decimal;

/// Source of USD-per-unit quotes.
///
/// Quote retrieval lives outside the engine; implementations return `None`
/// when no usable quote exists and the engine reports `PriceUnavailable`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD price of one whole unit of `currency_id`.
    async fn usd_price(&self, currency_id: &str) -> Option<Decimal>;
}
