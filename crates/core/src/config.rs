//! Static engine configuration.
//!
//! Loaded once at startup. Anything wrong here is fatal: the engine refuses
//! to start rather than failing individual tips later.

use std::collections::HashSet;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::engine::{BatchSize, ContractAddresses, DEFAULT_MAX_BATCH_SIZE};
use crate::error::{DomainError, DomainResult, TipError, TipResult};
use crate::models::{Currency, CurrencyKind, PricingMode};

/// Largest decimal precision whose unit (`10^decimals`) fits in 256 bits.
pub const MAX_DECIMALS: u8 = 77;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum recipients per distribution call.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Tip distribution contract.
    pub distribution_contract: Address,
    /// Tippable currencies.
    pub currencies: Vec<Currency>,
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

impl EngineConfig {
    /// Check every static invariant and return the validated batch size.
    pub fn validate(&self) -> TipResult<BatchSize> {
        let batch_size = BatchSize::new(self.max_batch_size).ok_or_else(|| {
            TipError::ConfigError("max_batch_size must be a positive integer".into())
        })?;

        if self.distribution_contract.is_zero() {
            return Err(TipError::ConfigError(
                "distribution_contract must not be the zero address".into(),
            ));
        }

        let mut ids = HashSet::new();
        for currency in &self.currencies {
            if !ids.insert(currency.id.as_str()) {
                return Err(TipError::ConfigError(format!(
                    "duplicate currency id '{}'",
                    currency.id
                )));
            }
            if currency.decimals > MAX_DECIMALS {
                return Err(TipError::ConfigError(format!(
                    "currency '{}' has {} decimals, maximum is {}",
                    currency.id, currency.decimals, MAX_DECIMALS
                )));
            }
            match currency.kind {
                CurrencyKind::Native if currency.pricing == PricingMode::UsdPegged => {
                    return Err(TipError::ConfigError(format!(
                        "native currency '{}' cannot be usd_pegged",
                        currency.id
                    )));
                }
                CurrencyKind::Token { contract } if contract.is_zero() => {
                    return Err(TipError::ConfigError(format!(
                        "token '{}' has a zero contract address",
                        currency.id
                    )));
                }
                _ => {}
            }
        }

        Ok(batch_size)
    }

    /// Look up a configured currency.
    pub fn currency(&self, id: &str) -> DomainResult<&Currency> {
        self.currencies
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DomainError::UnknownCurrency(id.to_string()))
    }

    pub fn contracts(&self) -> ContractAddresses {
        ContractAddresses {
            distribution: self.distribution_contract,
        }
    }
}
