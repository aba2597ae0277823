//! In-memory price, roster and record store adapters.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::StorageResult;
use crate::models::{RoleTag, TipRecord};
use crate::ports::{PriceSource, RosterResolver, TipRecordStore};

/// Fixed USD quotes keyed by currency id.
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace the quote for `currency_id`.
    pub fn set_price(&self, currency_id: impl Into<String>, price: Decimal) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(currency_id.into(), price);
    }
}

impl FromIterator<(String, Decimal)> for StaticPriceSource {
    fn from_iter<T: IntoIterator<Item = (String, Decimal)>>(iter: T) -> Self {
        Self {
            prices: RwLock::new(iter.into_iter().collect()),
        }
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn usd_price(&self, currency_id: &str) -> Option<Decimal> {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(currency_id)
            .copied()
    }
}

/// Mutable role -> addresses roster.
///
/// Reads always see the latest assignment, mirroring a live room.
#[derive(Debug, Default)]
pub struct StaticRoster {
    roles: RwLock<HashMap<RoleTag, Vec<String>>>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the holders of `role`.
    pub fn set_role(&self, role: RoleTag, addresses: Vec<String>) {
        self.roles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(role, addresses);
    }
}

impl FromIterator<(RoleTag, Vec<String>)> for StaticRoster {
    fn from_iter<T: IntoIterator<Item = (RoleTag, Vec<String>)>>(iter: T) -> Self {
        Self {
            roles: RwLock::new(iter.into_iter().collect()),
        }
    }
}

#[async_trait]
impl RosterResolver for StaticRoster {
    async fn resolve_role(&self, role: &RoleTag) -> Vec<String> {
        self.roles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(role)
            .cloned()
            .unwrap_or_default()
    }
}

/// Tip record store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryTipRecordStore {
    records: Mutex<Vec<TipRecord>>,
}

impl MemoryTipRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every saved record, oldest first.
    pub fn records(&self) -> Vec<TipRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TipRecordStore for MemoryTipRecordStore {
    async fn save_tip_record(&self, record: &TipRecord) -> StorageResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
