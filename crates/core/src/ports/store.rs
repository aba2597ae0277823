//! Port trait for tip bookkeeping.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::TipRecord;

/// Persistence for tip records.
///
/// A failure here is logged by the caller and never changes an execution
/// outcome: the on-chain payment has already happened.
#[async_trait]
pub trait TipRecordStore: Send + Sync {
    async fn save_tip_record(&self, record: &TipRecord) -> StorageResult<()>;
}
