//! Recipient batching bounded by the distribution contract's call size.

use std::num::NonZeroUsize;

use alloy_primitives::{Address, U256};

use crate::models::Batch;

/// Default maximum recipients per distribution call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;

/// Maximum recipients per distribution call. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSize(NonZeroUsize);

impl BatchSize {
    /// Returns `None` for zero.
    pub fn new(size: usize) -> Option<Self> {
        NonZeroUsize::new(size).map(Self)
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self(NonZeroUsize::new(DEFAULT_MAX_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

/// Split recipients into ordered batches of at most `max_batch_size`.
///
/// Each batch carries `share * len` as its total, so the batch totals sum to
/// `share * recipients.len()` and no batch claims more than its portion.
pub fn split_into_batches(
    recipients: &[Address],
    max_batch_size: BatchSize,
    share: U256,
) -> Vec<Batch> {
    recipients
        .chunks(max_batch_size.get())
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            recipients: chunk.to_vec(),
            total: share * U256::from(chunk.len()),
        })
        .collect()
}
