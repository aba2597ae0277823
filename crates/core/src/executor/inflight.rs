//! Per-payer single-flight tracking.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::error::{TipError, TipResult};
use crate::models::PayerId;

/// Set of payers with a submission currently in SUBMITTING.
///
/// This is the only shared mutable state in the engine.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    payers: Arc<Mutex<HashSet<PayerId>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `payer` as in flight.
    ///
    /// Rejects synchronously if the payer already has a submission running;
    /// requests are never queued. The flag is cleared when the returned
    /// guard is dropped, on every exit path.
    pub fn try_acquire(&self, payer: &PayerId) -> TipResult<InFlightGuard> {
        let mut payers = self.payers.lock().unwrap_or_else(PoisonError::into_inner);
        if !payers.insert(payer.clone()) {
            return Err(TipError::SubmissionInFlight(payer.to_string()));
        }
        trace!(payer = %payer, "In-flight flag set");
        Ok(InFlightGuard {
            payers: self.payers.clone(),
            payer: payer.clone(),
        })
    }

    /// Whether `payer` currently has a submission running.
    pub fn is_in_flight(&self, payer: &PayerId) -> bool {
        self.payers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(payer)
    }
}

/// Clears the payer's in-flight flag on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    payers: Arc<Mutex<HashSet<PayerId>>>,
    payer: PayerId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.payers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.payer);
        trace!(payer = %self.payer, "In-flight flag cleared");
    }
}
