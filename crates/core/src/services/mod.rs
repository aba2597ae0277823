//! Business logic services.

mod reconciliation;
mod tipping;

pub use reconciliation::{ReconciliationHandler, ReconciliationOutcome};
pub use tipping::{PreparedTip, TipReceipt, TipService};
