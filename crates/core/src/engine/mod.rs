//! Pure, synchronous stages of the tipping pipeline.
//!
//! - [`amount`] - USD to smallest-unit conversion and per-recipient share
//! - [`batcher`] - Order-preserving recipient chunking
//! - [`call_plan`] - Approval and distribution call construction
//!
//! Nothing here performs I/O; these are the unit boundaries for
//! property-based tests.

mod amount;
mod batcher;
mod call_plan;

pub use amount::*;
pub use batcher::*;
pub use call_plan::*;
