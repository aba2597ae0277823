//! In-process adapters for the engine's ports.
//!
//! These back the CLI and the test suites. Production deployments plug
//! their own price feed, roster and transport in behind the same traits.

mod memory;
mod notifier;

pub use memory::{MemoryTipRecordStore, StaticPriceSource, StaticRoster};
pub use notifier::BroadcastNotifier;
