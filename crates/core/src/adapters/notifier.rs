//! Tip notifications over a tokio broadcast channel.

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::models::TipEvent;
use crate::ports::TipNotifier;

/// Fans tip events out to every live subscriber.
///
/// Slow subscribers lag and lose old events; the sender never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<TipEvent>,
}

impl BroadcastNotifier {
    /// Create a notifier buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TipEvent> {
        self.tx.subscribe()
    }
}

impl TipNotifier for BroadcastNotifier {
    fn broadcast(&self, event: TipEvent) {
        match self.tx.send(event) {
            Ok(receivers) => trace!(receivers, "Tip event broadcast"),
            Err(_) => debug!("Tip event dropped, no subscribers"),
        }
    }
}
