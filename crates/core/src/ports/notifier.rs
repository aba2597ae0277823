//! Port trait for tip notifications.

use crate::models::TipEvent;

/// Real-time transport announcing sent tips to the room.
///
/// Fire-and-forget: the engine does not wait for or inspect delivery.
pub trait TipNotifier: Send + Sync {
    fn broadcast(&self, event: TipEvent);
}
