//! Broadcast event bus for distributing `RunEvent` to live reporters.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no active subscribers
//! is a no-op; slow subscribers observe `Lagged` rather than blocking runs.

use interlock_types::event::RunEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus for run events.
///
/// Cloning the bus clones the sender, so the orchestrator, the dispatcher
/// and any reporter share one channel.
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    /// Publish to all current subscribers.
    pub fn publish(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
