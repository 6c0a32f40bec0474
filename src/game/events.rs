use std::collections::VecDeque;

use crate::protocol::GameEvent;

/// Most events kept for [`EventBus::drain`]. Older ones are dropped first, so
/// an embedder that only subscribes never grows the queue past this.
pub const MAX_PENDING_EVENTS: usize = 1024;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&GameEvent) + Send>;

/// Synchronous observer list for outbound game events.
///
/// Listeners run in registration order on the emitting call stack. Every
/// event is also queued so a transport can drain a per-tick batch; the queue
/// holds at most [`MAX_PENDING_EVENTS`].
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
    pending: VecDeque<GameEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `true` if the listener was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: GameEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
        if self.pending.len() == MAX_PENDING_EVENTS {
            self.pending.pop_front();
        }
        self.pending.push_back(event);
    }

    /// Take every event still queued since the last drain, oldest first.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        self.pending.drain(..).collect()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn listeners_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let a = seen.clone();
        bus.subscribe(move |_| a.lock().unwrap().push("a"));
        let b = seen.clone();
        bus.subscribe(move |_| b.lock().unwrap().push("b"));

        bus.emit(GameEvent::CornChanged(1));
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let c = count.clone();
        let id = bus.subscribe(move |_| *c.lock().unwrap() += 1);

        bus.emit(GameEvent::CoinsChanged(5));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(GameEvent::CoinsChanged(6));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn drain_empties_the_queue() {
        let mut bus = EventBus::new();
        bus.emit(GameEvent::EggsChanged(2));
        bus.emit(GameEvent::EggsChanged(3));
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn undrained_queue_keeps_only_newest_events() {
        let mut bus = EventBus::new();
        let total = MAX_PENDING_EVENTS as u64 + 500;
        for n in 0..total {
            bus.emit(GameEvent::CoinsChanged(n));
        }
        let drained = bus.drain();
        assert_eq!(drained.len(), MAX_PENDING_EVENTS);
        assert_eq!(drained.first(), Some(&GameEvent::CoinsChanged(500)));
        assert_eq!(drained.last(), Some(&GameEvent::CoinsChanged(total - 1)));
    }
}
