//! Ordered publish/subscribe for simulator events.
//!
//! Subscribers register per [`EventKind`] or for every event. `emit` invokes
//! them synchronously in registration order, kind-specific subscribers first.
//! Callbacks run while the simulator is borrowed, so they must not call back
//! into it.

use crate::events::{EventKind, Notification};
use std::collections::HashMap;

type Callback = Box<dyn Fn(&Notification) + Send>;

/// Returned by [`EventBus::on`] and [`EventBus::on_any`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: HashMap<EventKind, Vec<(SubscriptionId, Callback)>>,
    any: Vec<(SubscriptionId, Callback)>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let per_kind: usize = self.subscribers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("subscribers", &per_kind)
            .field("any", &self.any.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + 'static,
    {
        let id = self.allocate();
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    pub fn on_any<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + 'static,
    {
        let id = self.allocate();
        self.any.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.len();
        for subs in self.subscribers.values_mut() {
            subs.retain(|(sid, _)| *sid != id);
        }
        self.any.retain(|(sid, _)| *sid != id);
        self.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.values().map(Vec::len).sum::<usize>() + self.any.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self, notification: &Notification) {
        if let Some(subs) = self.subscribers.get(&notification.kind()) {
            for (_, cb) in subs {
                cb(notification);
            }
        }
        for (_, cb) in &self.any {
            cb(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use std::sync::{Arc, Mutex};

    fn note(event: Event) -> Notification {
        Notification {
            event,
            at_ms: 0,
            stream_timecode: None,
            rec_timecode: None,
        }
    }

    #[test]
    fn delivers_only_matching_kind_in_order() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        bus.on(EventKind::StreamStarted, move |_| s.lock().unwrap().push("first"));
        let s = Arc::clone(&seen);
        bus.on(EventKind::StreamStarted, move |_| s.lock().unwrap().push("second"));
        let s = Arc::clone(&seen);
        bus.on(EventKind::StreamStopped, move |_| s.lock().unwrap().push("stopped"));

        bus.emit(&note(Event::StreamStarted));

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn on_any_sees_everything_after_specific_subscribers() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        bus.on_any(move |n| s.lock().unwrap().push(format!("any:{:?}", n.kind())));
        let s = Arc::clone(&seen);
        bus.on(EventKind::RecordingPaused, move |_| s.lock().unwrap().push("paused".to_string()));

        bus.emit(&note(Event::RecordingPaused));
        bus.emit(&note(Event::RecordingResumed));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["paused", "any:RecordingPaused", "any:RecordingResumed"]
        );
    }

    #[test]
    fn off_removes_subscription() {
        let mut bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let id = bus.on(EventKind::ConnectionOpened, move |_| *c.lock().unwrap() += 1);

        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert!(bus.is_empty());
        bus.emit(&note(Event::ConnectionOpened));
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
