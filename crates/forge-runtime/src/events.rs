//! In-process publish-subscribe bus for engine events.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use forge_common::events::EngineEvent;

type Subscriber = Box<dyn Fn(&EngineEvent) + Send + Sync>;

/// Buffers every published event and fans it out to subscribers.
///
/// A panicking subscriber is isolated with `catch_unwind` so one broken
/// listener can't take the rest of the bus down with it.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    queue: Mutex<Vec<EngineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.subscribers.lock().expect("event bus lock poisoned").push(Box::new(callback));
    }

    pub fn publish(&self, event: EngineEvent) {
        self.queue.lock().expect("event bus lock poisoned").push(event.clone());

        let subscribers = self.subscribers.lock().expect("event bus lock poisoned");
        for callback in subscribers.iter() {
            let _ = panic::catch_unwind(AssertUnwindSafe(|| callback(&event)));
        }
    }

    /// Drain and return all buffered events since the last drain.
    pub fn drain(&self) -> Vec<EngineEvent> {
        let mut queue = self.queue.lock().expect("event bus lock poisoned");
        std::mem::take(&mut *queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_common::enums::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn publish_delivers_to_all_subscribers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c1 = counter.clone();
        let c2 = counter.clone();
        bus.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        bus.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(EngineEvent::new(EventKind::Created, "task", "t1", "created"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn a_panicking_subscriber_does_not_break_the_bus() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c2 = counter.clone();
        bus.subscribe(|_| panic!("subscriber exploded"));
        bus.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(EngineEvent::new(EventKind::Error, "task", "t1", "boom"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_empties_the_queue() {
        let bus = EventBus::new();
        bus.publish(EngineEvent::new(EventKind::Created, "task", "t1", "created"));
        bus.publish(EngineEvent::new(EventKind::Created, "task", "t2", "created"));

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert!(bus.drain().is_empty());
    }
}
