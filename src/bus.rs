//! In-process typed publish/subscribe registry.
//!
//! [`EventBus`] fans out events synchronously to callbacks registered per
//! topic. Delivery order equals registration order, and each `emit` iterates
//! over a point-in-time snapshot of the listener list, so callbacks that
//! register or unregister during dispatch only affect future emits.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::error;

/// Event families routable by the bus.
///
/// An event maps itself to a topic; listeners register per topic and receive
/// a shared reference to every event emitted under it.
pub trait Event: Send + Sync + 'static {
    /// Topic key used to group listeners.
    type Topic: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Returns the topic this event is delivered under.
    fn topic(&self) -> Self::Topic;
}

/// Stable identity of one listener registration.
///
/// Registering the same callback twice yields two distinct ids; unregistering
/// an id that is not present is a no-op.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

struct Listener<E> {
    id: ListenerId,
    callback: Arc<dyn Fn(&E) + Send + Sync>,
}

impl<E> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Synchronous fan-out registry keyed by topic.
pub struct EventBus<E: Event> {
    listeners: RwLock<HashMap<E::Topic, Vec<Listener<E>>>>,
    next_id: AtomicU64,
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventBus<E> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a callback under a topic and returns its stable id.
    ///
    /// Listeners are delivered in registration order. The same callback may
    /// be registered more than once; each registration is independent.
    pub fn register(
        &self,
        topic: E::Topic,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.entry(topic).or_default().push(Listener {
                id,
                callback: Arc::new(callback),
            });
        }
        id
    }

    /// Removes a registration. Unknown ids are ignored.
    pub fn unregister(&self, topic: E::Topic, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.write() {
            if let Some(entries) = listeners.get_mut(&topic) {
                entries.retain(|listener| listener.id != id);
                if entries.is_empty() {
                    listeners.remove(&topic);
                }
            }
        }
    }

    /// Delivers an event to every listener registered under its topic.
    ///
    /// The listener list is snapshotted before iteration, so mutations made
    /// by callbacks take effect only for later emits. A panicking callback is
    /// caught and logged; delivery continues with the remaining listeners.
    pub fn emit(&self, event: E) {
        let snapshot: Vec<Listener<E>> = match self.listeners.read() {
            Ok(listeners) => listeners
                .get(&event.topic())
                .map(|entries| entries.to_vec())
                .unwrap_or_default(),
            Err(_) => return,
        };

        for listener in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| (listener.callback)(&event)));
            if outcome.is_err() {
                error!(
                    topic = ?event.topic(),
                    listener_id = ?listener.id,
                    "event listener panicked; continuing delivery"
                );
            }
        }
    }

    /// Number of listeners currently registered under a topic.
    pub fn listener_count(&self, topic: E::Topic) -> usize {
        self.listeners
            .read()
            .map(|listeners| listeners.get(&topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Registers a callback and returns a guard that unregisters it on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        topic: E::Topic,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription<E> {
        let id = self.register(topic, callback);
        Subscription {
            bus: Arc::clone(self),
            topic,
            id,
        }
    }
}

/// RAII handle for one bus registration.
///
/// Dropping the subscription releases the registration exactly once; the
/// listener stops receiving events from the next emit onward.
pub struct Subscription<E: Event> {
    bus: Arc<EventBus<E>>,
    topic: E::Topic,
    id: ListenerId,
}

impl<E: Event> Subscription<E> {
    /// Id of the underlying registration.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<E: Event> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.bus.unregister(self.topic, self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{Event, EventBus};

    #[derive(Clone, Debug, PartialEq)]
    enum TestEvent {
        Reading(u64),
        Note(String),
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    enum TestTopic {
        Reading,
        Note,
    }

    impl Event for TestEvent {
        type Topic = TestTopic;

        fn topic(&self) -> TestTopic {
            match self {
                TestEvent::Reading(_) => TestTopic::Reading,
                TestEvent::Note(_) => TestTopic::Note,
            }
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.register(TestTopic::Reading, move |_: &TestEvent| {
                seen.lock().expect("lock").push(label);
            });
        }

        bus.emit(TestEvent::Reading(7));
        assert_eq!(*seen.lock().expect("lock"), vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicate_registration_delivers_twice() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            bus.register(TestTopic::Reading, move |_: &TestEvent| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(TestEvent::Reading(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unregister_unknown_id_is_noop() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let id = bus.register(TestTopic::Note, |_| {});
        bus.unregister(TestTopic::Note, id);
        // Second removal of the same id and removal under a topic with no
        // listeners must both be silent no-ops.
        bus.unregister(TestTopic::Note, id);
        bus.unregister(TestTopic::Reading, id);
        assert_eq!(bus.listener_count(TestTopic::Note), 0);
    }

    #[test]
    fn emit_snapshots_listeners_before_dispatch() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicUsize::new(0));

        // The first listener unregisters itself mid-dispatch; the current
        // emit must still reach both it and the listener after it.
        let self_removing = Arc::new(Mutex::new(None));
        let id = bus.register(TestTopic::Reading, {
            let bus = Arc::clone(&bus);
            let calls = Arc::clone(&calls);
            let self_removing = Arc::clone(&self_removing);
            move |_: &TestEvent| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = self_removing.lock().expect("lock").take() {
                    bus.unregister(TestTopic::Reading, id);
                }
            }
        });
        *self_removing.lock().expect("lock") = Some(id);

        let calls_after = Arc::clone(&calls);
        bus.register(TestTopic::Reading, move |_: &TestEvent| {
            calls_after.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(TestEvent::Reading(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The self-removed listener is gone for the next emit.
        bus.emit(TestEvent::Reading(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_listener_does_not_block_later_listeners() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicUsize::new(0));

        bus.register(TestTopic::Note, |_: &TestEvent| {
            panic!("listener failure");
        });
        let reached_inner = Arc::clone(&reached);
        bus.register(TestTopic::Note, move |_: &TestEvent| {
            reached_inner.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(TestEvent::Note("hello".to_string()));
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_guard_unregisters_on_drop() {
        let bus = Arc::new(EventBus::new());
        assert_eq!(bus.listener_count(TestTopic::Reading), 0);

        let subscription = bus.subscribe(TestTopic::Reading, |_: &TestEvent| {});
        assert_eq!(bus.listener_count(TestTopic::Reading), 1);

        drop(subscription);
        assert_eq!(bus.listener_count(TestTopic::Reading), 0);
    }

    #[test]
    fn topics_are_isolated() {
        let bus = EventBus::new();
        let readings = Arc::new(AtomicUsize::new(0));

        let readings_inner = Arc::clone(&readings);
        bus.register(TestTopic::Reading, move |_: &TestEvent| {
            readings_inner.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(TestEvent::Note("ignored".to_string()));
        assert_eq!(readings.load(Ordering::SeqCst), 0);

        bus.emit(TestEvent::Reading(3));
        assert_eq!(readings.load(Ordering::SeqCst), 1);
    }
}
