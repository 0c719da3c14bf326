//! Named-event publish/subscribe registry.
//!
//! Listeners are shared handles compared by pointer, so the handle passed to
//! [`EventBus::on`] is the one to keep for [`EventBus::off`].

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

/// An event that knows the name it is published under.
pub trait BusEvent {
    fn name(&self) -> &str;
}

/// A registered callback.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Wraps a closure into a [`Listener`] handle.
pub fn listener<E, F>(f: F) -> Listener<E>
where
    F: Fn(&E) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Errors from bus registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("event name must not be empty")]
    EmptyName,
}

/// Publish/subscribe registry keyed by event name.
///
/// Registering the same handle twice means it runs twice per emit. The
/// registry is never pruned on its own; owners unsubscribe with `off`.
pub struct EventBus<E> {
    listeners: Mutex<HashMap<String, Vec<Listener<E>>>>,
}

impl<E: BusEvent> EventBus<E> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Appends `listener` to the sequence registered under `name`.
    pub fn on(&self, name: &str, listener: Listener<E>) -> Result<(), BusError> {
        if name.is_empty() {
            return Err(BusError::EmptyName);
        }
        self.registry()
            .entry(name.to_string())
            .or_default()
            .push(listener);
        Ok(())
    }

    /// Removes the first registration of `listener` under `name`.
    ///
    /// Returns `false` when nothing matched; that is not an error.
    pub fn off(&self, name: &str, listener: &Listener<E>) -> bool {
        let mut registry = self.registry();
        let Some(list) = registry.get_mut(name) else {
            return false;
        };
        let Some(pos) = list.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            registry.remove(name);
        }
        true
    }

    /// Invokes every listener registered under the event's name, in
    /// registration order, before returning.
    ///
    /// The sequence is snapshotted first, so listeners may call `on`/`off`
    /// on this bus; such changes apply from the next emit. A panicking
    /// listener is logged and the remaining ones still run.
    pub fn emit(&self, event: E) {
        let name = event.name();
        let snapshot = match self.registry().get(name) {
            Some(list) => list.clone(),
            None => {
                trace!(event = name, "no listeners");
                return;
            }
        };

        for (index, listener) in snapshot.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(&event)));
            if outcome.is_err() {
                warn!(event = name, index, "listener panicked, continuing");
            }
        }
    }

    /// Returns how many registrations exist under `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.registry().get(name).map_or(0, Vec::len)
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener<E>>>> {
        // Listeners never run under this lock, so a poisoned guard still
        // holds a consistent map.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Ping(u32),
        Pong,
    }

    impl BusEvent for TestEvent {
        fn name(&self) -> &str {
            match self {
                TestEvent::Ping(_) => "ping",
                TestEvent::Pong => "pong",
            }
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, tag: &'static str) -> Listener<TestEvent> {
        let log = log.clone();
        listener(move |event: &TestEvent| {
            log.lock().unwrap().push(format!("{tag}:{event:?}"));
        })
    }

    #[test]
    fn emit_runs_listeners_in_registration_order() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        bus.on("ping", recorder(&log, "a")).unwrap();
        bus.on("ping", recorder(&log, "b")).unwrap();
        bus.on("pong", recorder(&log, "c")).unwrap();

        bus.emit(TestEvent::Ping(7));

        assert_eq!(*log.lock().unwrap(), vec!["a:Ping(7)", "b:Ping(7)"]);
    }

    #[test]
    fn duplicate_registration_runs_twice() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        let l = recorder(&log, "dup");
        bus.on("pong", l.clone()).unwrap();
        bus.on("pong", l.clone()).unwrap();

        bus.emit(TestEvent::Pong);
        assert_eq!(log.lock().unwrap().len(), 2);

        // off removes one registration at a time.
        assert!(bus.off("pong", &l));
        bus.emit(TestEvent::Pong);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn off_removes_only_the_matching_handle() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        let a = recorder(&log, "a");
        let b = recorder(&log, "b");
        bus.on("ping", a.clone()).unwrap();
        bus.on("ping", b.clone()).unwrap();

        assert!(bus.off("ping", &a));
        bus.emit(TestEvent::Ping(1));

        assert_eq!(*log.lock().unwrap(), vec!["b:Ping(1)"]);
        assert_eq!(bus.listener_count("ping"), 1);
    }

    #[test]
    fn off_unknown_is_noop() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let log: Log = Arc::default();
        let a = recorder(&log, "a");
        assert!(!bus.off("ping", &a));

        bus.on("pong", a.clone()).unwrap();
        let never_registered = recorder(&log, "x");
        assert!(!bus.off("pong", &never_registered));
        assert!(!bus.off("ping", &a));
        assert_eq!(bus.listener_count("pong"), 1);
    }

    #[test]
    fn emit_without_listeners_is_noop() {
        let bus: EventBus<TestEvent> = EventBus::new();
        bus.emit(TestEvent::Pong);
        assert_eq!(bus.listener_count("pong"), 0);
    }

    #[test]
    fn empty_name_is_rejected() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let log: Log = Arc::default();
        assert_eq!(bus.on("", recorder(&log, "a")), Err(BusError::EmptyName));
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let log: Log = Arc::default();
        bus.on("pong", recorder(&log, "before")).unwrap();
        bus.on("pong", listener(|_: &TestEvent| panic!("listener blew up")))
            .unwrap();
        bus.on("pong", recorder(&log, "after")).unwrap();

        bus.emit(TestEvent::Pong);

        assert_eq!(*log.lock().unwrap(), vec!["before:Pong", "after:Pong"]);
    }

    #[test]
    fn listener_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let log: Log = Arc::default();

        let bus_clone = bus.clone();
        let log_clone = log.clone();
        bus.on(
            "ping",
            listener(move |_: &TestEvent| {
                bus_clone.on("ping", recorder(&log_clone, "late")).unwrap();
            }),
        )
        .unwrap();

        // The late listener is registered but not invoked by this emit.
        bus.emit(TestEvent::Ping(1));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.listener_count("ping"), 2);

        bus.emit(TestEvent::Ping(2));
        assert_eq!(*log.lock().unwrap(), vec!["late:Ping(2)"]);
    }

    #[test]
    fn bus_is_shareable_across_threads() {
        let bus = Arc::new(EventBus::new());
        let log: Log = Arc::default();
        bus.on("ping", recorder(&log, "t")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let bus = bus.clone();
                std::thread::spawn(move || bus.emit(TestEvent::Ping(i)))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(log.lock().unwrap().len(), 4);
    }
}
