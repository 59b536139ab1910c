//! Listener registry keyed by event category

use super::{DeviceEvent, EventCategory};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{error, warn};

/// A subscriber failed while handling an event
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ListenerError {
    #[error("Listener failed: {0}")]
    Failed(String),
    #[error("Listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    pub fn failed(message: impl Into<String>) -> Self {
        ListenerError::Failed(message.into())
    }
}

pub type ListenerResult = Result<(), ListenerError>;

/// Observer callback; identity is the `Arc` allocation
pub type Listener = Arc<dyn Fn(&DeviceEvent) -> ListenerResult + Send + Sync>;

/// Wrap a closure as a [`Listener`]
///
/// Keep the returned value around to be able to unsubscribe it later.
pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&DeviceEvent) -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Outcome of a single dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Ordered callbacks per category
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<EventCategory, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to `category`; duplicates are kept as separate entries
    pub fn subscribe(&self, category: EventCategory, listener: Listener) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.entry(category).or_default().push(listener);
    }

    /// Remove the first registration of `listener`; returns whether one was removed
    pub fn unsubscribe(&self, category: EventCategory, listener: &Listener) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = listeners.get_mut(&category) else {
            return false;
        };

        match entries.iter().position(|entry| Arc::ptr_eq(entry, listener)) {
            Some(index) => {
                entries.remove(index);
                if entries.is_empty() {
                    listeners.remove(&category);
                }
                true
            }
            None => false,
        }
    }

    /// Invoke every listener for the event's category in registration order
    ///
    /// Dispatch works on a snapshot, so listeners may subscribe or
    /// unsubscribe while being called. A listener that errors or panics is
    /// logged and skipped.
    pub fn publish(&self, event: &DeviceEvent) -> PublishReport {
        let category = event.category();
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            listeners.get(&category).cloned().unwrap_or_default()
        };

        let mut report = PublishReport::default();
        for (index, callback) in snapshot.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(event)))
                .unwrap_or_else(|panic| Err(ListenerError::Panicked(panic_message(panic.as_ref()))));

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err @ ListenerError::Failed(_)) => {
                    warn!(category = %category, index, error = %err, "Listener failed");
                    report.failed += 1;
                }
                Err(err @ ListenerError::Panicked(_)) => {
                    error!(category = %category, index, error = %err, "Listener panicked");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Drop every registration in every category
    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn listener_count(&self, category: EventCategory) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&category)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<EventCategory, usize> = listeners
            .iter()
            .map(|(category, entries)| (*category, entries.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ConnectionEvent;
    use crate::transport::ConnectionStatus;
    use std::sync::Mutex;

    fn connection_event() -> DeviceEvent {
        DeviceEvent::from(ConnectionEvent::new(ConnectionStatus::Connected))
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Listener {
        let log = log.clone();
        listener(move |_| {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_publish_in_registration_order() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(EventCategory::Connection, recording(&log, "first"));
        registry.subscribe(EventCategory::Connection, recording(&log, "second"));
        registry.subscribe(EventCategory::Connection, recording(&log, "third"));

        let report = registry.publish(&connection_event());

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(
            report,
            PublishReport {
                delivered: 3,
                failed: 0
            }
        );
    }

    #[test]
    fn test_publish_only_reaches_matching_category() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(EventCategory::Gps, recording(&log, "gps"));
        let report = registry.publish(&connection_event());

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(report, PublishReport::default());
    }

    #[test]
    fn test_failing_listener_does_not_stop_later_ones() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(EventCategory::Connection, recording(&log, "before"));
        registry.subscribe(
            EventCategory::Connection,
            listener(|_| Err(ListenerError::failed("display offline"))),
        );
        registry.subscribe(EventCategory::Connection, recording(&log, "after"));

        let report = registry.publish(&connection_event());

        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(
            EventCategory::Connection,
            listener(|_| panic!("listener exploded")),
        );
        registry.subscribe(EventCategory::Connection, recording(&log, "survivor"));

        let report = registry.publish(&connection_event());

        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_unsubscribe_unknown_listener_is_noop() {
        let registry = ListenerRegistry::new();
        let never_added = listener(|_| Ok(()));

        assert!(!registry.unsubscribe(EventCategory::Imu, &never_added));

        registry.subscribe(EventCategory::Imu, listener(|_| Ok(())));
        assert!(!registry.unsubscribe(EventCategory::Imu, &never_added));
        assert_eq!(registry.listener_count(EventCategory::Imu), 1);
    }

    #[test]
    fn test_duplicate_subscription_fires_twice_and_unsubscribes_once() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let callback = recording(&log, "dup");

        registry.subscribe(EventCategory::Connection, callback.clone());
        registry.subscribe(EventCategory::Connection, callback.clone());
        registry.publish(&connection_event());
        assert_eq!(log.lock().unwrap().len(), 2);

        assert!(registry.unsubscribe(EventCategory::Connection, &callback));
        assert_eq!(registry.listener_count(EventCategory::Connection), 1);

        registry.publish(&connection_event());
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_unsubscribe_matches_identity_not_behaviour() {
        let registry = ListenerRegistry::new();
        let a = listener(|_| Ok(()));
        let b = listener(|_| Ok(()));

        registry.subscribe(EventCategory::Tof, a.clone());
        registry.subscribe(EventCategory::Tof, b.clone());

        assert!(registry.unsubscribe(EventCategory::Tof, &b));
        assert!(!registry.unsubscribe(EventCategory::Tof, &b));
        assert_eq!(registry.listener_count(EventCategory::Tof), 1);
        assert!(registry.unsubscribe(EventCategory::Tof, &a));
        assert_eq!(registry.listener_count(EventCategory::Tof), 0);
    }

    #[test]
    fn test_listener_may_modify_registry_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = recording(&log, "late");

        let registry_in_callback = registry.clone();
        let late_in_callback = late.clone();
        registry.subscribe(
            EventCategory::Connection,
            listener(move |_| {
                registry_in_callback.subscribe(EventCategory::Connection, late_in_callback.clone());
                Ok(())
            }),
        );

        // Snapshot taken at dispatch start excludes the listener added mid-dispatch
        registry.publish(&connection_event());
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(registry.listener_count(EventCategory::Connection), 2);

        registry.publish(&connection_event());
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_clear_removes_everything() {
        let registry = ListenerRegistry::new();
        for category in EventCategory::ALL {
            registry.subscribe(category, listener(|_| Ok(())));
        }

        registry.clear();

        for category in EventCategory::ALL {
            assert_eq!(registry.listener_count(category), 0);
        }
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
