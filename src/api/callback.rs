//! Listener registry for navigation events
//!
//! Listeners are notified synchronously on the thread that produced the
//! event. Delivery iterates over a snapshot of the registry, so listeners may
//! register or unregister (themselves included) from inside a callback. A
//! panicking listener is logged and skipped; the remaining listeners still
//! receive the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::warn;

use crate::api::types::{NavError, NavigationEvent};
use crate::core::{PathPoint, Point};

/// Observer of navigation progress. Every method defaults to a no-op.
pub trait NavigationListener: Send + Sync {
    fn on_location_changed(&self, _old: Option<&Point>, _new: &Point) {}

    /// `is_from_progression` is false when the objective was moved manually
    fn on_navigation_objective_changed(&self, _index: usize, _objective: &PathPoint, _is_from_progression: bool) {}

    /// Fired once per off-route episode
    fn on_off_route(&self) {}

    fn on_returned_to_route(&self) {}

    fn on_trigger_entered(&self, _index: usize, _waypoint: &PathPoint, _trigger_id: u32) {}

    /// The agent entered the bubble radius of a waypoint
    fn on_arrived_at_point(&self, _index: usize, _waypoint: &PathPoint) {}

    /// The agent passed a waypoint it had arrived at
    fn on_departed_point(&self, _index: usize, _waypoint: &PathPoint) {}

    fn on_gps_status_changed(&self, _found: bool) {}

    /// The path could not be indexed; no further progress will be reported
    fn on_navigation_failed(&self, _error: &NavError) {}
}

/// Adapts a closure over owned [`NavigationEvent`]s into a listener
pub struct EventCallback<F>(pub F);

impl<F> EventCallback<F>
where
    F: Fn(NavigationEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        EventCallback(callback)
    }
}

impl<F> NavigationListener for EventCallback<F>
where
    F: Fn(NavigationEvent) + Send + Sync,
{
    fn on_location_changed(&self, old: Option<&Point>, new: &Point) {
        (self.0)(NavigationEvent::LocationChanged {
            old: old.copied(),
            new: *new,
        });
    }

    fn on_navigation_objective_changed(&self, index: usize, objective: &PathPoint, is_from_progression: bool) {
        (self.0)(NavigationEvent::ObjectiveChanged {
            index,
            waypoint: objective.clone(),
            is_from_progression,
        });
    }

    fn on_off_route(&self) {
        (self.0)(NavigationEvent::OffRoute);
    }

    fn on_returned_to_route(&self) {
        (self.0)(NavigationEvent::ReturnedToRoute);
    }

    fn on_trigger_entered(&self, index: usize, waypoint: &PathPoint, trigger_id: u32) {
        (self.0)(NavigationEvent::TriggerEntered {
            index,
            waypoint: waypoint.clone(),
            trigger_id,
        });
    }

    fn on_arrived_at_point(&self, index: usize, waypoint: &PathPoint) {
        (self.0)(NavigationEvent::ArrivedAtPoint {
            index,
            waypoint: waypoint.clone(),
        });
    }

    fn on_departed_point(&self, index: usize, waypoint: &PathPoint) {
        (self.0)(NavigationEvent::DepartedPoint {
            index,
            waypoint: waypoint.clone(),
        });
    }

    fn on_gps_status_changed(&self, found: bool) {
        (self.0)(NavigationEvent::GpsStatusChanged { found });
    }

    fn on_navigation_failed(&self, error: &NavError) {
        (self.0)(NavigationEvent::NavigationFailed {
            reason: error.to_string(),
        });
    }
}

/// Listener registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

type Entry = (ListenerHandle, Arc<dyn NavigationListener>);

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    listeners: RwLock<Vec<Entry>>,
}

/// Thread-safe observer set. Clones share the same registrations.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn NavigationListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.write().push((handle, listener));
        handle
    }

    /// Returns false when the handle was not registered
    pub fn unregister(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|(h, _)| *h != handle);
        listeners.len() != before
    }

    pub fn is_registered(&self, handle: ListenerHandle) -> bool {
        self.read().iter().any(|(h, _)| *h == handle)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Deliver an event to every listener registered at the time of the call
    /// that is still registered when its turn comes.
    pub fn dispatch(&self, event: &NavigationEvent) {
        let snapshot: Vec<Entry> = self.read().clone();
        for (handle, listener) in snapshot {
            if !self.is_registered(handle) {
                continue;
            }
            let delivered = catch_unwind(AssertUnwindSafe(|| deliver(listener.as_ref(), event)));
            if delivered.is_err() {
                warn!(
                    "Listener {} panicked while handling {}, continuing with remaining listeners",
                    handle.id(),
                    event.kind()
                );
            }
        }
    }

    /// Listeners registered right now
    pub fn snapshot(&self) -> ListenerSnapshot {
        ListenerSnapshot(self.read().clone())
    }

    /// Deliver a terminal build error to a single listener
    pub fn notify_failure_to(&self, handle: ListenerHandle, error: &NavError) {
        let listener = self.read().iter().find(|(h, _)| *h == handle).map(|(_, l)| Arc::clone(l));
        if let Some(listener) = listener {
            deliver_failure(handle, listener.as_ref(), error);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Entry>> {
        self.inner.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Entry>> {
        self.inner.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Listeners captured at one instant, see [`ListenerRegistry::snapshot`]
pub struct ListenerSnapshot(Vec<Entry>);

impl ListenerSnapshot {
    /// Deliver a terminal build error
    pub fn notify_failure(&self, error: &NavError) {
        for (handle, listener) in &self.0 {
            deliver_failure(*handle, listener.as_ref(), error);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn deliver_failure(handle: ListenerHandle, listener: &dyn NavigationListener, error: &NavError) {
    if catch_unwind(AssertUnwindSafe(|| listener.on_navigation_failed(error))).is_err() {
        warn!("Listener {} panicked while handling navigation failure", handle.id());
    }
}

fn deliver(listener: &dyn NavigationListener, event: &NavigationEvent) {
    match event {
        NavigationEvent::LocationChanged { old, new } => listener.on_location_changed(old.as_ref(), new),
        NavigationEvent::ObjectiveChanged {
            index,
            waypoint,
            is_from_progression,
        } => listener.on_navigation_objective_changed(*index, waypoint, *is_from_progression),
        NavigationEvent::OffRoute => listener.on_off_route(),
        NavigationEvent::ReturnedToRoute => listener.on_returned_to_route(),
        NavigationEvent::TriggerEntered {
            index,
            waypoint,
            trigger_id,
        } => listener.on_trigger_entered(*index, waypoint, *trigger_id),
        NavigationEvent::ArrivedAtPoint { index, waypoint } => listener.on_arrived_at_point(*index, waypoint),
        NavigationEvent::DepartedPoint { index, waypoint } => listener.on_departed_point(*index, waypoint),
        NavigationEvent::GpsStatusChanged { found } => listener.on_gps_status_changed(*found),
        NavigationEvent::NavigationFailed { reason } => listener.on_navigation_failed(&NavError::BuildFailed {
            reason: reason.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<NavigationEvent>>>, Arc<dyn NavigationListener>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: Arc<dyn NavigationListener> = Arc::new(EventCallback::new(move |e| sink.lock().unwrap().push(e)));
        (events, listener)
    }

    struct Panicker;

    impl NavigationListener for Panicker {
        fn on_off_route(&self) {
            panic!("listener failure");
        }
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = ListenerRegistry::new();
        let (_, listener) = recorder();
        let handle = registry.register(listener);
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(handle));
        assert!(!registry.unregister(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let registry = ListenerRegistry::new();
        let (events, listener) = recorder();
        registry.register(Arc::new(Panicker));
        registry.register(listener);

        registry.dispatch(&NavigationEvent::OffRoute);
        assert_eq!(*events.lock().unwrap(), vec![NavigationEvent::OffRoute]);
    }

    struct SelfRemoving {
        registry: ListenerRegistry,
        handle: Mutex<Option<ListenerHandle>>,
        calls: AtomicU64,
    }

    impl NavigationListener for SelfRemoving {
        fn on_gps_status_changed(&self, _found: bool) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = self.handle.lock().unwrap().take() {
                self.registry.unregister(handle);
            }
        }
    }

    #[test]
    fn test_listener_can_unregister_itself_during_dispatch() {
        let registry = ListenerRegistry::new();
        let remover = Arc::new(SelfRemoving {
            registry: registry.clone(),
            handle: Mutex::new(None),
            calls: AtomicU64::new(0),
        });
        let handle = registry.register(remover.clone());
        *remover.handle.lock().unwrap() = Some(handle);
        let (events, listener) = recorder();
        registry.register(listener);

        registry.dispatch(&NavigationEvent::GpsStatusChanged { found: true });
        registry.dispatch(&NavigationEvent::GpsStatusChanged { found: false });

        assert_eq!(remover.calls.load(Ordering::SeqCst), 1);
        assert_eq!(events.lock().unwrap().len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_event_callback_maps_every_method() {
        let (events, listener) = recorder();
        let waypoint = PathPoint::waypoint("w", Point::new(1.0, 2.0));
        listener.on_arrived_at_point(3, &waypoint);
        listener.on_trigger_entered(3, &waypoint, 9);
        listener.on_navigation_objective_changed(3, &waypoint, false);

        let events = events.lock().unwrap();
        assert_eq!(
            events[0],
            NavigationEvent::ArrivedAtPoint {
                index: 3,
                waypoint: waypoint.clone()
            }
        );
        assert!(matches!(events[1], NavigationEvent::TriggerEntered { trigger_id: 9, .. }));
        assert!(matches!(
            events[2],
            NavigationEvent::ObjectiveChanged {
                is_from_progression: false,
                ..
            }
        ));
    }
}
