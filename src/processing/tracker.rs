//! Location-driven progress tracking along an indexed path
//!
//! A [`ProgressTracker`] owns one navigation session. The path is indexed on a
//! background thread; until that finishes, fixes are recorded and reported
//! but nothing else is computed. Every tick runs under a single tick lock, so
//! listener notifications for one fix are never interleaved with another's.
//!
//! Lock order is tick, then state, then index slot. Listeners are called with
//! only the tick lock held, so they may freely query the tracker. The tick
//! lock is not reentrant: a listener must not call `set_location`,
//! `set_gps_status` or `move_objective_*` on the tracker that notified it, as
//! that deadlocks. Feed such calls through a [`crate::TrackerActor`] instead.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::algorithms::geodesy::great_circle_distance;
use crate::algorithms::path_index::PathIndex;
use crate::api::callback::{ListenerHandle, ListenerRegistry, NavigationListener};
use crate::api::types::{NavError, NavResult, NavigationEvent, Objective, TrackerState};
use crate::core::{Cue, Path, PathPoint, Point, OFF_ROUTE_MOVEMENT_FACTOR};
use crate::processing::debounce::DeferredTask;
use crate::processing::progress::ProgressState;
use crate::utils::config::TrackerConfig;

enum IndexSlot {
    Pending,
    Ready(Arc<PathIndex>),
    Failed(NavError),
    Disposed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TrackerInner {
    path: Path,
    config: RwLock<TrackerConfig>,
    slot: Mutex<IndexSlot>,
    slot_changed: Condvar,
    tick: Mutex<()>,
    state: Mutex<ProgressState>,
    listeners: ListenerRegistry,
    off_route_timer: DeferredTask,
}

/// Progress tracker for one navigation session. Clones share the session.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<TrackerInner>,
}

impl ProgressTracker {
    /// Start a session, indexing the path on a background thread
    pub fn new(path: Path, config: TrackerConfig) -> NavResult<Self> {
        let tracker = Self::with_slot(path, config, IndexSlot::Pending)?;
        let inner = Arc::clone(&tracker.inner);
        thread::Builder::new()
            .name("route-index".to_string())
            .spawn(move || {
                let compression = inner.config().compression;
                let result = PathIndex::build(&inner.path, &compression);
                inner.finish_build(result);
            })
            .map_err(|e| NavError::BuildFailed {
                reason: format!("could not start index worker: {}", e),
            })?;
        Ok(tracker)
    }

    /// Start a session, indexing the path on the calling thread
    pub fn new_blocking(path: Path, config: TrackerConfig) -> NavResult<Self> {
        config.validate()?;
        let index = PathIndex::build(&path, &config.compression)?;
        Self::with_slot(path, config, IndexSlot::Ready(Arc::new(index)))
    }

    fn with_slot(path: Path, config: TrackerConfig, slot: IndexSlot) -> NavResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(TrackerInner {
                path,
                config: RwLock::new(config),
                slot: Mutex::new(slot),
                slot_changed: Condvar::new(),
                tick: Mutex::new(()),
                state: Mutex::new(ProgressState::new()),
                listeners: ListenerRegistry::new(),
                off_route_timer: DeferredTask::new("route-off-route-timer"),
            }),
        })
    }

    /// Feed one location fix. Calls are serialized; never call this from a listener.
    ///
    /// A fix with non-finite or out-of-range coordinates is dropped before
    /// the tick: it is not recorded and produces no `LocationChanged`.
    pub fn set_location(&self, location: Point) {
        if !location.is_valid() {
            warn!("Ignoring invalid location fix {:?}", location);
            return;
        }
        let _tick = lock(&self.inner.tick);
        let events = {
            let mut state = lock(&self.inner.state);
            self.inner.process(&mut state, location)
        };
        self.inner.deliver(events);
    }

    /// Report a change in positioning availability. Takes the tick lock; never
    /// call this from a listener.
    pub fn set_gps_status(&self, found: bool) {
        let _tick = lock(&self.inner.tick);
        if matches!(*lock(&self.inner.slot), IndexSlot::Disposed) {
            return;
        }
        self.inner.listeners.dispatch(&NavigationEvent::GpsStatusChanged { found });
    }

    /// Step the objective to the next waypoint not yet departed. Takes the
    /// tick lock; never call this from a listener.
    pub fn move_objective_forward(&self) -> Option<usize> {
        self.move_objective(|inner, state| {
            inner.open_waypoint_after(state, state.objective())
        })
    }

    /// Step the objective to the previous waypoint not yet departed. Takes
    /// the tick lock; never call this from a listener.
    pub fn move_objective_backward(&self) -> Option<usize> {
        self.move_objective(|inner, state| {
            let from = state.objective().unwrap_or(inner.path.len());
            inner.open_waypoint_before(state, from)
        })
    }

    fn move_objective<F>(&self, select: F) -> Option<usize>
    where
        F: FnOnce(&TrackerInner, &ProgressState) -> Option<usize>,
    {
        let _tick = lock(&self.inner.tick);
        if matches!(*lock(&self.inner.slot), IndexSlot::Disposed) {
            return None;
        }
        let mut events = Vec::new();
        let target = {
            let mut state = lock(&self.inner.state);
            let target = select(&*self.inner, &*state);
            if let Some(index) = target {
                self.inner.change_objective(&mut state, Some(index), false, &mut events);
            }
            target
        };
        self.inner.deliver(events);
        target
    }

    pub fn add_listener(&self, listener: Arc<dyn NavigationListener>) -> ListenerHandle {
        let slot = lock(&self.inner.slot);
        let handle = self.inner.listeners.register(listener);
        let failure = match &*slot {
            IndexSlot::Failed(err) => Some(err.clone()),
            _ => None,
        };
        drop(slot);

        // Late listeners still learn about a failed build, exactly once
        if let Some(err) = failure {
            self.inner.listeners.notify_failure_to(handle, &err);
        }
        handle
    }

    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        self.inner.listeners.unregister(handle)
    }

    /// Shared registry, usable from inside a callback to unregister
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    /// End the session. Later ticks and queries see neutral values.
    pub fn dispose(&self) {
        {
            let mut slot = lock(&self.inner.slot);
            if matches!(*slot, IndexSlot::Disposed) {
                return;
            }
            *slot = IndexSlot::Disposed;
        }
        self.inner.slot_changed.notify_all();
        self.inner.off_route_timer.cancel();
        lock(&self.inner.state).cancel_deferred_off_route();
        self.inner.listeners.clear();
        info!("Navigation session disposed");
    }

    pub fn state(&self) -> TrackerState {
        match &*lock(&self.inner.slot) {
            IndexSlot::Pending => TrackerState::Initializing,
            IndexSlot::Ready(_) => TrackerState::Ready,
            IndexSlot::Failed(err) => TrackerState::Failed(err.clone()),
            IndexSlot::Disposed => TrackerState::Disposed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Block until the index is built, the build fails, or `timeout` passes
    pub fn wait_until_ready(&self, timeout: Duration) -> NavResult<()> {
        let deadline = Instant::now() + timeout;
        let mut slot = lock(&self.inner.slot);
        loop {
            match &*slot {
                IndexSlot::Ready(_) => return Ok(()),
                IndexSlot::Failed(err) => return Err(err.clone()),
                IndexSlot::Disposed => return Err(NavError::Disposed),
                IndexSlot::Pending => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(NavError::NotReady);
            }
            slot = self
                .inner
                .slot_changed
                .wait_timeout(slot, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The built index, if ready
    pub fn path_index(&self) -> Option<Arc<PathIndex>> {
        self.inner.ready_index()
    }

    pub fn config(&self) -> TrackerConfig {
        self.inner.config()
    }

    /// Update the arrival radius, returning the previous value. Applies from the next tick.
    pub fn set_bubble_radius(&self, radius_m: f64) -> NavResult<f64> {
        Ok(self.inner.config_mut().set_bubble_radius(radius_m)?)
    }

    /// Update the off-route threshold, returning the previous value. Applies from the next tick.
    pub fn set_off_route_bubble_radius(&self, radius_m: f64) -> NavResult<f64> {
        Ok(self.inner.config_mut().set_off_route_bubble_radius(radius_m)?)
    }

    pub fn set_off_route_event_delay(&self, delay: Duration) -> Duration {
        Duration::from_millis(self.inner.config_mut().set_off_route_event_delay(delay))
    }

    pub fn objective(&self) -> Option<Objective> {
        let index = lock(&self.inner.state).objective()?;
        let point = self.inner.path.get(index)?.clone();
        Some(Objective { index, point })
    }

    pub fn location(&self) -> Option<Point> {
        lock(&self.inner.state).location()
    }

    pub fn is_off_route(&self) -> bool {
        lock(&self.inner.state).is_off_route()
    }

    pub fn has_arrived_at(&self, index: usize) -> bool {
        lock(&self.inner.state).has_arrived(index)
    }

    pub fn has_departed(&self, index: usize) -> bool {
        lock(&self.inner.state).has_departed(index)
    }

    pub fn has_entered_trigger(&self, index: usize, trigger_id: u32) -> bool {
        lock(&self.inner.state).has_fired(index, trigger_id)
    }

    /// Waypoints departed so far, in path order
    pub fn departed(&self) -> Vec<usize> {
        lock(&self.inner.state).departed().collect()
    }

    /// Next waypoint after `index` in path order
    pub fn objective_after(&self, index: usize) -> Option<usize> {
        self.inner.path.waypoint_after(Some(index))
    }

    /// Previous waypoint before `index` in path order
    pub fn objective_before(&self, index: usize) -> Option<usize> {
        self.inner.path.waypoint_before(index)
    }

    pub fn cue_for(&self, index: usize) -> Option<Cue> {
        self.inner.path.get(index).and_then(PathPoint::cue).cloned()
    }

    /// True once the final waypoint has been departed and no objective remains
    pub fn is_route_complete(&self) -> bool {
        let Some(index) = self.inner.ready_index() else {
            return false;
        };
        let state = lock(&self.inner.state);
        state.is_objective_initialized()
            && state.objective().is_none()
            && index.waypoints().last().is_some_and(|w| state.has_departed(w.path_index))
    }

    /// Whether `point` falls inside any trigger window
    pub fn is_point_within_trigger(&self, point: &Point) -> bool {
        self.trigger_at(point).is_some()
    }

    /// Whether `point` falls inside a trigger window of waypoint `index`
    pub fn is_point_within_item_trigger(&self, point: &Point, index: usize) -> bool {
        self.trigger_at(point).is_some_and(|(waypoint, _)| waypoint == index)
    }

    fn trigger_at(&self, point: &Point) -> Option<(usize, u32)> {
        let index = self.inner.ready_index()?;
        match index.locate_along_path(point) {
            Ok(fraction) => index.find_trigger_window(fraction),
            Err(err) => {
                debug!("Trigger lookup failed: {}", err);
                None
            }
        }
    }

    /// First waypoint ahead of `point` that owns a trigger window
    pub fn next_point_with_trigger(&self, point: &Point) -> Option<usize> {
        let index = self.inner.ready_index()?;
        let fraction = index.locate_along_path(point).ok()?;
        index.next_waypoint_with_trigger_after(fraction)
    }

    /// Path length between the projections of two points, 0 when unavailable
    pub fn distance_between(&self, a: &Point, b: &Point) -> f64 {
        self.inner
            .ready_index()
            .and_then(|index| index.distance_between_along_path(a, b).ok())
            .unwrap_or(0.0)
    }

    /// Distance from `point` to the path, `f64::MAX` when unavailable
    pub fn distance_from_route(&self, point: &Point) -> f64 {
        self.inner
            .ready_index()
            .and_then(|index| index.distance_from_path(point).ok())
            .unwrap_or(f64::MAX)
    }

    /// Path geometry from `before_m` behind to `after_m` ahead of `point`, empty when unavailable
    pub fn surrounding_geometry(&self, point: &Point, before_m: f64, after_m: f64) -> Vec<Point> {
        self.inner
            .ready_index()
            .and_then(|index| index.section_geometry(point, before_m, after_m).ok())
            .unwrap_or_default()
    }
}

impl TrackerInner {
    fn config(&self) -> TrackerConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn config_mut(&self) -> std::sync::RwLockWriteGuard<'_, TrackerConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready_index(&self) -> Option<Arc<PathIndex>> {
        match &*lock(&self.slot) {
            IndexSlot::Ready(index) => Some(Arc::clone(index)),
            _ => None,
        }
    }

    fn deliver(&self, events: Vec<NavigationEvent>) {
        for event in &events {
            self.listeners.dispatch(event);
        }
    }

    fn finish_build(self: &Arc<Self>, result: NavResult<PathIndex>) {
        match result {
            Ok(index) => {
                let index = Arc::new(index);
                let _tick = lock(&self.tick);
                {
                    let mut slot = lock(&self.slot);
                    if matches!(*slot, IndexSlot::Disposed) {
                        debug!("Discarding path index built after disposal");
                        return;
                    }
                    *slot = IndexSlot::Ready(Arc::clone(&index));
                }
                self.slot_changed.notify_all();

                let mut events = Vec::new();
                {
                    let mut state = lock(&self.state);
                    if let (Some(location), false) = (state.location(), state.is_objective_initialized()) {
                        self.initialize_objective(&mut state, &index, &location, &mut events);
                    }
                }
                self.deliver(events);
            }
            Err(err) => {
                error!("Path index build failed: {}", err);
                let snapshot = {
                    let mut slot = lock(&self.slot);
                    if matches!(*slot, IndexSlot::Disposed) {
                        return;
                    }
                    *slot = IndexSlot::Failed(err.clone());
                    self.listeners.snapshot()
                };
                self.slot_changed.notify_all();
                snapshot.notify_failure(&err);
            }
        }
    }

    fn process(self: &Arc<Self>, state: &mut ProgressState, location: Point) -> Vec<NavigationEvent> {
        let mut events = Vec::new();
        let index = match &*lock(&self.slot) {
            IndexSlot::Disposed => {
                debug!("Ignoring location fix after disposal");
                return events;
            }
            IndexSlot::Ready(index) => Some(Arc::clone(index)),
            IndexSlot::Pending | IndexSlot::Failed(_) => None,
        };

        let old = state.replace_location(location);
        if let Some(index) = index {
            self.advance(state, &index, &location, &mut events);
        }
        events.push(NavigationEvent::LocationChanged { old, new: location });
        events
    }

    fn advance(self: &Arc<Self>, state: &mut ProgressState, index: &PathIndex, location: &Point, events: &mut Vec<NavigationEvent>) {
        let config = self.config();

        if !state.is_objective_initialized() {
            self.initialize_objective(state, index, location, events);
        }

        let distance = match index.distance_from_path(location) {
            Ok(distance) => distance,
            Err(err) => {
                warn!("Skipping tick, distance from path failed: {}", err);
                return;
            }
        };
        let off_route = distance > config.off_route_bubble_radius_m;
        let was_off_route = state.is_off_route();

        if off_route {
            if !was_off_route {
                info!("Off route, {:.1} m from path", distance);
                state.enter_off_route(*location);
                self.report_off_route(state, &config, events);
            } else if let Some(anchor) = state.off_route_anchor() {
                let moved = great_circle_distance(&anchor, location);
                if moved >= OFF_ROUTE_MOVEMENT_FACTOR * config.bubble_radius_m {
                    debug!("Still off route, moved {:.1} m since going off route", moved);
                }
            }
            return;
        }

        let fraction = match index.locate_along_path(location) {
            Ok(fraction) => fraction,
            Err(err) => {
                warn!("Skipping tick, cannot locate fix along path: {}", err);
                return;
            }
        };

        if was_off_route {
            state.leave_off_route();
            if state.cancel_deferred_off_route() {
                self.off_route_timer.cancel();
                debug!("Back on route before the off-route report was due");
            } else {
                info!("Returned to route");
                events.push(NavigationEvent::ReturnedToRoute);
            }
            let objective = index
                .waypoints()
                .find(|p| p.relative_position >= fraction && !state.has_departed(p.path_index))
                .map(|p| p.path_index);
            self.change_objective(state, objective, true, events);
        }

        for waypoint in index.waypoints() {
            if state.has_arrived(waypoint.path_index) {
                continue;
            }
            if great_circle_distance(location, &waypoint.point) <= config.bubble_radius_m {
                state.mark_arrived(waypoint.path_index);
                debug!("Arrived at waypoint {}", waypoint.path_index);
                if let Some(point) = self.path.get(waypoint.path_index) {
                    events.push(NavigationEvent::ArrivedAtPoint {
                        index: waypoint.path_index,
                        waypoint: point.clone(),
                    });
                }
            }
        }

        for candidate in state.awaiting_departure() {
            let passed = index.waypoint_fraction(candidate).is_some_and(|f| fraction >= f);
            if passed && state.mark_departed(candidate) {
                debug!("Departed waypoint {}", candidate);
                if let Some(point) = self.path.get(candidate) {
                    events.push(NavigationEvent::DepartedPoint {
                        index: candidate,
                        waypoint: point.clone(),
                    });
                }
            }
        }

        if let Some(current) = state.objective().filter(|&i| state.has_departed(i)) {
            let next = index
                .waypoints()
                .map(|p| p.path_index)
                .find(|&i| i > current && !state.has_departed(i));
            match next {
                Some(_) => self.change_objective(state, next, true, events),
                None => {
                    info!("Final objective {} departed, route complete", current);
                    state.set_objective(None);
                }
            }
        }

        if let Some((waypoint, trigger_id)) = index.find_trigger_window(fraction) {
            if state.record_trigger(waypoint, trigger_id) {
                debug!("Entered trigger {} of waypoint {}", trigger_id, waypoint);
                if let Some(point) = self.path.get(waypoint) {
                    events.push(NavigationEvent::TriggerEntered {
                        index: waypoint,
                        waypoint: point.clone(),
                        trigger_id,
                    });
                }
            }
        }
    }

    fn initialize_objective(&self, state: &mut ProgressState, index: &PathIndex, location: &Point, events: &mut Vec<NavigationEvent>) {
        match index.locate_along_path(location) {
            Ok(fraction) => {
                let objective = index.next_waypoint_at_or_after(fraction);
                debug!("Initial objective {:?} at fraction {:.4}", objective, fraction);
                self.change_objective(state, objective, true, events);
            }
            Err(err) => warn!("Cannot compute initial objective: {}", err),
        }
    }

    fn change_objective(&self, state: &mut ProgressState, objective: Option<usize>, is_from_progression: bool, events: &mut Vec<NavigationEvent>) {
        if !state.set_objective(objective) {
            return;
        }
        if let Some(point) = objective.and_then(|i| self.path.get(i).map(|p| (i, p))) {
            events.push(NavigationEvent::ObjectiveChanged {
                index: point.0,
                waypoint: point.1.clone(),
                is_from_progression,
            });
        }
    }

    fn report_off_route(self: &Arc<Self>, state: &mut ProgressState, config: &TrackerConfig, events: &mut Vec<NavigationEvent>) {
        let delay = config.off_route_event_delay();
        if delay.is_zero() {
            events.push(NavigationEvent::OffRoute);
            return;
        }

        let token = state.defer_off_route();
        let weak = Arc::downgrade(self);
        let scheduled = self.off_route_timer.schedule(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.fire_deferred_off_route(token);
            }
        });
        if !scheduled {
            warn!("Off-route timer unavailable, reporting immediately");
            state.cancel_deferred_off_route();
            events.push(NavigationEvent::OffRoute);
        }
    }

    fn fire_deferred_off_route(&self, token: u64) {
        let _tick = lock(&self.tick);
        if matches!(*lock(&self.slot), IndexSlot::Disposed) {
            return;
        }
        let claimed = lock(&self.state).claim_deferred_off_route(token);
        if claimed {
            info!("Off-route report delivered after delay");
            self.listeners.dispatch(&NavigationEvent::OffRoute);
        }
    }

    fn open_waypoint_after(&self, state: &ProgressState, from: Option<usize>) -> Option<usize> {
        let mut cursor = self.path.waypoint_after(from);
        while let Some(index) = cursor {
            if !state.has_departed(index) {
                return Some(index);
            }
            cursor = self.path.waypoint_after(Some(index));
        }
        None
    }

    fn open_waypoint_before(&self, state: &ProgressState, from: usize) -> Option<usize> {
        let mut cursor = self.path.waypoint_before(from);
        while let Some(index) = cursor {
            if !state.has_departed(index) {
                return Some(index);
            }
            cursor = self.path.waypoint_before(index);
        }
        None
    }
}
