//! Mutable per-session navigation progress
//!
//! Owned by exactly one tracker and only mutated from inside a tick. The
//! departed set only ever grows.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::core::Point;

#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    objective: Option<usize>,
    location: Option<Point>,
    /// False until the first objective has been computed from a location
    objective_initialized: bool,
    off_route: bool,
    off_route_anchor: Option<Point>,
    arrived: BTreeSet<usize>,
    departed: BTreeSet<usize>,
    fired_triggers: HashMap<usize, HashSet<u32>>,
    /// Token of an off-route report waiting on the debounce timer
    pending_off_route: Option<u64>,
    next_token: u64,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objective(&self) -> Option<usize> {
        self.objective
    }

    /// Replace the objective. A departed waypoint is never accepted.
    pub fn set_objective(&mut self, objective: Option<usize>) -> bool {
        if objective.is_some_and(|i| self.departed.contains(&i)) {
            return false;
        }
        self.objective = objective;
        self.objective_initialized = true;
        true
    }

    pub fn is_objective_initialized(&self) -> bool {
        self.objective_initialized
    }

    pub fn location(&self) -> Option<Point> {
        self.location
    }

    /// Record a new fix, returning the previous one
    pub fn replace_location(&mut self, location: Point) -> Option<Point> {
        self.location.replace(location)
    }

    pub fn is_off_route(&self) -> bool {
        self.off_route
    }

    pub fn off_route_anchor(&self) -> Option<Point> {
        self.off_route_anchor
    }

    /// Enter the off-route state anchored at `location`, releasing the
    /// objective's fired triggers so they can fire again after returning.
    pub fn enter_off_route(&mut self, location: Point) {
        self.off_route = true;
        self.off_route_anchor = Some(location);
        if let Some(objective) = self.objective {
            self.fired_triggers.remove(&objective);
        }
    }

    pub fn leave_off_route(&mut self) {
        self.off_route = false;
        self.off_route_anchor = None;
    }

    pub fn has_arrived(&self, index: usize) -> bool {
        self.arrived.contains(&index)
    }

    /// Returns true when the waypoint was not already marked
    pub fn mark_arrived(&mut self, index: usize) -> bool {
        self.arrived.insert(index)
    }

    pub fn has_departed(&self, index: usize) -> bool {
        self.departed.contains(&index)
    }

    /// Returns true when the waypoint was not already marked
    pub fn mark_departed(&mut self, index: usize) -> bool {
        self.departed.insert(index)
    }

    pub fn departed(&self) -> impl Iterator<Item = usize> + '_ {
        self.departed.iter().copied()
    }

    /// Arrived waypoints still awaiting departure, in path order
    pub fn awaiting_departure(&self) -> Vec<usize> {
        self.arrived.difference(&self.departed).copied().collect()
    }

    pub fn has_fired(&self, index: usize, trigger_id: u32) -> bool {
        self.fired_triggers
            .get(&index)
            .is_some_and(|fired| fired.contains(&trigger_id))
    }

    /// Returns true the first time a `(waypoint, trigger)` pair is recorded
    pub fn record_trigger(&mut self, index: usize, trigger_id: u32) -> bool {
        self.fired_triggers.entry(index).or_default().insert(trigger_id)
    }

    /// Issue a token for a deferred off-route report
    pub fn defer_off_route(&mut self) -> u64 {
        self.next_token += 1;
        self.pending_off_route = Some(self.next_token);
        self.next_token
    }

    /// Claim the deferred report if `token` is still the pending one
    pub fn claim_deferred_off_route(&mut self, token: u64) -> bool {
        if self.pending_off_route == Some(token) {
            self.pending_off_route = None;
            true
        } else {
            false
        }
    }

    /// Drop any pending deferred report, returning true if one was waiting
    pub fn cancel_deferred_off_route(&mut self) -> bool {
        self.pending_off_route.take().is_some()
    }
}
