//! Route Navigation Core
//!
//! Tracks a moving agent's progress along a predefined path: locates each
//! location fix on an indexed polyline and reports objectives, arrivals,
//! departures, off-route episodes and cue triggers to registered listeners.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use core::{Cue, CueTrigger, Path, PathPoint, Point, PointRole};
pub use algorithms::path_index::{PathIndex, TriggerWindow};
pub use processing::tracker::ProgressTracker;
pub use utils::config::{CompressionConfig, ConfigError, TrackerConfig};
pub use api::{
    EventCallback, ListenerHandle, ListenerRegistry, NavError, NavResult, NavigationEvent, NavigationListener,
    Objective, TrackerActor, TrackerState,
};
