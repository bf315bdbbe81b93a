//! Common API types and data structures

use serde::Serialize;
use thiserror::Error;

use crate::core::{PathPoint, Point};

/// Result type for navigation operations
pub type NavResult<T> = Result<T, NavError>;

/// Navigation error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    /// The path cannot be indexed
    #[error("invalid path: {reason}")]
    InvalidPath { reason: String },
    /// The path has no measurable length
    #[error("path has zero length")]
    DegeneratePath,
    /// The path index is still being built
    #[error("path index is not ready")]
    NotReady,
    /// The session has been disposed
    #[error("navigation session has been disposed")]
    Disposed,
    /// The background index build did not complete
    #[error("path index build failed: {reason}")]
    BuildFailed { reason: String },
    /// Invalid runtime parameter
    #[error("invalid parameter {parameter}={value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    /// The tracker worker queue is gone
    #[error("tracker command queue is closed")]
    QueueClosed,
}

/// Lifecycle of a tracker
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    /// Index build pending
    Initializing,
    Ready,
    /// Index build failed, terminal
    Failed(NavError),
    Disposed,
}

impl TrackerState {
    pub fn is_ready(&self) -> bool {
        matches!(self, TrackerState::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerState::Failed(_) | TrackerState::Disposed)
    }
}

/// Current navigation target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Objective {
    /// Index of the waypoint in the path
    pub index: usize,
    pub point: PathPoint,
}

/// Owned form of every listener notification, in delivery order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NavigationEvent {
    LocationChanged {
        old: Option<Point>,
        new: Point,
    },
    ObjectiveChanged {
        index: usize,
        waypoint: PathPoint,
        is_from_progression: bool,
    },
    OffRoute,
    ReturnedToRoute,
    TriggerEntered {
        index: usize,
        waypoint: PathPoint,
        trigger_id: u32,
    },
    ArrivedAtPoint {
        index: usize,
        waypoint: PathPoint,
    },
    DepartedPoint {
        index: usize,
        waypoint: PathPoint,
    },
    GpsStatusChanged {
        found: bool,
    },
    NavigationFailed {
        reason: String,
    },
}

impl NavigationEvent {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            NavigationEvent::LocationChanged { .. } => "location_changed",
            NavigationEvent::ObjectiveChanged { .. } => "objective_changed",
            NavigationEvent::OffRoute => "off_route",
            NavigationEvent::ReturnedToRoute => "returned_to_route",
            NavigationEvent::TriggerEntered { .. } => "trigger_entered",
            NavigationEvent::ArrivedAtPoint { .. } => "arrived_at_point",
            NavigationEvent::DepartedPoint { .. } => "departed_point",
            NavigationEvent::GpsStatusChanged { .. } => "gps_status_changed",
            NavigationEvent::NavigationFailed { .. } => "navigation_failed",
        }
    }
}
