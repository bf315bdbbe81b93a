//! Physical constants and navigation defaults

/// Mean Earth radius used by the great-circle estimate (m)
pub const EARTH_RADIUS_M: f64 = 6371e3;

/// Default arrival bubble radius (m)
pub const DEFAULT_BUBBLE_RADIUS_M: f64 = 20.0;

/// Default perpendicular distance beyond which the agent is off route (m)
pub const DEFAULT_OFF_ROUTE_BUBBLE_RADIUS_M: f64 = 50.0;

/// Control points are only merged while the two adjoining segments stay under this length (m)
pub const DEFAULT_MAX_MERGE_DISTANCE_M: f64 = 1000.0;

/// Control points are only merged while the bearing changes by less than this (degrees)
pub const DEFAULT_ANGLE_TOLERANCE_DEG: f64 = 4.0;

/// Movement away from the off-route anchor, as a multiple of the bubble radius,
/// below which an off-route fix carries no new information
pub const OFF_ROUTE_MOVEMENT_FACTOR: f64 = 1.5;
