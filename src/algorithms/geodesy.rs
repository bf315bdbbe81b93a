//! Great-circle estimates and local tangent-plane projection
//!
//! Distances use a spherical Earth. Segment projection works in an
//! equirectangular plane centred on the segment start, which keeps the error
//! well under a meter for the segment lengths a compressed path produces.

use nalgebra::Vector2;

use crate::core::{Point, EARTH_RADIUS_M};

/// Great-circle (haversine) distance in meters
pub fn great_circle_distance(a: &Point, b: &Point) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = wrap_longitude(b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    c * EARTH_RADIUS_M
}

/// Initial great-circle bearing from `a` to `b`, degrees clockwise from north in [0, 360)
pub fn initial_bearing(a: &Point, b: &Point) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lon = wrap_longitude(b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Smallest absolute angle between two bearings, in [0, 180]
pub fn bearing_difference(first: f64, second: f64) -> f64 {
    let diff = (first - second).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Normalize a longitude delta into [-180, 180]
fn wrap_longitude(delta: f64) -> f64 {
    let wrapped = (delta + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && delta > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Equirectangular tangent plane anchored at an origin, coordinates in meters (east, north)
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    origin: Point,
    meters_per_deg_lat: f64,
    meters_per_deg_lon: f64,
}

impl LocalFrame {
    pub fn new(origin: Point) -> Self {
        let meters_per_deg_lat = EARTH_RADIUS_M.to_radians();
        Self {
            origin,
            meters_per_deg_lat,
            meters_per_deg_lon: meters_per_deg_lat * origin.latitude.to_radians().cos(),
        }
    }

    pub fn to_local(&self, point: &Point) -> Vector2<f64> {
        Vector2::new(
            wrap_longitude(point.longitude - self.origin.longitude) * self.meters_per_deg_lon,
            (point.latitude - self.origin.latitude) * self.meters_per_deg_lat,
        )
    }

    pub fn to_geo(&self, local: &Vector2<f64>) -> Point {
        let longitude = if self.meters_per_deg_lon.abs() > f64::EPSILON {
            self.origin.longitude + local.x / self.meters_per_deg_lon
        } else {
            self.origin.longitude
        };
        Point::new(
            self.origin.latitude + local.y / self.meters_per_deg_lat,
            wrap_longitude(longitude),
        )
    }
}

/// Result of projecting a point onto a segment
#[derive(Debug, Clone, Copy)]
pub struct SegmentProjection {
    /// Position of the foot along the segment, clamped to [0, 1]
    pub t: f64,
    /// Foot of the projection
    pub closest: Point,
    /// Great-circle distance from the input to the foot (m)
    pub distance_m: f64,
}

/// Project `point` onto the segment `start`→`end`
pub fn project_onto_segment(point: &Point, start: &Point, end: &Point) -> SegmentProjection {
    let frame = LocalFrame::new(*start);
    let p = frame.to_local(point);
    let b = frame.to_local(end);

    let length_sq = b.norm_squared();
    let t = if length_sq > f64::EPSILON {
        (p.dot(&b) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let closest = if t <= 0.0 {
        *start
    } else if t >= 1.0 {
        *end
    } else {
        frame.to_geo(&(b * t))
    };

    SegmentProjection {
        t,
        closest,
        distance_m: great_circle_distance(point, &closest),
    }
}

/// Point at fraction `t` of the segment `start`→`end`
pub fn interpolate(start: &Point, end: &Point, t: f64) -> Point {
    if t <= 0.0 {
        return *start;
    }
    if t >= 1.0 {
        return *end;
    }
    let frame = LocalFrame::new(*start);
    frame.to_geo(&(frame.to_local(end) * t))
}
