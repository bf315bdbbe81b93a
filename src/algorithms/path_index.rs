//! Immutable geometric index over a navigation path
//!
//! Built once per session from a [`Path`]. Holds the compressed polyline with
//! cumulative path length per vertex, each vertex's relative position in
//! [0, 1], and the cue trigger windows. Every query is read-only, so an index
//! can be shared across threads behind an `Arc`.

use std::cmp::Ordering;
use std::time::Instant;

use log::{debug, info, warn};

use crate::algorithms::compression::compress_points;
use crate::algorithms::geodesy::{great_circle_distance, interpolate, project_onto_segment};
use crate::api::types::{NavError, NavResult};
use crate::core::{Path, PathPoint, Point};
use crate::utils::config::CompressionConfig;

/// A surviving vertex of the indexed polyline
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    /// Index of the vertex in the source [`Path`]
    pub path_index: usize,
    pub point: Point,
    pub is_waypoint: bool,
    /// Path length from the start to this vertex (m)
    pub distance_m: f64,
    /// Cumulative great-circle distance between consecutive waypoints (m).
    /// Only meaningful for waypoints and the first vertex.
    pub geodesic_m: f64,
    /// `distance_m` as a fraction of the total path length
    pub relative_position: f64,
    /// Number of trigger windows owned by this vertex
    pub trigger_count: usize,
}

/// Path-fraction interval `[start, end)` during which a cue trigger is entered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerWindow {
    /// Source path index of the waypoint owning the cue
    pub path_index: usize,
    pub trigger_id: u32,
    pub threshold_m: f64,
    pub start: f64,
    pub end: f64,
}

impl TriggerWindow {
    pub fn contains(&self, fraction: f64) -> bool {
        fraction >= self.start && fraction < self.end
    }
}

/// Projection of an arbitrary location onto the indexed polyline
#[derive(Debug, Clone, Copy)]
pub struct PathProjection {
    /// Relative position of the foot of the projection
    pub fraction: f64,
    /// Great-circle distance from the location to the foot (m)
    pub distance_m: f64,
    pub closest: Point,
    /// Index (into the indexed vertices) of the segment start
    pub segment: usize,
}

/// Immutable path index
#[derive(Debug, Clone)]
pub struct PathIndex {
    points: Vec<IndexedPoint>,
    /// Positions in `points` of the waypoints, in path order
    waypoints: Vec<usize>,
    /// Windows ordered by start fraction
    windows: Vec<TriggerWindow>,
    total_length_m: f64,
    source_len: usize,
}

impl PathIndex {
    /// Build an index from a path.
    ///
    /// Points with invalid coordinates are skipped, control points are
    /// compressed, and the build fails with [`NavError::InvalidPath`] when
    /// fewer than two points remain. A path with no length fails with
    /// [`NavError::DegeneratePath`].
    pub fn build(path: &Path, compression: &CompressionConfig) -> NavResult<Self> {
        let start = Instant::now();

        let usable: Vec<(usize, &PathPoint)> = path
            .points
            .iter()
            .enumerate()
            .filter(|(index, p)| {
                let valid = p.point.is_valid();
                if !valid {
                    warn!("Skipping path point {} ({}) with invalid coordinates", index, p.uid);
                }
                valid
            })
            .collect();

        let kept = compress_points(usable.iter().map(|(_, p)| *p), compression);
        if kept.len() < 2 {
            return Err(NavError::InvalidPath {
                reason: format!(
                    "{} usable point(s) after compression of {} source point(s), at least 2 required",
                    kept.len(),
                    path.len()
                ),
            });
        }

        let mut points: Vec<IndexedPoint> = Vec::with_capacity(kept.len());
        let mut distance_m = 0.0;
        let mut geodesic_m = 0.0;
        let mut anchor: Option<Point> = None;

        for &k in &kept {
            let (path_index, source) = usable[k];
            if let Some(previous) = points.last() {
                distance_m += great_circle_distance(&previous.point, &source.point);
            }
            if source.is_waypoint() || anchor.is_none() {
                if let Some(anchor_point) = anchor {
                    geodesic_m += great_circle_distance(&anchor_point, &source.point);
                }
                anchor = Some(source.point);
            }
            points.push(IndexedPoint {
                path_index,
                point: source.point,
                is_waypoint: source.is_waypoint(),
                distance_m,
                geodesic_m: if source.is_waypoint() || points.is_empty() { geodesic_m } else { f64::NAN },
                relative_position: 0.0,
                trigger_count: 0,
            });
        }

        let total_length_m = distance_m;
        if !(total_length_m > 0.0) {
            return Err(NavError::DegeneratePath);
        }
        for p in &mut points {
            p.relative_position = if total_length_m > 0.0 {
                (p.distance_m / total_length_m).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }

        let waypoints: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_waypoint)
            .map(|(i, _)| i)
            .collect();

        let mut index = Self {
            points,
            waypoints,
            windows: Vec::new(),
            total_length_m,
            source_len: path.len(),
        };
        index.build_trigger_windows(path);

        info!(
            "Indexed path: {} -> {} points, {} waypoints, {} trigger windows, {:.1} m in {:?}",
            index.source_len,
            index.points.len(),
            index.waypoints.len(),
            index.windows.len(),
            index.total_length_m,
            start.elapsed()
        );
        Ok(index)
    }

    /// Place every cue trigger on the path.
    ///
    /// Thresholds are authored as straight-line distances to the waypoint,
    /// while fractions measure actual path length. The geodesic bounds of each
    /// window are mapped to path distance by interpolating linearly between
    /// the previous waypoint and this one. The mapping is exact only when the
    /// leg between them is roughly straight.
    ///
    /// Windows stack back from the waypoint: the nearest trigger's window ends
    /// at the waypoint and each farther one ends where the nearer one starts.
    fn build_trigger_windows(&mut self, path: &Path) {
        if self.total_length_m <= 0.0 {
            return;
        }

        let mut windows = Vec::new();
        let mut previous_anchor = 0usize;

        for position in 0..self.points.len() {
            let current = &self.points[position];
            if !current.is_waypoint {
                continue;
            }
            let cue = path.get(current.path_index).and_then(PathPoint::cue);
            if let (Some(cue), true) = (cue, position > 0) {
                let previous = &self.points[previous_anchor];
                let mut triggers: Vec<_> = cue
                    .triggers
                    .iter()
                    .filter(|t| {
                        let usable = t.threshold_m.is_finite() && t.threshold_m > 0.0;
                        if !usable {
                            warn!(
                                "Ignoring trigger {} of {} with threshold {}",
                                t.id, current.path_index, t.threshold_m
                            );
                        }
                        usable
                    })
                    .collect();
                triggers.sort_by(|a, b| a.threshold_m.partial_cmp(&b.threshold_m).unwrap_or(Ordering::Equal));

                let start_g = previous.geodesic_m;
                let end_g = current.geodesic_m;
                let to_path = |g: f64| {
                    let leg_g = end_g - start_g;
                    if leg_g <= 0.0 {
                        return current.distance_m;
                    }
                    previous.distance_m + (g - start_g) * (current.distance_m - previous.distance_m) / leg_g
                };

                // Nearest trigger first; each window ends where the nearer one starts
                let mut window_end_g = end_g;
                for trigger in &triggers {
                    let window_start_g = (window_end_g - trigger.threshold_m).max(start_g);
                    let start = (to_path(window_start_g) / self.total_length_m).max(previous.relative_position);
                    let end = (to_path(window_end_g) / self.total_length_m).min(current.relative_position);
                    if end > start {
                        windows.push(TriggerWindow {
                            path_index: current.path_index,
                            trigger_id: trigger.id,
                            threshold_m: trigger.threshold_m,
                            start,
                            end,
                        });
                    }
                    window_end_g = window_start_g;
                    // No room left before the previous waypoint
                    if window_start_g <= start_g {
                        break;
                    }
                }
            }
            previous_anchor = position;
        }

        windows.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));
        for window in &windows {
            if let Ok(position) = self.position_of(window.path_index) {
                self.points[position].trigger_count += 1;
            }
        }
        debug!("Built {} trigger windows", windows.len());
        self.windows = windows;
    }

    /// Total path length (m)
    pub fn total_length_m(&self) -> f64 {
        self.total_length_m
    }

    /// Number of points in the source path
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Number of vertices surviving compression
    pub fn compressed_len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[IndexedPoint] {
        &self.points
    }

    pub fn waypoints(&self) -> impl Iterator<Item = &IndexedPoint> + '_ {
        self.waypoints.iter().map(move |&i| &self.points[i])
    }

    pub fn trigger_windows(&self) -> &[TriggerWindow] {
        &self.windows
    }

    /// Windows belonging to the waypoint at `path_index`, largest threshold first
    pub fn windows_for(&self, path_index: usize) -> impl Iterator<Item = &TriggerWindow> + '_ {
        self.windows.iter().filter(move |w| w.path_index == path_index)
    }

    /// Indexed vertex for a source path index, if it survived compression
    pub fn indexed_point(&self, path_index: usize) -> Option<&IndexedPoint> {
        self.position_of(path_index).ok().map(|i| &self.points[i])
    }

    /// Relative position of a waypoint
    pub fn waypoint_fraction(&self, path_index: usize) -> Option<f64> {
        self.indexed_point(path_index)
            .filter(|p| p.is_waypoint)
            .map(|p| p.relative_position)
    }

    fn position_of(&self, path_index: usize) -> Result<usize, usize> {
        self.points.binary_search_by_key(&path_index, |p| p.path_index)
    }

    /// Nearest projection of `point` onto the polyline
    pub fn project(&self, point: &Point) -> PathProjection {
        let mut best: Option<PathProjection> = None;
        for (segment, pair) in self.points.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            let projection = project_onto_segment(point, &a.point, &b.point);
            if best.map_or(true, |current| projection.distance_m < current.distance_m) {
                let along = a.distance_m + projection.t * (b.distance_m - a.distance_m);
                best = Some(PathProjection {
                    fraction: self.fraction_of(along),
                    distance_m: projection.distance_m,
                    closest: projection.closest,
                    segment,
                });
            }
        }

        // build() guarantees at least one segment
        best.unwrap_or(PathProjection {
            fraction: 0.0,
            distance_m: great_circle_distance(point, &self.points[0].point),
            closest: self.points[0].point,
            segment: 0,
        })
    }

    fn fraction_of(&self, distance_m: f64) -> f64 {
        if self.total_length_m > 0.0 {
            (distance_m / self.total_length_m).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn ensure_measurable(&self) -> NavResult<()> {
        if self.total_length_m > 0.0 {
            Ok(())
        } else {
            Err(NavError::DegeneratePath)
        }
    }

    /// Relative position of the projection of `point` onto the path
    pub fn locate_along_path(&self, point: &Point) -> NavResult<f64> {
        self.ensure_measurable()?;
        Ok(self.project(point).fraction)
    }

    /// Great-circle distance from `point` to the path (m)
    pub fn distance_from_path(&self, point: &Point) -> NavResult<f64> {
        let distance = self.project(point).distance_m;
        if distance.is_finite() {
            Ok(distance)
        } else {
            Err(NavError::InvalidPath {
                reason: format!("non-finite distance from path for {:?}", point),
            })
        }
    }

    /// Path length between the projections of `a` and `b` (m)
    pub fn distance_between_along_path(&self, a: &Point, b: &Point) -> NavResult<f64> {
        let first = self.locate_along_path(a)?;
        let second = self.locate_along_path(b)?;
        Ok((first - second).abs() * self.total_length_m)
    }

    /// Smallest-fraction waypoint at or after `fraction`
    pub fn next_waypoint_at_or_after(&self, fraction: f64) -> Option<usize> {
        let first = self
            .waypoints
            .partition_point(|&i| self.points[i].relative_position < fraction);
        self.waypoints.get(first).map(|&i| self.points[i].path_index)
    }

    /// First waypoint strictly after `fraction` that owns a trigger window
    pub fn next_waypoint_with_trigger_after(&self, fraction: f64) -> Option<usize> {
        self.waypoints()
            .find(|p| p.relative_position > fraction && p.trigger_count > 0)
            .map(|p| p.path_index)
    }

    /// The trigger window containing `fraction`, as `(waypoint path index, trigger id)`
    pub fn find_trigger_window(&self, fraction: f64) -> Option<(usize, u32)> {
        self.trigger_window_at(fraction).map(|w| (w.path_index, w.trigger_id))
    }

    pub fn trigger_window_at(&self, fraction: f64) -> Option<&TriggerWindow> {
        let after = self.windows.partition_point(|w| w.start <= fraction);
        after
            .checked_sub(1)
            .map(|i| &self.windows[i])
            .filter(|w| w.contains(fraction))
    }

    /// Source path index of the indexed vertex nearest to `point`
    pub fn closest_point_index(&self, point: &Point) -> Option<usize> {
        self.points
            .iter()
            .map(|p| (p.path_index, great_circle_distance(point, &p.point)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(index, _)| index)
    }

    /// Waypoints lying within `backward_m` behind and `forward_m` ahead of the
    /// projection of `point`, measured along the path. Each entry is tagged
    /// with `true` when the point is at or before the waypoint.
    pub fn waypoints_within_distance(
        &self,
        point: &Point,
        backward_m: f64,
        forward_m: f64,
    ) -> NavResult<Vec<(usize, bool)>> {
        let fraction = self.locate_along_path(point)?;
        let (from, to) = self.distance_window(fraction, backward_m, forward_m);
        Ok(self
            .waypoints()
            .filter(|p| p.distance_m >= from && p.distance_m <= to)
            .map(|p| (p.path_index, fraction <= p.relative_position))
            .collect())
    }

    /// Polyline section from `backward_m` behind to `forward_m` ahead of the
    /// projection of `point`
    pub fn section_geometry(&self, point: &Point, backward_m: f64, forward_m: f64) -> NavResult<Vec<Point>> {
        let fraction = self.locate_along_path(point)?;
        let (from, to) = self.distance_window(fraction, backward_m, forward_m);

        let mut section = vec![self.point_at_distance(from)];
        section.extend(
            self.points
                .iter()
                .filter(|p| p.distance_m > from && p.distance_m < to)
                .map(|p| p.point),
        );
        if to > from {
            section.push(self.point_at_distance(to));
        }
        Ok(section)
    }

    fn distance_window(&self, fraction: f64, backward_m: f64, forward_m: f64) -> (f64, f64) {
        let along = fraction * self.total_length_m;
        (
            (along - backward_m.abs()).max(0.0),
            (along + forward_m.abs()).min(self.total_length_m),
        )
    }

    /// Point on the polyline at the given path distance (m), clamped to the path
    pub fn point_at_distance(&self, distance_m: f64) -> Point {
        let after = self.points.partition_point(|p| p.distance_m <= distance_m);
        match after {
            0 => self.points[0].point,
            n if n >= self.points.len() => self.points[self.points.len() - 1].point,
            n => {
                let (a, b) = (&self.points[n - 1], &self.points[n]);
                let span = b.distance_m - a.distance_m;
                let t = if span > 0.0 { (distance_m - a.distance_m) / span } else { 0.0 };
                interpolate(&a.point, &b.point, t)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Cue;

    fn two_waypoint_path() -> Path {
        Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::waypoint("b", Point::new(0.0, 0.001)),
        ])
    }

    fn build(path: &Path) -> PathIndex {
        PathIndex::build(path, &CompressionConfig::default()).unwrap()
    }

    #[test]
    fn test_endpoints_locate_to_zero_and_one() {
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::control("c", Point::new(0.0005, 0.0005)),
            PathPoint::waypoint("b", Point::new(0.0, 0.001)),
        ]);
        let index = build(&path);
        assert!(index.locate_along_path(&Point::new(0.0, 0.0)).unwrap().abs() < 1e-9);
        assert!((index.locate_along_path(&Point::new(0.0, 0.001)).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_from_vertex_is_zero() {
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(10.0, 10.0)),
            PathPoint::control("c", Point::new(10.001, 10.0015)),
            PathPoint::waypoint("b", Point::new(10.0, 10.003)),
        ]);
        let index = build(&path);
        for p in &path.points {
            assert!(index.distance_from_path(&p.point).unwrap() < 1e-6);
        }
    }

    #[test]
    fn test_relative_positions_are_non_decreasing() {
        let path = Path::new(
            (0..20)
                .map(|i| {
                    let point = Point::new((i as f64 * 0.7).sin() * 0.001, i as f64 * 0.0005);
                    if i % 5 == 0 {
                        PathPoint::waypoint(format!("w{}", i), point)
                    } else {
                        PathPoint::control(format!("c{}", i), point)
                    }
                })
                .collect(),
        );
        let index = build(&path);
        let positions: Vec<f64> = index.points().iter().map(|p| p.relative_position).collect();
        assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(positions.first(), Some(&0.0));
        assert_eq!(positions.last(), Some(&1.0));
    }

    #[test]
    fn test_build_rejects_short_paths() {
        let empty = Path::default();
        assert!(matches!(
            PathIndex::build(&empty, &CompressionConfig::default()),
            Err(NavError::InvalidPath { .. })
        ));

        let single = Path::new(vec![PathPoint::waypoint("a", Point::new(0.0, 0.0))]);
        assert!(PathIndex::build(&single, &CompressionConfig::default()).is_err());

        let invalid = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::waypoint("b", Point::new(f64::NAN, 0.0)),
        ]);
        assert!(PathIndex::build(&invalid, &CompressionConfig::default()).is_err());
    }

    #[test]
    fn test_zero_length_path_is_rejected() {
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(1.0, 1.0)),
            PathPoint::waypoint("b", Point::new(1.0, 1.0)),
        ]);
        assert_eq!(
            PathIndex::build(&path, &CompressionConfig::default()).err(),
            Some(NavError::DegeneratePath)
        );
    }

    #[test]
    fn test_distance_between_along_path_follows_the_path() {
        // L-shaped path, ~111 m per leg
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::control("corner", Point::new(0.0, 0.001)),
            PathPoint::waypoint("b", Point::new(0.001, 0.001)),
        ]);
        let index = build(&path);
        let along = index
            .distance_between_along_path(&Point::new(0.0, 0.0), &Point::new(0.001, 0.001))
            .unwrap();
        let straight = great_circle_distance(&Point::new(0.0, 0.0), &Point::new(0.001, 0.001));
        assert!((along - index.total_length_m()).abs() < 1e-6);
        assert!(along > straight + 60.0);
    }

    #[test]
    fn test_next_waypoint_at_or_after() {
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::control("c", Point::new(0.0, 0.001)),
            PathPoint::waypoint("b", Point::new(0.001, 0.001)),
        ]);
        let index = build(&path);
        assert_eq!(index.next_waypoint_at_or_after(0.0), Some(0));
        assert_eq!(index.next_waypoint_at_or_after(0.01), Some(2));
        assert_eq!(index.next_waypoint_at_or_after(1.0), Some(2));
        assert_eq!(index.next_waypoint_at_or_after(1.01), None);
    }

    #[test]
    fn test_trigger_windows_stack_back_from_the_waypoint() {
        // ~1112 m straight leg, triggers at 500 m and 100 m
        let cue = Cue::new().with_trigger(3, 500.0).with_trigger(7, 100.0);
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::waypoint("b", Point::new(0.0, 0.01)).with_cue(cue),
        ]);
        let index = build(&path);
        let windows: Vec<_> = index.windows_for(1).copied().collect();
        assert_eq!(windows.len(), 2);

        assert_eq!(windows[0].trigger_id, 3);
        assert_eq!(windows[1].trigger_id, 7);
        assert!((windows[0].end - windows[1].start).abs() < 1e-12);
        assert!((windows[1].end - 1.0).abs() < 1e-9);

        // The far window starts 500 m before the near one, not before the waypoint
        let total = index.total_length_m();
        assert!(((1.0 - windows[0].start) * total - 600.0).abs() < 1.0);
        assert!(((1.0 - windows[0].end) * total - 100.0).abs() < 1.0);
        assert!(((1.0 - windows[1].start) * total - 100.0).abs() < 1.0);

        assert_eq!(index.find_trigger_window(0.2), None);
        assert_eq!(index.find_trigger_window(0.55), Some((1, 3)));
        assert_eq!(index.find_trigger_window(0.95), Some((1, 7)));
        assert_eq!(index.next_waypoint_with_trigger_after(0.0), Some(1));
    }

    #[test]
    fn test_trigger_window_clamped_to_previous_waypoint() {
        let cue = Cue::new().with_trigger(0, 5000.0);
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::waypoint("b", Point::new(0.0, 0.005)),
            PathPoint::waypoint("c", Point::new(0.0, 0.01)).with_cue(cue),
        ]);
        let index = build(&path);
        let window = index.windows_for(2).next().copied().unwrap();
        let previous = index.waypoint_fraction(1).unwrap();
        assert!((window.start - previous).abs() < 1e-9);
        assert!((window.end - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_triggers_beyond_the_previous_waypoint_are_dropped() {
        // ~556 m leg: the 500 m window reaches the previous waypoint, nothing is left for 900 m
        let cue = Cue::new()
            .with_trigger(1, 100.0)
            .with_trigger(2, 500.0)
            .with_trigger(3, 900.0);
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::waypoint("b", Point::new(0.0, 0.005)).with_cue(cue),
        ]);
        let index = build(&path);
        let ids: Vec<u32> = index.windows_for(1).map(|w| w.trigger_id).collect();
        assert_eq!(ids, vec![2, 1]);
        let far = index.windows_for(1).next().copied().unwrap();
        assert!(far.start.abs() < 1e-9);
    }

    #[test]
    fn test_trigger_window_scales_with_curved_leg() {
        // The leg detours through a control point, so 100 straight-line meters
        // map to more than 100 m of path.
        let cue = Cue::new().with_trigger(1, 100.0);
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::control("detour", Point::new(0.002, 0.001)),
            PathPoint::waypoint("b", Point::new(0.0, 0.002)).with_cue(cue),
        ]);
        let index = build(&path);
        let window = index.windows_for(2).next().copied().unwrap();
        let path_meters = (window.end - window.start) * index.total_length_m();
        let leg_path = index.total_length_m();
        let leg_straight = great_circle_distance(&Point::new(0.0, 0.0), &Point::new(0.0, 0.002));
        assert!((path_meters - 100.0 * leg_path / leg_straight).abs() < 1e-6);
    }

    #[test]
    fn test_waypoints_within_distance() {
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::waypoint("b", Point::new(0.0, 0.001)),
            PathPoint::waypoint("c", Point::new(0.0, 0.002)),
        ]);
        let index = build(&path);
        let near = index
            .waypoints_within_distance(&Point::new(0.0, 0.00095), 20.0, 20.0)
            .unwrap();
        assert_eq!(near, vec![(1, true)]);

        let past = index
            .waypoints_within_distance(&Point::new(0.0, 0.00105), 20.0, 20.0)
            .unwrap();
        assert_eq!(past, vec![(1, false)]);
    }

    #[test]
    fn test_section_geometry_spans_requested_distance() {
        let path = Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::control("corner", Point::new(0.0, 0.001)),
            PathPoint::waypoint("b", Point::new(0.001, 0.001)),
        ]);
        let index = build(&path);
        let section = index.section_geometry(&Point::new(0.0, 0.001), 50.0, 50.0).unwrap();
        assert_eq!(section.len(), 3);
        assert_eq!(section[1], Point::new(0.0, 0.001));
        let length: f64 = section.windows(2).map(|w| great_circle_distance(&w[0], &w[1])).sum();
        assert!((length - 100.0).abs() < 0.5, "length was {}", length);
    }

    #[test]
    fn test_closest_point_index_maps_to_source_path() {
        let path = two_waypoint_path();
        let index = build(&path);
        assert_eq!(index.closest_point_index(&Point::new(0.0001, 0.0009)), Some(1));
        assert_eq!(index.source_len(), 2);
        assert_eq!(index.compressed_len(), 2);
    }
}
