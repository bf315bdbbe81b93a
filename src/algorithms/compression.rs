//! Control-point compression
//!
//! Densely digitized paths carry many shape vertices that add nothing to
//! navigation. A control point is dropped when the two segments meeting at it
//! are short and nearly collinear. Waypoints always survive.

use log::debug;

use crate::algorithms::geodesy::{bearing_difference, great_circle_distance, initial_bearing};
use crate::core::PathPoint;
use crate::utils::config::CompressionConfig;

/// Returns the indices (into `points`) that survive compression, in path order.
///
/// Single left-to-right pass. After a removal the next candidate is evaluated
/// against the surviving predecessor, so a long run of collinear control
/// points collapses as far as the distance limit allows.
pub fn compress_points<'a, I>(points: I, config: &CompressionConfig) -> Vec<usize>
where
    I: IntoIterator<Item = &'a PathPoint>,
{
    let points: Vec<&PathPoint> = points.into_iter().collect();
    let angle_tolerance = config.angle_tolerance_deg.abs();
    let max_distance = config.max_merge_distance_m.abs();

    let mut kept: Vec<usize> = Vec::with_capacity(points.len());
    for (index, candidate) in points.iter().enumerate() {
        let (Some(&previous), Some(next)) = (kept.last(), points.get(index + 1)) else {
            kept.push(index);
            continue;
        };
        if candidate.is_waypoint() {
            kept.push(index);
            continue;
        }

        let previous = &points[previous].point;
        let current = &candidate.point;
        let next = &next.point;

        let combined = great_circle_distance(previous, current) + great_circle_distance(current, next);
        let turn = bearing_difference(initial_bearing(previous, current), initial_bearing(current, next));

        if combined < max_distance && turn < angle_tolerance {
            continue;
        }
        kept.push(index);
    }

    debug!(
        "Compressed {} -> {} points (angle tolerance {} deg, max merge distance {} m)",
        points.len(),
        kept.len(),
        angle_tolerance,
        max_distance
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point;

    fn straight_line(count: usize) -> Vec<PathPoint> {
        (0..count)
            .map(|i| {
                let point = Point::new(0.0, i as f64 * 0.0001);
                if i == 0 || i == count - 1 {
                    PathPoint::waypoint(format!("w{}", i), point)
                } else {
                    PathPoint::control(format!("c{}", i), point)
                }
            })
            .collect()
    }

    #[test]
    fn test_straight_line_reduces_to_endpoints() {
        // 10 points spaced ~11 m apart, well under the merge limit
        let points = straight_line(10);
        let kept = compress_points(&points, &CompressionConfig::default());
        assert_eq!(kept, vec![0, 9]);
    }

    #[test]
    fn test_waypoints_are_never_dropped() {
        let mut points = straight_line(7);
        points[3] = PathPoint::waypoint("mid", points[3].point);
        let kept = compress_points(&points, &CompressionConfig::default());
        assert_eq!(kept, vec![0, 3, 6]);
    }

    #[test]
    fn test_sharp_turn_is_kept() {
        let points = vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::control("corner", Point::new(0.0, 0.001)),
            PathPoint::waypoint("b", Point::new(0.001, 0.001)),
        ];
        let kept = compress_points(&points, &CompressionConfig::default());
        assert_eq!(kept, vec![0, 1, 2]);
    }

    #[test]
    fn test_long_segments_are_not_merged() {
        // ~1.1 km per segment, the combined length exceeds the merge limit
        let points = vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::control("c", Point::new(0.0, 0.01)),
            PathPoint::waypoint("b", Point::new(0.0, 0.02)),
        ];
        let kept = compress_points(&points, &CompressionConfig::default());
        assert_eq!(kept, vec![0, 1, 2]);
    }

    #[test]
    fn test_output_never_exceeds_input() {
        let points: Vec<PathPoint> = (0..50)
            .map(|i| {
                let wobble = if i % 2 == 0 { 0.0 } else { 0.00002 };
                PathPoint::control(format!("c{}", i), Point::new(wobble, i as f64 * 0.0001))
            })
            .collect();
        let kept = compress_points(&points, &CompressionConfig::default());
        assert!(kept.len() <= points.len());
        assert_eq!(kept.first(), Some(&0));
        assert_eq!(kept.last(), Some(&49));
    }
}
