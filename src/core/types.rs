//! Core data types for route navigation

use serde::{Deserialize, Serialize};

/// Geographic location in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// True when both coordinates are finite and inside the WGS84 range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A single distance-based trigger of a cue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueTrigger {
    /// Identifier reported back in `TriggerEntered`
    pub id: u32,
    /// Fire when within this many meters of the waypoint
    pub threshold_m: f64,
}

/// Instruction attached to a waypoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub triggers: Vec<CueTrigger>,
}

impl Cue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_trigger(mut self, id: u32, threshold_m: f64) -> Self {
        self.triggers.push(CueTrigger { id, threshold_m });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

/// Role of a vertex within a path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum PointRole {
    /// Named, navigable stop
    Waypoint {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cue: Option<Cue>,
    },
    /// Shape-only vertex, never a navigation target
    ControlPoint,
}

/// Vertex of a path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// Stable unique identifier
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub point: Point,
    #[serde(flatten)]
    pub role: PointRole,
}

impl PathPoint {
    pub fn waypoint(uid: impl Into<String>, point: Point) -> Self {
        Self {
            uid: uid.into(),
            name: None,
            point,
            role: PointRole::Waypoint { cue: None },
        }
    }

    pub fn control(uid: impl Into<String>, point: Point) -> Self {
        Self {
            uid: uid.into(),
            name: None,
            point,
            role: PointRole::ControlPoint,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a cue. Control points cannot carry cues and are left unchanged.
    pub fn with_cue(mut self, cue: Cue) -> Self {
        if let PointRole::Waypoint { cue: slot } = &mut self.role {
            *slot = Some(cue);
        }
        self
    }

    pub fn is_waypoint(&self) -> bool {
        matches!(self.role, PointRole::Waypoint { .. })
    }

    pub fn cue(&self) -> Option<&Cue> {
        match &self.role {
            PointRole::Waypoint { cue } => cue.as_ref(),
            PointRole::ControlPoint => None,
        }
    }
}

/// Ordered sequence of path points, immutable for a navigation session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub points: Vec<PathPoint>,
}

impl Path {
    pub fn new(points: Vec<PathPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PathPoint> {
        self.points.get(index)
    }

    pub fn waypoint_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_waypoint()).count()
    }

    /// Index of the point with the given uid
    pub fn index_of(&self, uid: &str) -> Option<usize> {
        self.points.iter().position(|p| p.uid == uid)
    }

    /// First waypoint strictly after `index`. `None` starts from the beginning.
    pub fn waypoint_after(&self, index: Option<usize>) -> Option<usize> {
        let start = index.map_or(0, |i| i + 1);
        (start..self.points.len()).find(|&i| self.points[i].is_waypoint())
    }

    /// Last waypoint strictly before `index`
    pub fn waypoint_before(&self, index: usize) -> Option<usize> {
        (0..index.min(self.points.len()))
            .rev()
            .find(|&i| self.points[i].is_waypoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> Path {
        Path::new(vec![
            PathPoint::waypoint("a", Point::new(0.0, 0.0)),
            PathPoint::control("c1", Point::new(0.0, 0.0005)),
            PathPoint::waypoint("b", Point::new(0.0, 0.001)),
            PathPoint::control("c2", Point::new(0.0, 0.0015)),
        ])
    }

    #[test]
    fn test_waypoint_navigation_skips_control_points() {
        let path = sample_path();
        assert_eq!(path.waypoint_after(None), Some(0));
        assert_eq!(path.waypoint_after(Some(0)), Some(2));
        assert_eq!(path.waypoint_after(Some(2)), None);
        assert_eq!(path.waypoint_before(2), Some(0));
        assert_eq!(path.waypoint_before(0), None);
        assert_eq!(path.waypoint_count(), 2);
    }

    #[test]
    fn test_control_point_ignores_cue() {
        let cue = Cue::new().with_trigger(1, 100.0);
        let control = PathPoint::control("c", Point::new(1.0, 1.0)).with_cue(cue.clone());
        assert!(control.cue().is_none());

        let waypoint = PathPoint::waypoint("w", Point::new(1.0, 1.0)).with_cue(cue);
        assert_eq!(waypoint.cue().map(|c| c.triggers.len()), Some(1));
    }

    #[test]
    fn test_point_validation() {
        assert!(Point::new(37.77, -122.41).is_valid());
        assert!(!Point::new(91.0, 0.0).is_valid());
        assert!(!Point::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_path_point_json_shape() {
        let json = r#"{"uid":"w1","point":{"latitude":1.0,"longitude":2.0},"role":"waypoint","cue":{"triggers":[{"id":0,"threshold_m":50.0}]}}"#;
        let parsed: PathPoint = serde_json::from_str(json).unwrap();
        assert!(parsed.is_waypoint());
        assert_eq!(parsed.cue().unwrap().triggers[0].threshold_m, 50.0);

        let control: PathPoint =
            serde_json::from_str(r#"{"uid":"c","point":{"latitude":1.0,"longitude":2.0},"role":"control_point"}"#)
                .unwrap();
        assert!(!control.is_waypoint());
    }
}
