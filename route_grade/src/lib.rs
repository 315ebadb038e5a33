//! Slope hazard assessment for recorded routes: distance axis, angle profile
//! and per-stop safety classification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod axis;
pub mod elevation;
pub mod geo;
pub mod safety;
pub mod slope;
pub mod track;

pub use axis::distance_axis;
pub use elevation::{resolve_elevations, ElevationMode, ElevationSource};
pub use geo::{haversine, haversine_vector, Coordinate, Unit};
pub use safety::{
    assess_stop, coverage_window, CoverageWindow, SafetyParams, StopAssessment, Verdict,
};
pub use slope::angle_profile;
pub use track::{parse_track, TrackPoint};

#[derive(Error, Debug)]
pub enum GradeError {
    #[error("waypoint/elevation length mismatch: {waypoints} waypoints, {elevations} elevations")]
    LengthMismatch { waypoints: usize, elevations: usize },
    #[error("route needs at least 2 points, got {0}")]
    InsufficientPoints(usize),
    #[error("{what} {index} out of range: lat {lat}, lon {lon}")]
    CoordinateOutOfRange {
        what: &'static str,
        index: usize,
        lat: f64,
        lon: f64,
    },
    #[error("elevation at waypoint {0} is not finite")]
    NonFiniteElevation(usize),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to parse GPX file: {0}")]
    GpxParse(String),
    #[error("failed to parse FIT file: {0}")]
    FitParse(String),
    #[error("elevation data unavailable: {0}")]
    ElevationUnavailable(String),
}

/// Validated waypoint sequence with index-aligned elevations in meters.
#[derive(Clone, Debug, Serialize)]
pub struct Route {
    waypoints: Vec<Coordinate>,
    elevations: Vec<f64>,
}

impl Route {
    pub fn new(waypoints: Vec<Coordinate>, elevations: Vec<f64>) -> Result<Self, GradeError> {
        if waypoints.len() != elevations.len() {
            return Err(GradeError::LengthMismatch {
                waypoints: waypoints.len(),
                elevations: elevations.len(),
            });
        }
        if waypoints.len() < 2 {
            return Err(GradeError::InsufficientPoints(waypoints.len()));
        }
        geo::validate_coordinates(&waypoints, "waypoint")?;
        if let Some(index) = elevations.iter().position(|e| !e.is_finite()) {
            return Err(GradeError::NonFiniteElevation(index));
        }
        Ok(Self {
            waypoints,
            elevations,
        })
    }

    /// Build a route from parsed track points; every point must carry an elevation.
    pub fn from_track(points: &[TrackPoint]) -> Result<Self, GradeError> {
        let elevations = points
            .iter()
            .map(|p| p.elevation)
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| {
                GradeError::ElevationUnavailable("track points without recorded elevation".into())
            })?;
        Self::new(points.iter().map(|p| p.coord).collect(), elevations)
    }

    pub fn waypoints(&self) -> &[Coordinate] {
        &self.waypoints
    }

    pub fn elevations(&self) -> &[f64] {
        &self.elevations
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteProfile {
    pub distance_axis: Vec<f64>,
    pub angle_profile: Vec<f64>,
}

impl RouteProfile {
    pub fn len(&self) -> usize {
        self.distance_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance_axis.is_empty()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.distance_axis.last().copied().unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Assessment {
    pub params: SafetyParams,
    pub profile: RouteProfile,
    pub stops: Vec<StopAssessment>,
}

/// Derive the distance axis and angle profile of a validated route.
pub fn analyze_route(route: &Route) -> Result<RouteProfile, GradeError> {
    let distance_axis = distance_axis(route.waypoints())?;
    let angle_profile = angle_profile(route.elevations(), &distance_axis)?;
    Ok(RouteProfile {
        distance_axis,
        angle_profile,
    })
}

/// Classify every stop against an already computed profile. Results keep stop order.
pub fn assess_stops(
    route: &Route,
    profile: &RouteProfile,
    stops: &[Coordinate],
    params: &SafetyParams,
) -> Result<Vec<StopAssessment>, GradeError> {
    if profile.distance_axis.len() != route.len() || profile.angle_profile.len() != route.len() {
        return Err(GradeError::InvalidParameter(format!(
            "profile of length {}/{} does not match route of length {}",
            profile.distance_axis.len(),
            profile.angle_profile.len(),
            route.len()
        )));
    }
    safety::classify_stops(
        &profile.distance_axis,
        &profile.angle_profile,
        route.waypoints(),
        stops,
        params,
    )
}

/// Run the whole pipeline: profile the route, then classify the stops.
pub fn assess(
    route: &Route,
    stops: &[Coordinate],
    params: &SafetyParams,
) -> Result<Assessment, GradeError> {
    let profile = analyze_route(route)?;
    let stops = assess_stops(route, &profile, stops, params)?;
    Ok(Assessment {
        params: params.clone(),
        profile,
        stops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(n: usize) -> Vec<Coordinate> {
        (0..n).map(|i| Coordinate::new(0.0, i as f64 * 0.001)).collect()
    }

    #[test]
    fn route_rejects_mismatched_lengths() {
        let err = Route::new(coords(3), vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            GradeError::LengthMismatch {
                waypoints: 3,
                elevations: 2
            }
        ));
    }

    #[test]
    fn route_rejects_single_point() {
        let err = Route::new(coords(1), vec![1.0]).unwrap_err();
        assert!(matches!(err, GradeError::InsufficientPoints(1)));
    }

    #[test]
    fn route_rejects_out_of_range_waypoint() {
        let mut points = coords(3);
        points[1] = Coordinate::new(91.0, 0.0);
        let err = Route::new(points, vec![0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            GradeError::CoordinateOutOfRange {
                what: "waypoint",
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn route_rejects_nan_elevation() {
        let err = Route::new(coords(3), vec![0.0, f64::NAN, 1.0]).unwrap_err();
        assert!(matches!(err, GradeError::NonFiniteElevation(1)));
    }

    #[test]
    fn from_track_requires_elevation() {
        let points = vec![
            TrackPoint::new(Coordinate::new(0.0, 0.0), Some(1.0)),
            TrackPoint::new(Coordinate::new(0.0, 0.001), None),
        ];
        assert!(matches!(
            Route::from_track(&points),
            Err(GradeError::ElevationUnavailable(_))
        ));
    }

    #[test]
    fn profile_is_aligned_with_route() {
        let route = Route::new(coords(6), vec![0.0, 1.0, 3.0, 2.0, 2.0, 5.0]).unwrap();
        let profile = analyze_route(&route).unwrap();
        assert_eq!(profile.distance_axis.len(), route.len());
        assert_eq!(profile.angle_profile.len(), route.len());
        assert_eq!(profile.distance_axis[0], 0.0);
    }

    #[test]
    fn assess_stops_rejects_foreign_profile() {
        let route = Route::new(coords(4), vec![0.0; 4]).unwrap();
        let other = Route::new(coords(5), vec![0.0; 5]).unwrap();
        let profile = analyze_route(&other).unwrap();
        let err = assess_stops(&route, &profile, &[], &SafetyParams::default()).unwrap_err();
        assert!(matches!(err, GradeError::InvalidParameter(_)));
    }
}
