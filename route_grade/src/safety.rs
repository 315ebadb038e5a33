//! Stop proximity and safety classification.

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::{distances_from, validate_coordinates, Coordinate, Unit};
use crate::GradeError;

pub const SAFE_LABEL: &str = "potentially safe address";
pub const DANGEROUS_LABEL: &str = "potentially dangerous address";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SafetyParams {
    /// Largest absolute slope (degrees) tolerated inside a stop's window.
    pub angle_threshold: f64,
    /// One-sided along-route budget (meters) inspected around a stop.
    pub stop_coverage: f64,
}

impl Default for SafetyParams {
    fn default() -> Self {
        Self {
            angle_threshold: 2.0,
            stop_coverage: 500.0,
        }
    }
}

impl SafetyParams {
    pub fn validate(&self) -> Result<(), GradeError> {
        if !self.angle_threshold.is_finite() || self.angle_threshold < 0.0 {
            return Err(GradeError::InvalidParameter(format!(
                "angle_threshold must be a non-negative number, got {}",
                self.angle_threshold
            )));
        }
        if !self.stop_coverage.is_finite() || self.stop_coverage < 0.0 {
            return Err(GradeError::InvalidParameter(format!(
                "stop_coverage must be a non-negative number, got {}",
                self.stop_coverage
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Verdict {
    #[serde(rename = "potentially safe address")]
    Safe,
    #[serde(rename = "potentially dangerous address")]
    Dangerous,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Safe => SAFE_LABEL,
            Verdict::Dangerous => DANGEROUS_LABEL,
        }
    }

    pub fn is_dangerous(self) -> bool {
        self == Verdict::Dangerous
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageWindow {
    pub left: usize,
    pub center: usize,
    pub right: usize,
}

impl CoverageWindow {
    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.left, self.center, self.right)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopAssessment {
    pub stop: Coordinate,
    pub verdict: Verdict,
    pub window: CoverageWindow,
    pub nearest_distance_m: f64,
    pub max_abs_angle_deg: f64,
}

/// Index of the waypoint nearest to `stop` and its distance in meters.
///
/// Ties go to the first index attaining the minimum.
pub fn nearest_waypoint(stop: Coordinate, waypoints: &[Coordinate]) -> Option<(usize, f64)> {
    distances_from(stop, waypoints, Unit::Meters)
        .into_iter()
        .enumerate()
        .min_by_key(|&(_, d)| OrderedFloat(d))
}

/// Window of indices around `center` whose along-route distance to it stays
/// within `stop_coverage` meters on each side.
///
/// `distance_axis` must be non-decreasing, which makes both boundaries a
/// binary search.
pub fn coverage_window(
    distance_axis: &[f64],
    center: usize,
    stop_coverage: f64,
) -> Result<CoverageWindow, GradeError> {
    if !stop_coverage.is_finite() || stop_coverage < 0.0 {
        return Err(GradeError::InvalidParameter(format!(
            "stop_coverage must be a non-negative number, got {}",
            stop_coverage
        )));
    }
    let origin = *distance_axis.get(center).ok_or_else(|| {
        GradeError::InvalidParameter(format!(
            "center {} outside axis of length {}",
            center,
            distance_axis.len()
        ))
    })?;
    let left = distance_axis[..=center].partition_point(|&d| origin - d > stop_coverage);
    let ahead = distance_axis[center..].partition_point(|&d| d - origin <= stop_coverage);
    Ok(CoverageWindow {
        left,
        center,
        right: center + ahead.saturating_sub(1),
    })
}

/// Largest absolute angle over the inclusive window.
pub fn max_abs_angle(angle_profile: &[f64], window: &CoverageWindow) -> f64 {
    angle_profile[window.left..=window.right]
        .iter()
        .map(|a| OrderedFloat(a.abs()))
        .max()
        .map(|m| m.into_inner())
        .unwrap_or(0.0)
}

/// Classify a single stop. Inputs must be index-aligned and hold at least two points.
pub fn assess_stop(
    distance_axis: &[f64],
    angle_profile: &[f64],
    waypoints: &[Coordinate],
    stop: Coordinate,
    params: &SafetyParams,
) -> Result<StopAssessment, GradeError> {
    params.validate()?;
    check_aligned(distance_axis, angle_profile, waypoints)?;
    validate_coordinates(std::slice::from_ref(&stop), "stop")?;
    let (center, nearest_distance_m) = nearest_waypoint(stop, waypoints)
        .ok_or(GradeError::InsufficientPoints(waypoints.len()))?;
    let window = coverage_window(distance_axis, center, params.stop_coverage)?;
    let worst = max_abs_angle(angle_profile, &window);
    let verdict = if worst <= params.angle_threshold {
        Verdict::Safe
    } else {
        Verdict::Dangerous
    };
    Ok(StopAssessment {
        stop,
        verdict,
        window,
        nearest_distance_m,
        max_abs_angle_deg: worst,
    })
}

/// Classify every stop, fanning out across the rayon pool. Output follows stop order.
pub fn classify_stops(
    distance_axis: &[f64],
    angle_profile: &[f64],
    waypoints: &[Coordinate],
    stops: &[Coordinate],
    params: &SafetyParams,
) -> Result<Vec<StopAssessment>, GradeError> {
    params.validate()?;
    check_aligned(distance_axis, angle_profile, waypoints)?;
    validate_coordinates(stops, "stop")?;

    let results = stops
        .par_iter()
        .map(|&stop| assess_stop(distance_axis, angle_profile, waypoints, stop, params))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        stops = results.len(),
        dangerous = results.iter().filter(|r| r.verdict.is_dangerous()).count(),
        "classified stops"
    );
    Ok(results)
}

fn check_aligned(
    distance_axis: &[f64],
    angle_profile: &[f64],
    waypoints: &[Coordinate],
) -> Result<(), GradeError> {
    if distance_axis.len() != angle_profile.len() || distance_axis.len() != waypoints.len() {
        return Err(GradeError::InvalidParameter(format!(
            "misaligned inputs: {} axis points, {} angles, {} waypoints",
            distance_axis.len(),
            angle_profile.len(),
            waypoints.len()
        )));
    }
    if waypoints.len() < 2 {
        return Err(GradeError::InsufficientPoints(waypoints.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The boundary scan the binary search replaces.
    fn linear_window(axis: &[f64], center: usize, coverage: f64) -> CoverageWindow {
        let origin = axis[center];
        let mut left = center;
        for (i, &d) in axis.iter().enumerate().take(center + 1) {
            if origin - d <= coverage {
                left = i;
                break;
            }
        }
        let mut right = axis.len() - 1;
        for (i, &d) in axis.iter().enumerate().skip(center) {
            if d - origin > coverage {
                right = i - 1;
                break;
            }
        }
        CoverageWindow {
            left,
            center,
            right,
        }
    }

    fn irregular_axis() -> Vec<f64> {
        let mut axis = vec![0.0];
        for i in 1..200usize {
            let step = match i % 7 {
                0 => 0.0,
                1 => 3.5,
                2 => 120.0,
                3 => 45.25,
                4 => 0.0,
                5 => 260.0,
                _ => 17.0,
            };
            axis.push(axis[i - 1] + step);
        }
        axis
    }

    #[test]
    fn binary_search_matches_linear_scan() {
        let axis = irregular_axis();
        for coverage in [0.0, 3.5, 50.0, 120.0, 500.0, 1e6] {
            for center in 0..axis.len() {
                assert_eq!(
                    coverage_window(&axis, center, coverage).unwrap(),
                    linear_window(&axis, center, coverage),
                    "center {center}, coverage {coverage}"
                );
            }
        }
    }

    #[test]
    fn window_boundaries_are_tight() {
        let axis = irregular_axis();
        let n = axis.len();
        let coverage = 300.0;
        for center in 0..n {
            let w = coverage_window(&axis, center, coverage).unwrap();
            assert!(w.left <= w.center && w.center <= w.right && w.right < n);
            assert!(axis[center] - axis[w.left] <= coverage);
            assert!(axis[w.right] - axis[center] <= coverage);
            if w.left > 0 {
                assert!(axis[center] - axis[w.left - 1] > coverage);
            }
            if w.right < n - 1 {
                assert!(axis[w.right + 1] - axis[center] > coverage);
            }
        }
    }

    #[test]
    fn zero_coverage_keeps_coincident_neighbours() {
        let axis = [0.0, 10.0, 10.0, 10.0, 20.0];
        let w = coverage_window(&axis, 2, 0.0).unwrap();
        assert_eq!(w.as_tuple(), (1, 2, 3));
    }

    #[test]
    fn coverage_window_rejects_negative_or_nan_budget() {
        let axis = [0.0, 100.0, 200.0];
        assert!(matches!(
            coverage_window(&axis, 1, -1.0),
            Err(GradeError::InvalidParameter(_))
        ));
        assert!(matches!(
            coverage_window(&axis, 1, f64::NAN),
            Err(GradeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn coverage_window_rejects_center_past_the_end() {
        let axis = [0.0, 100.0, 200.0];
        assert!(matches!(
            coverage_window(&axis, 3, 50.0),
            Err(GradeError::InvalidParameter(_))
        ));
    }

    fn steep_center() -> ([f64; 3], [f64; 3], [Coordinate; 3]) {
        (
            [0.0, 100.0, 200.0],
            [0.0, 45.0, 0.0],
            [
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.0, 0.0009),
                Coordinate::new(0.0, 0.0018),
            ],
        )
    }

    #[test]
    fn single_stop_rejects_negative_coverage() {
        let (axis, angles, waypoints) = steep_center();
        let params = SafetyParams {
            stop_coverage: -1.0,
            ..SafetyParams::default()
        };
        let err = assess_stop(&axis, &angles, &waypoints, Coordinate::new(0.0, 0.0009), &params)
            .unwrap_err();
        assert!(matches!(err, GradeError::InvalidParameter(_)));
    }

    #[test]
    fn single_stop_rejects_nan_coordinate() {
        let (axis, angles, waypoints) = steep_center();
        let err = assess_stop(
            &axis,
            &angles,
            &waypoints,
            Coordinate::new(f64::NAN, 0.0009),
            &SafetyParams::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GradeError::CoordinateOutOfRange { what: "stop", .. }
        ));
    }

    #[test]
    fn single_stop_window_always_contains_center() {
        let (axis, angles, waypoints) = steep_center();
        let params = SafetyParams {
            stop_coverage: 0.0,
            ..SafetyParams::default()
        };
        let out = assess_stop(&axis, &angles, &waypoints, Coordinate::new(0.0, 0.0009), &params)
            .unwrap();
        assert_eq!(out.window.as_tuple(), (1, 1, 1));
        assert_eq!(out.verdict, Verdict::Dangerous);
    }

    #[test]
    fn nearest_waypoint_prefers_first_tie() {
        let waypoints = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.002),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.0, 0.002),
        ];
        let (index, distance) = nearest_waypoint(Coordinate::new(0.0, 0.002), &waypoints).unwrap();
        assert_eq!(index, 1);
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn verdict_follows_threshold_inclusively() {
        let axis = [0.0, 100.0, 200.0];
        let angles = [0.0, 2.0, -1.0];
        let waypoints = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.0009),
            Coordinate::new(0.0, 0.0018),
        ];
        let stop = Coordinate::new(0.0001, 0.0009);
        let at_limit = assess_stop(&axis, &angles, &waypoints, stop, &SafetyParams::default())
            .unwrap();
        assert_eq!(at_limit.verdict, Verdict::Safe);
        assert_eq!(at_limit.max_abs_angle_deg, 2.0);

        let strict = SafetyParams {
            angle_threshold: 1.5,
            ..SafetyParams::default()
        };
        let over = assess_stop(&axis, &angles, &waypoints, stop, &strict).unwrap();
        assert_eq!(over.verdict, Verdict::Dangerous);
    }

    #[test]
    fn params_reject_negative_values() {
        let bad = SafetyParams {
            stop_coverage: -1.0,
            ..SafetyParams::default()
        };
        assert!(bad.validate().is_err());
        let nan = SafetyParams {
            angle_threshold: f64::NAN,
            ..SafetyParams::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn params_fill_missing_fields_from_defaults() {
        let params: SafetyParams = serde_json::from_str(r#"{"stop_coverage": 250}"#).unwrap();
        assert_eq!(params.stop_coverage, 250.0);
        assert_eq!(params.angle_threshold, 2.0);
    }

    #[test]
    fn verdict_serializes_to_literal_label() {
        let json = serde_json::to_string(&Verdict::Dangerous).unwrap();
        assert_eq!(json, format!("\"{}\"", DANGEROUS_LABEL));
        assert_eq!(Verdict::Safe.to_string(), SAFE_LABEL);
    }

    #[test]
    fn empty_stop_list_yields_empty_result() {
        let axis = [0.0, 100.0];
        let angles = [0.0, 0.0];
        let waypoints = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.0009)];
        let out = classify_stops(&axis, &angles, &waypoints, &[], &SafetyParams::default())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn out_of_range_stop_is_rejected() {
        let axis = [0.0, 100.0];
        let angles = [0.0, 0.0];
        let waypoints = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.0009)];
        let stops = [Coordinate::new(0.0, 0.0), Coordinate::new(-95.0, 0.0)];
        let err = classify_stops(&axis, &angles, &waypoints, &stops, &SafetyParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            GradeError::CoordinateOutOfRange {
                what: "stop",
                index: 1,
                ..
            }
        ));
    }
}
