use crate::geo::{haversine, Coordinate, Unit};
use crate::GradeError;

/// Cumulative along-route distance in meters, starting at 0.
///
/// Coincident consecutive waypoints repeat the previous value.
pub fn distance_axis(waypoints: &[Coordinate]) -> Result<Vec<f64>, GradeError> {
    if waypoints.len() < 2 {
        return Err(GradeError::InsufficientPoints(waypoints.len()));
    }
    let mut axis = Vec::with_capacity(waypoints.len());
    let mut total_km = 0.0;
    axis.push(0.0);
    for w in waypoints.windows(2) {
        total_km += haversine(w[0], w[1], Unit::Kilometers);
        axis.push(total_km * 1000.0);
    }
    Ok(axis)
}
