//! Great-circle distance on a spherical Earth.

use serde::{Deserialize, Serialize};

use crate::GradeError;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Unit {
    Kilometers,
    Meters,
    Miles,
    NauticalMiles,
    Feet,
}

impl Default for Unit {
    fn default() -> Self {
        Unit::Kilometers
    }
}

impl Unit {
    /// Multiplier converting kilometers into this unit.
    fn per_km(self) -> f64 {
        match self {
            Unit::Kilometers => 1.0,
            Unit::Meters => 1000.0,
            Unit::Miles => 0.621_371_192,
            Unit::NauticalMiles => 0.539_956_803,
            Unit::Feet => 3280.839_895,
        }
    }
}

/// Haversine distance between two coordinates. Inputs are not range-checked.
pub fn haversine(a: Coordinate, b: Coordinate, unit: Unit) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * unit.per_km() * c
}

/// Element-wise haversine distances between two equal-length sequences.
pub fn haversine_vector(
    from: &[Coordinate],
    to: &[Coordinate],
    unit: Unit,
) -> Result<Vec<f64>, GradeError> {
    if from.len() != to.len() {
        return Err(GradeError::InvalidParameter(format!(
            "coordinate sequences differ in length: {} vs {}",
            from.len(),
            to.len()
        )));
    }
    Ok(from
        .iter()
        .zip(to.iter())
        .map(|(&a, &b)| haversine(a, b, unit))
        .collect())
}

/// Distance from one origin to every point, in point order.
pub fn distances_from(origin: Coordinate, points: &[Coordinate], unit: Unit) -> Vec<f64> {
    points.iter().map(|&p| haversine(origin, p, unit)).collect()
}

pub(crate) fn validate_coordinates(
    points: &[Coordinate],
    what: &'static str,
) -> Result<(), GradeError> {
    match points.iter().position(|p| !p.in_range()) {
        Some(index) => Err(GradeError::CoordinateOutOfRange {
            what,
            index,
            lat: points[index].lat,
            lon: points[index].lon,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_of_longitude_on_equator() {
        let d = haversine(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0), Unit::Meters);
        assert!((d - 111_195.0).abs() < 200.0);
    }

    #[test]
    fn units_scale_consistently() {
        let a = Coordinate::new(45.7597, 4.8422);
        let b = Coordinate::new(48.8567, 2.3508);
        let km = haversine(a, b, Unit::Kilometers);
        let m = haversine(a, b, Unit::Meters);
        assert!((km - 392.2).abs() < 0.5);
        assert!((m - km * 1000.0).abs() < 1e-6);
        assert!((haversine(a, b, Unit::Miles) - 243.7).abs() < 0.5);
    }

    #[test]
    fn coincident_points_are_zero_apart() {
        let p = Coordinate::new(12.5, -3.25);
        assert_eq!(haversine(p, p, Unit::Meters), 0.0);
    }

    #[test]
    fn vector_form_matches_scalar() {
        let from = vec![Coordinate::new(0.0, 0.0), Coordinate::new(10.0, 10.0)];
        let to = vec![Coordinate::new(0.0, 0.5), Coordinate::new(10.5, 9.5)];
        let out = haversine_vector(&from, &to, Unit::Meters).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], haversine(from[1], to[1], Unit::Meters));
    }

    #[test]
    fn vector_form_rejects_length_mismatch() {
        let from = vec![Coordinate::new(0.0, 0.0)];
        assert!(haversine_vector(&from, &[], Unit::Meters).is_err());
    }

    #[test]
    fn out_of_range_longitude_is_reported() {
        let points = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.5)];
        let err = validate_coordinates(&points, "stop").unwrap_err();
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
