//! Elevation sources and the policy choosing between recorded and looked-up values.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geo::Coordinate;
use crate::track::TrackPoint;
use crate::GradeError;

/// Maps coordinates to elevations in meters, one value per coordinate, same order.
pub trait ElevationSource {
    fn name(&self) -> &str;

    fn lookup(&self, coords: &[Coordinate]) -> Result<Vec<f64>, GradeError>;
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ElevationMode {
    /// Recorded elevations when every point has one, otherwise a lookup.
    Auto,
    Recorded,
    Lookup,
}

impl Default for ElevationMode {
    fn default() -> Self {
        ElevationMode::Auto
    }
}

/// Elevations for `points` according to `mode`. A lookup result that is
/// short, long or non-finite is an error, never padded.
pub fn resolve_elevations(
    points: &[TrackPoint],
    mode: ElevationMode,
    source: Option<&dyn ElevationSource>,
) -> Result<Vec<f64>, GradeError> {
    let recorded: Option<Vec<f64>> = points.iter().map(|p| p.elevation).collect();
    match (mode, recorded) {
        (ElevationMode::Recorded, Some(values)) | (ElevationMode::Auto, Some(values)) => {
            debug!(points = values.len(), "using recorded elevations");
            Ok(values)
        }
        (ElevationMode::Recorded, None) => Err(GradeError::ElevationUnavailable(
            "route file lacks elevation for some points".into(),
        )),
        (ElevationMode::Auto, None) | (ElevationMode::Lookup, _) => {
            let source = source.ok_or_else(|| {
                GradeError::ElevationUnavailable("no elevation source configured".into())
            })?;
            let coords: Vec<Coordinate> = points.iter().map(|p| p.coord).collect();
            info!(points = coords.len(), source = source.name(), "looking up elevations");
            let values = source.lookup(&coords)?;
            check_lookup(&coords, &values)?;
            Ok(values)
        }
    }
}

fn check_lookup(coords: &[Coordinate], values: &[f64]) -> Result<(), GradeError> {
    if values.len() != coords.len() {
        return Err(GradeError::ElevationUnavailable(format!(
            "requested {} elevations, received {}",
            coords.len(),
            values.len()
        )));
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(GradeError::ElevationUnavailable(format!(
            "non-finite elevation returned for point {}",
            index
        )));
    }
    Ok(())
}
