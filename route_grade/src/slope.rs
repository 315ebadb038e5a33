//! Slope profile: numeric gradient of elevation over the distance axis.
//!
//! Interior points use the second-order central difference for a
//! non-uniform grid, endpoints use one-sided first-order differences.
//! A zero-length segment (coincident waypoints) never divides by zero: the
//! stencil falls back to the difference over the remaining non-zero side, and
//! a point with no non-zero side gets a slope of 0.

use ndarray::{Array1, ArrayView1};

use crate::GradeError;

/// Derivative of `values` with respect to `axis`, aligned with the inputs.
pub fn gradient(values: ArrayView1<f64>, axis: ArrayView1<f64>) -> Result<Array1<f64>, GradeError> {
    let n = values.len();
    if axis.len() != n {
        return Err(GradeError::InvalidParameter(format!(
            "gradient inputs differ in length: {} values, {} axis points",
            n,
            axis.len()
        )));
    }
    if n < 2 {
        return Err(GradeError::InsufficientPoints(n));
    }

    let mut out = Array1::<f64>::zeros(n);
    out[0] = one_sided(values[0], values[1], axis[1] - axis[0]);
    out[n - 1] = one_sided(values[n - 2], values[n - 1], axis[n - 1] - axis[n - 2]);

    for i in 1..n - 1 {
        let hd = axis[i] - axis[i - 1];
        let hs = axis[i + 1] - axis[i];
        out[i] = if hd > 0.0 && hs > 0.0 {
            (hd * hd * (values[i + 1] - values[i]) + hs * hs * (values[i] - values[i - 1]))
                / (hd * hs * (hd + hs))
        } else if hs > 0.0 {
            (values[i + 1] - values[i]) / hs
        } else if hd > 0.0 {
            (values[i] - values[i - 1]) / hd
        } else {
            0.0
        };
    }
    Ok(out)
}

fn one_sided(from: f64, to: f64, h: f64) -> f64 {
    if h > 0.0 {
        (to - from) / h
    } else {
        0.0
    }
}

/// Signed slope angle in degrees at every waypoint. Positive means rising.
pub fn angle_profile(elevations: &[f64], distance_axis: &[f64]) -> Result<Vec<f64>, GradeError> {
    let dydx = gradient(
        ArrayView1::from(elevations),
        ArrayView1::from(distance_axis),
    )?;
    Ok(dydx.mapv(|d| d.atan().to_degrees()).to_vec())
}
