//! Route-file ingestion: GPX and FIT bytes to ordered track points.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::GradeError;

const SEMICIRCLES_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub coord: Coordinate,
    /// Elevation recorded in the file, in meters.
    pub elevation: Option<f64>,
}

impl TrackPoint {
    pub fn new(coord: Coordinate, elevation: Option<f64>) -> Self {
        Self { coord, elevation }
    }
}

/// Parse GPX or FIT points from bytes using the provided format hint (extension or file name).
pub fn parse_track(input: &[u8], format: &str) -> Result<Vec<TrackPoint>, GradeError> {
    let format_lc = format.to_ascii_lowercase();
    if format_lc.ends_with(".gpx") || format_lc == "gpx" {
        parse_gpx_points(input)
    } else if format_lc.ends_with(".fit") || format_lc == "fit" {
        parse_fit_points(input)
    } else {
        Err(GradeError::UnsupportedFormat(format.to_string()))
    }
}

fn parse_gpx_points(input: &[u8]) -> Result<Vec<TrackPoint>, GradeError> {
    use gpx::read;
    use std::io::Cursor;

    let gpx = read(Cursor::new(input)).map_err(|e| GradeError::GpxParse(e.to_string()))?;

    let mut out = Vec::new();
    for track in &gpx.tracks {
        for segment in &track.segments {
            out.extend(segment.points.iter().map(gpx_point));
        }
    }
    // Planned routes carry <rte> points instead of a recorded track.
    if out.is_empty() {
        for route in &gpx.routes {
            out.extend(route.points.iter().map(gpx_point));
        }
    }
    Ok(out)
}

fn gpx_point(point: &gpx::Waypoint) -> TrackPoint {
    let geo = point.point();
    TrackPoint::new(Coordinate::new(geo.y(), geo.x()), point.elevation)
}

fn parse_fit_points(input: &[u8]) -> Result<Vec<TrackPoint>, GradeError> {
    use fitparser::de::from_bytes;
    use fitparser::profile::MesgNum;

    let records = from_bytes(input).map_err(|e| GradeError::FitParse(e.to_string()))?;
    let mut out = Vec::new();

    for record in records.into_iter() {
        if record.kind() != MesgNum::Record {
            continue;
        }
        let fields = record.fields().iter().map(|f| (f.name(), f.value()));
        if let Some(point) = record_point(fields) {
            out.push(point);
        }
    }

    Ok(out)
}

/// Build a track point from one FIT record's fields; `None` without a position.
fn record_point<'a>(
    fields: impl IntoIterator<Item = (&'a str, &'a fitparser::Value)>,
) -> Option<TrackPoint> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;
    let mut altitude: Option<f64> = None;
    let mut enhanced_altitude: Option<f64> = None;
    for (name, value) in fields {
        match name {
            "position_lat" => lat = fit_value_to_f64(value).map(semicircles),
            "position_long" => lon = fit_value_to_f64(value).map(semicircles),
            "altitude" => altitude = fit_value_to_f64(value),
            "enhanced_altitude" => enhanced_altitude = fit_value_to_f64(value),
            _ => {}
        }
    }
    Some(TrackPoint::new(
        Coordinate::new(lat?, lon?),
        enhanced_altitude.or(altitude),
    ))
}

fn semicircles(value: f64) -> f64 {
    value * SEMICIRCLES_TO_DEGREES
}

fn fit_value_to_f64(value: &fitparser::Value) -> Option<f64> {
    match value {
        fitparser::Value::Float32(v) => Some(*v as f64),
        fitparser::Value::Float64(v) => Some(*v),
        fitparser::Value::SInt16(v) => Some(*v as f64),
        fitparser::Value::UInt16(v) => Some(*v as f64),
        fitparser::Value::SInt32(v) => Some(*v as f64),
        fitparser::Value::UInt32(v) => Some(*v as f64),
        fitparser::Value::SInt64(v) => Some(*v as f64),
        fitparser::Value::UInt64(v) => Some(*v as f64),
        fitparser::Value::UInt16z(v) => Some(*v as f64),
        fitparser::Value::UInt32z(v) => Some(*v as f64),
        fitparser::Value::UInt64z(v) => Some(*v as f64),
        fitparser::Value::Byte(v) => Some(*v as f64),
        fitparser::Value::UInt8(v) => Some(*v as f64),
        fitparser::Value::UInt8z(v) => Some(*v as f64),
        fitparser::Value::SInt8(v) => Some(*v as f64),
        fitparser::Value::Array(values) => values.iter().find_map(fit_value_to_f64),
        _ => None,
    }
}
