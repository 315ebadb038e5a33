//! Open-Elevation lookup client.

use std::time::Duration;

use reqwest::blocking::Client;
use route_grade::{Coordinate, ElevationSource, GradeError};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_URL: &str = "https://api.open-elevation.com/api/v1/lookup";

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    locations: Vec<Location<'a>>,
}

#[derive(Debug, Serialize)]
struct Location<'a> {
    latitude: &'a f64,
    longitude: &'a f64,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    elevation: f64,
}

/// Blocking HTTP client for an Open-Elevation compatible endpoint.
pub struct OpenElevationClient {
    client: Client,
    url: String,
    batch_size: usize,
}

impl OpenElevationClient {
    pub fn new(url: &str, batch_size: usize, timeout: Duration) -> Result<Self, GradeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GradeError::ElevationUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            batch_size: batch_size.max(1),
        })
    }

    fn lookup_batch(&self, coords: &[Coordinate]) -> Result<Vec<f64>, GradeError> {
        let body = build_request(coords);
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| GradeError::ElevationUnavailable(e.to_string()))?;
        let text = response
            .text()
            .map_err(|e| GradeError::ElevationUnavailable(e.to_string()))?;
        parse_response(&text, coords.len())
    }
}

impl ElevationSource for OpenElevationClient {
    fn name(&self) -> &str {
        &self.url
    }

    fn lookup(&self, coords: &[Coordinate]) -> Result<Vec<f64>, GradeError> {
        let mut out = Vec::with_capacity(coords.len());
        for (batch, chunk) in coords.chunks(self.batch_size).enumerate() {
            debug!(batch, points = chunk.len(), "elevation request");
            out.extend(self.lookup_batch(chunk)?);
        }
        Ok(out)
    }
}

fn build_request(coords: &[Coordinate]) -> LookupRequest<'_> {
    LookupRequest {
        locations: coords
            .iter()
            .map(|c| Location {
                latitude: &c.lat,
                longitude: &c.lon,
            })
            .collect(),
    }
}

fn parse_response(text: &str, expected: usize) -> Result<Vec<f64>, GradeError> {
    let parsed: LookupResponse = serde_json::from_str(text)
        .map_err(|e| GradeError::ElevationUnavailable(format!("malformed response: {}", e)))?;
    if parsed.results.len() != expected {
        return Err(GradeError::ElevationUnavailable(format!(
            "requested {} elevations, received {}",
            expected,
            parsed.results.len()
        )));
    }
    Ok(parsed.results.into_iter().map(|r| r.elevation).collect())
}
