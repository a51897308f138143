/// Weather Underground conditions client for personal weather stations.
///
/// The conditions endpoint answers with a `response` envelope and, on
/// success, a `current_observation` object. Several numeric fields in the
/// observation are transmitted as strings ("0.12", "72.5") and have to be
/// converted before rendering. When the API rejects a request (bad key,
/// unknown station) it still answers 200 with `response.error` filled in.

use crate::model::{ReportError, StationObservation};
use chrono::{DateTime, Utc};
use serde::Deserialize;

const WXUNDER_BASE_URL: &str = "http://api.wunderground.com/api";

// ============================================================================
// API Response Structures
// ============================================================================

/// Top-level document. The observation is kept as raw JSON so that an
/// upstream error is detected no matter what shape the rest is in.
#[derive(Debug, Deserialize)]
struct ConditionsResponse {
    #[serde(default)]
    response: ResponseEnvelope,
    current_observation: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    error: Option<ApiError>,
}

/// Both fields are optional and nullable; only a non-empty `type` marks
/// an error.
#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    description: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CurrentObservation {
    observation_epoch: String,
    temp_f: f64,
    feelslike_f: String,
    relative_humidity: String,
    dewpoint_f: f64,
    wind_string: String,
    precip_1hr_in: String,
    precip_today_in: String,
}

// ============================================================================
// URL construction
// ============================================================================

pub fn build_station_url(api_key: &str, station_id: &str) -> String {
    format!(
        "{}/{}/conditions/q/pws:{}.json",
        WXUNDER_BASE_URL, api_key, station_id
    )
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a conditions document into a fully numeric observation.
///
/// Check order is fixed: structural decode, upstream error, observation
/// time, then each string-encoded number. Any failure rejects the whole
/// record.
pub fn parse_conditions(body: &str) -> Result<StationObservation, ReportError> {
    let document: ConditionsResponse = serde_json::from_str(body)
        .map_err(|e| ReportError::MalformedResponse(e.to_string()))?;

    if let Some(error) = document.response.error {
        if let Some(kind) = error.kind.filter(|k| !k.is_empty()) {
            return Err(ReportError::UpstreamApi {
                kind,
                description: describe(error.description),
            });
        }
    }

    let raw = document.current_observation.ok_or_else(|| {
        ReportError::MalformedResponse("response has no current_observation".to_string())
    })?;
    let obs: CurrentObservation = serde_json::from_value(raw)
        .map_err(|e| ReportError::MalformedResponse(e.to_string()))?;

    let observed_at = parse_epoch(&obs.observation_epoch)?;
    let feels_like_f = parse_number("feelslike_f", &obs.feelslike_f)?;
    let precip_1hr_in = parse_number("precip_1hr_in", &obs.precip_1hr_in)?;
    let precip_today_in = parse_number("precip_today_in", &obs.precip_today_in)?;

    Ok(StationObservation {
        observed_at,
        temp_f: obs.temp_f,
        feels_like_f,
        relative_humidity: obs.relative_humidity,
        dewpoint_f: obs.dewpoint_f,
        wind: obs.wind_string,
        precip_1hr_in,
        precip_today_in,
    })
}

fn describe(description: Option<serde_json::Value>) -> String {
    match description {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn parse_epoch(value: &str) -> Result<DateTime<Utc>, ReportError> {
    let seconds: i64 = value
        .trim()
        .parse()
        .map_err(|_| ReportError::TimeParse(format!("observation_epoch {:?}", value)))?;

    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        ReportError::TimeParse(format!("observation_epoch {} out of range", seconds))
    })
}

fn parse_number(field: &str, value: &str) -> Result<f64, ReportError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ReportError::NumericParse {
            field: field.to_string(),
            value: value.to_string(),
        })
}

// ============================================================================
// Tests
// ============================================================================
