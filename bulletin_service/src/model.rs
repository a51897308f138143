/// Core data types for the repeater bulletin service.
///
/// This module defines the shared domain model imported by all other modules:
/// source descriptors, parsed observations, the rendered report, and the
/// per-source error taxonomy. It contains no I/O.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// USGS parameter code for discharge (streamflow), in cubic feet per second.
pub const PARAM_DISCHARGE: &str = "00060";

/// USGS parameter code for gage height (stage), in feet.
pub const PARAM_STAGE: &str = "00065";

// ---------------------------------------------------------------------------
// Source descriptors
// ---------------------------------------------------------------------------

/// The two collections a source can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    /// USGS river gauge, fetched as tab-delimited RDB.
    Gauge,
    /// Weather Underground personal weather station, fetched as JSON.
    Station,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Gauge => write!(f, "gauge"),
            SourceKind::Station => write!(f, "station"),
        }
    }
}

/// Remote identifier of a source. Gauges use numeric USGS site numbers,
/// stations use alphanumeric PWS ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteId {
    Numeric(u32),
    Text(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Numeric(n) => write!(f, "{}", n),
            RemoteId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Static description of one configured source.
///
/// Built once from the configuration and shared read-only with the worker
/// that handles it. The API credential is reference counted so every
/// station descriptor points at the same key without copying it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub remote_id: RemoteId,
    /// Human-friendly name read aloud in the report.
    pub label: String,
    /// Station API key; `None` for gauges.
    pub credential: Option<Arc<str>>,
}

impl SourceDescriptor {
    pub fn gauge(site_no: u32, label: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Gauge,
            remote_id: RemoteId::Numeric(site_no),
            label: label.into(),
            credential: None,
        }
    }

    pub fn station(id: impl Into<String>, label: impl Into<String>, api_key: Arc<str>) -> Self {
        Self {
            kind: SourceKind::Station,
            remote_id: RemoteId::Text(id.into()),
            label: label.into(),
            credential: Some(api_key),
        }
    }

    /// Identifier used for output file names and log entries.
    pub fn source_id(&self) -> String {
        self.remote_id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// The current row of a gauge's RDB time series.
///
/// Discharge and stage stay in the source's own text form so the report
/// reads back exactly the precision USGS published.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeObservation {
    /// Local wall time of the reading, as published (no zone applied).
    pub timestamp: NaiveDateTime,
    pub discharge_cfs: String,
    pub gauge_height_ft: String,
}

/// Current conditions reported by a weather station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationObservation {
    pub observed_at: DateTime<Utc>,
    pub temp_f: f64,
    pub feels_like_f: f64,
    /// Kept as published, including the percent sign (e.g. "65%").
    pub relative_humidity: String,
    pub dewpoint_f: f64,
    pub wind: String,
    pub precip_1hr_in: f64,
    pub precip_today_in: f64,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// The single sentence produced for one source. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub source_id: String,
    pub text: String,
    /// `true` when the text is an apology rather than real data.
    pub is_fallback: bool,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Everything that can stop a single source from producing real data.
///
/// None of these ever leave the worker that hit them: each one is turned
/// into a fallback sentence for that source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    /// The request could not be completed (DNS, connect, timeout).
    #[error("Fetch error: {0}")]
    Fetch(String),
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    /// The response body could not be fully read.
    #[error("Body read error: {0}")]
    BodyRead(String),
    /// The body was read but could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// A required column is absent from the RDB header.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    /// Header present but no usable data row or field.
    #[error("No data available: {0}")]
    MissingData(String),
    /// The upstream API answered with an error object.
    #[error("Upstream API error {kind}: {description}")]
    UpstreamApi { kind: String, description: String },
    #[error("Time parse error: {0}")]
    TimeParse(String),
    #[error("Numeric parse error in {field}: {value:?}")]
    NumericParse { field: String, value: String },
}

/// Coarse grouping of `ReportError` used to choose fallback wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Nothing came back over the network.
    Fetch,
    /// Something came back but could not be read or decoded.
    Read,
    /// Decoded, but the expected values were not there or not numeric.
    Data,
    /// Observation time could not be parsed.
    Time,
    /// The remote API reported its own error.
    Upstream,
}

impl ReportError {
    pub fn category(&self) -> FailureCategory {
        match self {
            ReportError::Fetch(_) | ReportError::HttpStatus(_) => FailureCategory::Fetch,
            ReportError::BodyRead(_) | ReportError::MalformedResponse(_) => FailureCategory::Read,
            ReportError::ColumnNotFound(_)
            | ReportError::MissingData(_)
            | ReportError::NumericParse { .. } => FailureCategory::Data,
            ReportError::TimeParse(_) => FailureCategory::Time,
            ReportError::UpstreamApi { .. } => FailureCategory::Upstream,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
