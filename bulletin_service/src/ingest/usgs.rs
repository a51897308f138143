/// USGS NWIS instantaneous-values client for river gauges.
///
/// The gauge endpoint is requested in RDB format: a tab-separated table
/// preceded by `#` comment lines, one header line starting with
/// `agency_cd`, a column-width line, and then one row per reading, oldest
/// first. Every data row starts with the agency code `USGS`.
///
/// Column names for the measured parameters carry an agency-specific
/// prefix (e.g. `69928_00060`), so parameters are located by the suffix
/// after the last underscore. Qualifier columns (`69928_00060_cd`) end in
/// `cd` and are therefore never picked up.

use crate::model::{GaugeObservation, PARAM_DISCHARGE, PARAM_STAGE, ReportError};
use chrono::NaiveDateTime;
use std::fmt;

const USGS_IV_BASE_URL: &str = "https://waterdata.usgs.gov/nwis/uv";

/// Layout of the `datetime` column, local 24-hour wall time.
const RDB_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

const HEADER_PREFIX: &str = "agency_cd";
const DATA_ROW_PREFIX: &str = "USGS";
const DATETIME_COLUMN: &str = "datetime";

/// Which parameter-code suffix feeds which observation field.
const PARAMETER_COLUMNS: &[(&str, GaugeField)] = &[
    (PARAM_DISCHARGE, GaugeField::Discharge),
    (PARAM_STAGE, GaugeField::GaugeHeight),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GaugeField {
    Discharge,
    GaugeHeight,
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds the RDB request URL for one gauge, covering the last day of
/// discharge and gage height readings.
pub fn build_gauge_url(site_no: impl fmt::Display) -> String {
    format!(
        "{}?cb_all_{}_{}=on&cb_{}=on&cb_{}=on&format=rdb&period=1&site_no={}",
        USGS_IV_BASE_URL,
        PARAM_DISCHARGE,
        PARAM_STAGE,
        PARAM_DISCHARGE,
        PARAM_STAGE,
        site_no
    )
}

// ---------------------------------------------------------------------------
// RDB parsing
// ---------------------------------------------------------------------------

/// Column positions resolved from the header line.
#[derive(Debug, PartialEq)]
struct ColumnMap {
    datetime: usize,
    discharge: usize,
    gauge_height: usize,
}

impl ColumnMap {
    fn from_header(header: &str) -> Result<Self, ReportError> {
        let mut datetime = None;
        let mut discharge = None;
        let mut gauge_height = None;

        // Later columns overwrite earlier ones, matching the trailing-row policy.
        for (index, name) in header.split('\t').enumerate() {
            let name = name.trim_end_matches('\r');
            if name == DATETIME_COLUMN {
                datetime = Some(index);
            }

            let suffix = name.rsplit('_').next().unwrap_or(name);
            for (code, field) in PARAMETER_COLUMNS {
                if suffix == *code {
                    match field {
                        GaugeField::Discharge => discharge = Some(index),
                        GaugeField::GaugeHeight => gauge_height = Some(index),
                    }
                }
            }
        }

        Ok(Self {
            datetime: datetime
                .ok_or_else(|| ReportError::ColumnNotFound(DATETIME_COLUMN.to_string()))?,
            discharge: discharge
                .ok_or_else(|| ReportError::ColumnNotFound(format!("_{}", PARAM_DISCHARGE)))?,
            gauge_height: gauge_height
                .ok_or_else(|| ReportError::ColumnNotFound(format!("_{}", PARAM_STAGE)))?,
        })
    }
}

/// Parses an RDB payload into the most recent gauge observation.
///
/// The whole payload is scanned: the header is the first `agency_cd`
/// line, and the current reading is the last `USGS` line, since the feed
/// appends newest data at the bottom.
pub fn parse_rdb(body: &str) -> Result<GaugeObservation, ReportError> {
    let mut header: Option<&str> = None;
    let mut current_row: Option<&str> = None;

    for line in body.lines() {
        if header.is_none() && line.starts_with(HEADER_PREFIX) {
            header = Some(line);
        }
        if line.starts_with(DATA_ROW_PREFIX) {
            current_row = Some(line);
        }
    }

    let header = header
        .ok_or_else(|| ReportError::ColumnNotFound(format!("{} header line", HEADER_PREFIX)))?;
    let columns = ColumnMap::from_header(header)?;

    let row = current_row
        .ok_or_else(|| ReportError::MissingData("no USGS data rows in response".to_string()))?;
    let fields: Vec<&str> = row.split('\t').map(|f| f.trim_end_matches('\r')).collect();

    let datetime = required_field(&fields, columns.datetime, DATETIME_COLUMN)?;
    let discharge = required_field(&fields, columns.discharge, "discharge")?;
    let gauge_height = required_field(&fields, columns.gauge_height, "gage height")?;

    let timestamp = NaiveDateTime::parse_from_str(datetime, RDB_DATETIME_FORMAT)
        .map_err(|e| ReportError::TimeParse(format!("{:?}: {}", datetime, e)))?;

    Ok(GaugeObservation {
        timestamp,
        discharge_cfs: discharge.to_string(),
        gauge_height_ft: gauge_height.to_string(),
    })
}

fn required_field<'a>(
    fields: &[&'a str],
    index: usize,
    name: &str,
) -> Result<&'a str, ReportError> {
    match fields.get(index) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim()),
        _ => Err(ReportError::MissingData(format!("{} missing from current row", name))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
