/// Sentence rendering for gauge and station reports.
///
/// Everything produced here is read aloud by the speech synthesizer, so
/// the wording is fixed and there is no markup. Failures never reach the
/// listener as silence: `render_fallback` turns any `ReportError` into an
/// apology that still names the source.

use crate::model::{
    FailureCategory, GaugeObservation, Report, ReportError, SourceDescriptor, SourceKind,
    StationObservation,
};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;

/// Spoken time layout, e.g. "June 01 at 02:30 PM".
const SPOKEN_TIME_FORMAT: &str = "%B %d at %I:%M %p";

pub fn render_gauge(label: &str, obs: &GaugeObservation) -> String {
    format!(
        "At {} the gauging station on the {} reported {} cubic feet per second, at a height of {} feet.",
        obs.timestamp.format(SPOKEN_TIME_FORMAT),
        label,
        obs.discharge_cfs,
        obs.gauge_height_ft
    )
}

/// Renders a station observation with its time shown in `tz`.
pub fn render_station<Tz>(label: &str, obs: &StationObservation, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "On {} the temperature at {} was {:.1} degrees fahrenheit, with a relative humidity of {}. \
         Perceived temperature was {:.1} degrees fahrenheit, dewpoint of {:.1}. Winds were {}. \
         Precipitation for the day was {:.1} inches, with {:.1} inches in the last hour. End of report.",
        spoken_time(&obs.observed_at, tz),
        label,
        obs.temp_f,
        obs.relative_humidity,
        obs.feels_like_f,
        obs.dewpoint_f,
        obs.wind,
        obs.precip_today_in,
        obs.precip_1hr_in
    )
}

fn spoken_time<Tz>(at: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.with_timezone(tz).format(SPOKEN_TIME_FORMAT).to_string()
}

/// The apology read in place of real data.
pub fn render_fallback(kind: SourceKind, label: &str, err: &ReportError) -> String {
    match (kind, err.category()) {
        (SourceKind::Gauge, FailureCategory::Fetch) => {
            format!("Could not fetch data for the gauging station on the {}.", label)
        }
        (SourceKind::Gauge, FailureCategory::Read) => {
            format!("Could not read data from the gauging station on the {}.", label)
        }
        (SourceKind::Gauge, FailureCategory::Data | FailureCategory::Upstream) => {
            format!("Could not find valid data for the gauging station on the {}.", label)
        }
        (SourceKind::Gauge, FailureCategory::Time) => format!(
            "Could not parse the report time for the gauging station on the {}.",
            label
        ),
        (SourceKind::Station, FailureCategory::Fetch) => {
            format!("Could not fetch data for station at {}.", label)
        }
        (SourceKind::Station, FailureCategory::Read) => {
            format!("Could not parse data for station at {}.", label)
        }
        (SourceKind::Station, FailureCategory::Upstream) => format!(
            "Weather Underground reported an error for station at {}.",
            label
        ),
        (SourceKind::Station, FailureCategory::Data | FailureCategory::Time) => format!(
            "Weather Underground returned unexpected data for station at {}.",
            label
        ),
    }
}

/// Wraps a parse outcome into the final report for `source`.
///
/// `render` is only called on success; errors go through
/// `render_fallback`.
pub fn finish<T>(
    source: &SourceDescriptor,
    outcome: &Result<T, ReportError>,
    render: impl FnOnce(&T) -> String,
) -> Report {
    let (text, is_fallback) = match outcome {
        Ok(obs) => (render(obs), false),
        Err(err) => (render_fallback(source.kind, &source.label, err), true),
    };

    Report {
        source_id: source.source_id(),
        text,
        is_fallback,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
