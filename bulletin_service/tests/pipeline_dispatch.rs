/// Integration tests for the dispatch pipeline
///
/// These tests drive the full Dispatcher → Worker → sink path against an
/// in-memory fetcher, so they need no network:
/// 1. Every configured source produces exactly one report
/// 2. Every failure kind degrades to an apology naming the source
/// 3. Pool sizes smaller than the source count still finish every source
/// 4. Repeated runs over unchanged data produce identical text
/// 5. A failing output stage does not stop completion signals
///
/// Run with: cargo test --test pipeline_dispatch

use bulletin_service::ingest::fetch::Fetch;
use bulletin_service::model::{Report, ReportError, SourceDescriptor, SourceKind};
use bulletin_service::output::{OutputError, ReportSink};
use bulletin_service::pipeline::{request_url, Dispatcher, DisplayZone};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const API_KEY: &str = "test-key";

const GAUGE_OK: &str = "\
# Data provided for site 12150800
agency_cd\tsite_no\tdatetime\ttz_cd\t69928_00060\t69928_00060_cd\t69929_00065\t69929_00065_cd
5s\t15s\t20d\t6s\t14n\t10s\t14n\t10s
USGS\t12150800\t2020-06-01 14:15\tPDT\t3400\tP\t9.11\tP
USGS\t12150800\t2020-06-01 14:30\tPDT\t3390\tP\t9.10\tP
";

const GAUGE_NO_STAGE: &str = "\
agency_cd\tsite_no\tdatetime\ttz_cd\t69928_00060\t69928_00060_cd
USGS\t12134500\t2020-06-01 14:30\tPDT\t1200\tP
";

const GAUGE_BAD_TIME: &str = "\
agency_cd\tsite_no\tdatetime\ttz_cd\t00060\t00065
USGS\t12141300\tJune 1st\tPDT\t120\t3.5
";

const STATION_OK: &str = r#"{
    "response": { "version": "0.1" },
    "current_observation": {
        "observation_epoch": "1591050600",
        "temp_f": 64.4,
        "feelslike_f": "64.4",
        "relative_humidity": "71%",
        "dewpoint_f": 55.0,
        "wind_string": "Calm",
        "precip_1hr_in": "0.00",
        "precip_today_in": "0.12"
    }
}"#;

const STATION_NOT_FOUND: &str =
    r#"{"response":{"error":{"type":"querynotfound","description":"No cities match your search query"}}}"#;

const STATION_BAD_PRECIP: &str = r#"{
    "response": {},
    "current_observation": {
        "observation_epoch": "1591050600",
        "temp_f": 64.4,
        "feelslike_f": "64.4",
        "relative_humidity": "71%",
        "dewpoint_f": 55.0,
        "wind_string": "Calm",
        "precip_1hr_in": "0.00",
        "precip_today_in": "not-a-number"
    }
}"#;

/// Serves canned bodies (or errors) keyed by request URL.
struct StubFetcher {
    responses: HashMap<String, Result<String, ReportError>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn new() -> Self {
        Self {
            responses: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn with(mut self, source: &SourceDescriptor, response: Result<&str, ReportError>) -> Self {
        self.responses
            .insert(request_url(source), response.map(str::to_string));
        self
    }
}

impl Fetch for StubFetcher {
    fn fetch(&self, url: &str) -> Result<String, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ReportError::HttpStatus(404)))
    }
}

#[derive(Default)]
struct CollectingSink {
    reports: Mutex<Vec<Report>>,
}

impl CollectingSink {
    fn by_id(&self) -> BTreeMap<String, Report> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.source_id.clone(), r.clone()))
            .collect()
    }
}

impl ReportSink for CollectingSink {
    fn deliver(&self, report: &Report) -> Result<(), OutputError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

struct FailingSink {
    attempts: AtomicUsize,
}

impl ReportSink for FailingSink {
    fn deliver(&self, report: &Report) -> Result<(), OutputError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(OutputError::Command {
            program: "flite".to_string(),
            id: report.source_id.clone(),
            detail: "not installed".to_string(),
        })
    }
}

fn mixed_sources() -> Vec<SourceDescriptor> {
    let key: Arc<str> = Arc::from(API_KEY);
    vec![
        SourceDescriptor::gauge(12150800, "Snohomish River"),
        SourceDescriptor::gauge(12134500, "Skykomish River"),
        SourceDescriptor::gauge(12141300, "Middle Fork Snoqualmie River"),
        SourceDescriptor::gauge(12149000, "Snoqualmie River"),
        SourceDescriptor::station("KWAMONRO5", "Monroe", Arc::clone(&key)),
        SourceDescriptor::station("KWAGOLDB2", "Gold Bar", Arc::clone(&key)),
        SourceDescriptor::station("KWADUVAL3", "Duvall", Arc::clone(&key)),
        SourceDescriptor::station("KWACARNA1", "Carnation", key),
    ]
}

/// One source per outcome: two real reports, everything else a failure.
fn mixed_fetcher(sources: &[SourceDescriptor]) -> StubFetcher {
    StubFetcher::new()
        .with(&sources[0], Ok(GAUGE_OK))
        .with(&sources[1], Ok(GAUGE_NO_STAGE))
        .with(&sources[2], Ok(GAUGE_BAD_TIME))
        .with(&sources[3], Err(ReportError::Fetch("connection timed out".to_string())))
        .with(&sources[4], Ok(STATION_OK))
        .with(&sources[5], Ok(STATION_NOT_FOUND))
        .with(&sources[6], Ok(STATION_BAD_PRECIP))
        .with(&sources[7], Ok("<html>Bad Gateway</html>"))
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[test]
fn test_every_source_reported_exactly_once() {
    let sources = mixed_sources();
    let fetcher = mixed_fetcher(&sources);
    let sink = CollectingSink::default();

    let summary = Dispatcher::new(&fetcher, &sink)
        .with_display_zone(DisplayZone::Utc)
        .run(&sources)
        .unwrap();

    let delivered = sink.reports.lock().unwrap().clone();
    assert_eq!(delivered.len(), sources.len());
    assert_eq!(summary.total(), sources.len());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), sources.len());

    let expected: HashSet<String> = sources.iter().map(|s| s.source_id()).collect();
    let delivered_ids: HashSet<String> = delivered.iter().map(|r| r.source_id.clone()).collect();
    let signalled_ids: HashSet<String> =
        summary.completions.iter().map(|c| c.source_id.clone()).collect();
    assert_eq!(delivered_ids, expected);
    assert_eq!(signalled_ids, expected);

    let gauges = summary
        .completions
        .iter()
        .filter(|c| c.kind == SourceKind::Gauge)
        .count();
    assert_eq!(gauges, 4);
    assert_eq!(summary.live(), 2);
    assert_eq!(summary.fallbacks(), 6);
}

#[test]
fn test_small_pool_still_finishes_every_source() {
    let sources = mixed_sources();
    let fetcher = mixed_fetcher(&sources);
    let sink = CollectingSink::default();

    for workers in [1, 2, 3, 64] {
        sink.reports.lock().unwrap().clear();
        let summary = Dispatcher::new(&fetcher, &sink)
            .with_max_workers(Some(workers))
            .with_display_zone(DisplayZone::Utc)
            .run(&sources)
            .unwrap();

        assert_eq!(summary.total(), sources.len(), "pool of {}", workers);
        assert_eq!(sink.by_id().len(), sources.len(), "pool of {}", workers);
    }
}

#[test]
fn test_sources_run_concurrently() {
    let sources = mixed_sources();
    let mut fetcher = mixed_fetcher(&sources);
    fetcher.delay = Duration::from_millis(200);
    let sink = CollectingSink::default();

    let started = std::time::Instant::now();
    Dispatcher::new(&fetcher, &sink)
        .with_display_zone(DisplayZone::Utc)
        .run(&sources)
        .unwrap();

    // Eight sequential fetches would take 1.6s
    assert!(started.elapsed() < Duration::from_millis(1200));
    assert_eq!(sink.by_id().len(), sources.len());
}

#[test]
fn test_failing_sink_does_not_block_the_barrier() {
    let sources = mixed_sources();
    let fetcher = mixed_fetcher(&sources);
    let sink = FailingSink {
        attempts: AtomicUsize::new(0),
    };

    let summary = Dispatcher::new(&fetcher, &sink).run(&sources).unwrap();

    assert_eq!(summary.total(), sources.len());
    assert_eq!(sink.attempts.load(Ordering::SeqCst), sources.len());
}

// ---------------------------------------------------------------------------
// Report content
// ---------------------------------------------------------------------------

#[test]
fn test_live_reports_use_templates() {
    let sources = mixed_sources();
    let fetcher = mixed_fetcher(&sources);
    let sink = CollectingSink::default();

    Dispatcher::new(&fetcher, &sink)
        .with_display_zone(DisplayZone::Utc)
        .run(&sources)
        .unwrap();
    let reports = sink.by_id();

    assert_eq!(
        reports["12150800"].text,
        "At June 01 at 02:30 PM the gauging station on the Snohomish River reported 3390 \
         cubic feet per second, at a height of 9.10 feet."
    );
    assert!(!reports["12150800"].is_fallback);

    assert_eq!(
        reports["KWAMONRO5"].text,
        "On June 01 at 10:30 PM the temperature at Monroe was 64.4 degrees fahrenheit, with a \
         relative humidity of 71%. Perceived temperature was 64.4 degrees fahrenheit, dewpoint \
         of 55.0. Winds were Calm. Precipitation for the day was 0.1 inches, with 0.0 inches in \
         the last hour. End of report."
    );
}

#[test]
fn test_every_failure_names_its_source() {
    let sources = mixed_sources();
    let fetcher = mixed_fetcher(&sources);
    let sink = CollectingSink::default();

    Dispatcher::new(&fetcher, &sink).run(&sources).unwrap();
    let reports = sink.by_id();

    for source in &sources {
        let report = &reports[&source.source_id()];
        assert!(!report.text.trim().is_empty());
        assert!(
            report.text.contains(&source.label),
            "{} report does not name {}: {}",
            source.source_id(),
            source.label,
            report.text
        );
    }

    assert_eq!(
        reports["12134500"].text,
        "Could not find valid data for the gauging station on the Skykomish River."
    );
    assert_eq!(
        reports["12141300"].text,
        "Could not parse the report time for the gauging station on the Middle Fork Snoqualmie River."
    );
    assert_eq!(
        reports["12149000"].text,
        "Could not fetch data for the gauging station on the Snoqualmie River."
    );
    assert_eq!(
        reports["KWAGOLDB2"].text,
        "Weather Underground reported an error for station at Gold Bar."
    );
    assert_eq!(
        reports["KWADUVAL3"].text,
        "Weather Underground returned unexpected data for station at Duvall."
    );
    assert_eq!(
        reports["KWACARNA1"].text,
        "Could not parse data for station at Carnation."
    );
}

#[test]
fn test_repeated_runs_are_identical() {
    let sources = mixed_sources();
    let fetcher = mixed_fetcher(&sources);

    let first = CollectingSink::default();
    Dispatcher::new(&fetcher, &first)
        .with_display_zone(DisplayZone::Utc)
        .run(&sources)
        .unwrap();

    let second = CollectingSink::default();
    Dispatcher::new(&fetcher, &second)
        .with_display_zone(DisplayZone::Utc)
        .with_max_workers(Some(2))
        .run(&sources)
        .unwrap();

    assert_eq!(first.by_id(), second.by_id());
}
