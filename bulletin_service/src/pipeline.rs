//! Per-source workers and the dispatcher that runs them.
//!
//! A run launches one worker per configured source onto a pool of scoped
//! threads. Each worker walks `Dispatched → Fetching → Parsing → Rendering
//! → Done` on its own, hands its report to the sink, and then sends one
//! completion signal. The dispatcher counts those signals in a
//! [`RunBarrier`] and returns only once every source has signalled.
//!
//! Workers share nothing mutable: sources are borrowed read-only from the
//! caller, and the barrier lives on the dispatcher's thread.

use crate::ingest::fetch::Fetch;
use crate::ingest::{usgs, wunderground};
use crate::logging::{self, DataSource};
use crate::model::{Report, ReportError, SourceDescriptor, SourceKind, StationObservation};
use crate::output::ReportSink;
use crate::report;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("Source id {0} appears more than once; refusing to run")]
    DuplicateSource(String),
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Dispatched,
    Fetching,
    Parsing,
    Rendering,
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Dispatched => write!(f, "dispatched"),
            WorkerState::Fetching => write!(f, "fetching"),
            WorkerState::Parsing => write!(f, "parsing"),
            WorkerState::Rendering => write!(f, "rendering"),
            WorkerState::Done => write!(f, "done"),
        }
    }
}

/// Timezone station observation times are read out in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    /// The host's local zone, as configured for the repeater.
    #[default]
    Local,
    Utc,
}

impl DisplayZone {
    fn render_station(self, label: &str, obs: &StationObservation) -> String {
        match self {
            DisplayZone::Local => report::render_station(label, obs, &chrono::Local),
            DisplayZone::Utc => report::render_station(label, obs, &chrono::Utc),
        }
    }
}

/// Fetch → parse → render for a single source. Always yields a report.
struct Worker<'a> {
    source: &'a SourceDescriptor,
    source_id: String,
    state: WorkerState,
}

impl<'a> Worker<'a> {
    fn new(source: &'a SourceDescriptor) -> Self {
        Self {
            source,
            source_id: source.source_id(),
            state: WorkerState::Dispatched,
        }
    }

    fn enter(&mut self, next: WorkerState) {
        logging::debug(
            self.source.kind.into(),
            Some(&self.source_id),
            &format!("{} -> {}", self.state, next),
        );
        self.state = next;
    }

    fn run(mut self, fetcher: &dyn Fetch, zone: DisplayZone) -> Report {
        let source = self.source;
        let report = match source.kind {
            SourceKind::Gauge => {
                let outcome = self.fetch_and_parse(fetcher, usgs::parse_rdb);
                self.enter(WorkerState::Rendering);
                report::finish(source, &outcome, |obs| report::render_gauge(&source.label, obs))
            }
            SourceKind::Station => {
                let outcome = self.fetch_and_parse(fetcher, wunderground::parse_conditions);
                self.enter(WorkerState::Rendering);
                report::finish(source, &outcome, |obs| zone.render_station(&source.label, obs))
            }
        };
        self.enter(WorkerState::Done);
        report
    }

    fn fetch_and_parse<T>(
        &mut self,
        fetcher: &dyn Fetch,
        parse: fn(&str) -> Result<T, ReportError>,
    ) -> Result<T, ReportError> {
        self.enter(WorkerState::Fetching);
        let url = request_url(self.source);
        let body = fetcher.fetch(&url).inspect_err(|e| self.log_failure("Fetch", e))?;

        self.enter(WorkerState::Parsing);
        parse(&body).inspect_err(|e| self.log_failure("Parse", e))
    }

    fn log_failure(&self, operation: &str, err: &ReportError) {
        logging::log_source_failure(self.source.kind, &self.source_id, operation, err);
    }
}

/// Fully-qualified request URL for a source.
pub fn request_url(source: &SourceDescriptor) -> String {
    match source.kind {
        SourceKind::Gauge => usgs::build_gauge_url(&source.remote_id),
        SourceKind::Station => {
            let key = source.credential.as_deref().unwrap_or_default();
            wunderground::build_station_url(key, &source.source_id())
        }
    }
}

// ---------------------------------------------------------------------------
// Barrier
// ---------------------------------------------------------------------------

/// Outstanding-worker counts per source collection.
///
/// Owned by the dispatcher; workers never see it, they only send the
/// completion signal it counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunBarrier {
    outstanding: BTreeMap<SourceKind, usize>,
}

impl RunBarrier {
    pub fn for_sources(sources: &[SourceDescriptor]) -> Self {
        let mut outstanding = BTreeMap::new();
        for source in sources {
            *outstanding.entry(source.kind).or_insert(0) += 1;
        }
        Self { outstanding }
    }

    /// Counts one finished worker. Returns `false` for a signal nobody
    /// was waiting on.
    pub fn signal(&mut self, kind: SourceKind) -> bool {
        match self.outstanding.get_mut(&kind) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn outstanding(&self, kind: SourceKind) -> usize {
        self.outstanding.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding.values().all(|&count| count == 0)
    }
}

/// What a worker sends back once its report has been handed off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub kind: SourceKind,
    pub source_id: String,
    pub is_fallback: bool,
}

/// Completions in the order they arrived.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub completions: Vec<Completion>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.completions.len()
    }

    pub fn fallbacks(&self) -> usize {
        self.completions.iter().filter(|c| c.is_fallback).count()
    }

    pub fn live(&self) -> usize {
        self.total() - self.fallbacks()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher<'a> {
    fetcher: &'a dyn Fetch,
    sink: &'a dyn ReportSink,
    max_workers: Option<usize>,
    zone: DisplayZone,
}

impl<'a> Dispatcher<'a> {
    pub fn new(fetcher: &'a dyn Fetch, sink: &'a dyn ReportSink) -> Self {
        Self {
            fetcher,
            sink,
            max_workers: None,
            zone: DisplayZone::default(),
        }
    }

    /// Caps the number of threads; `None` runs every source at once.
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_display_zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    /// Runs one worker per source and blocks until all have signalled.
    pub fn run(&self, sources: &[SourceDescriptor]) -> Result<RunSummary, DispatchError> {
        let mut seen = HashSet::new();
        for source in sources {
            let id = source.source_id();
            if !seen.insert(id.clone()) {
                return Err(DispatchError::DuplicateSource(id));
            }
        }

        let mut barrier = RunBarrier::for_sources(sources);
        let mut summary = RunSummary::default();
        if sources.is_empty() {
            return Ok(summary);
        }

        let pool_size = self.max_workers.unwrap_or(sources.len()).clamp(1, sources.len());
        logging::info(
            DataSource::System,
            None,
            &format!(
                "Dispatching {} gauges and {} stations on {} workers",
                barrier.outstanding(SourceKind::Gauge),
                barrier.outstanding(SourceKind::Station),
                pool_size
            ),
        );

        let next = AtomicUsize::new(0);
        let (done_tx, done_rx) = mpsc::channel::<Completion>();

        thread::scope(|scope| {
            for _ in 0..pool_size {
                let done_tx = done_tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        let Some(source) = sources.get(next.fetch_add(1, Ordering::Relaxed)) else {
                            break;
                        };
                        let completion = self.handle(source);
                        // The receiver outlives every worker inside the scope.
                        let _ = done_tx.send(completion);
                    }
                });
            }
            drop(done_tx);

            while !barrier.is_complete() {
                let Ok(completion) = done_rx.recv() else {
                    break;
                };
                if !barrier.signal(completion.kind) {
                    logging::error(
                        DataSource::System,
                        Some(&completion.source_id),
                        "Unexpected completion signal",
                    );
                }
                summary.completions.push(completion);
            }
        });

        logging::log_run_summary(summary.total(), summary.live(), summary.fallbacks());
        Ok(summary)
    }

    fn handle(&self, source: &SourceDescriptor) -> Completion {
        let report = Worker::new(source).run(self.fetcher, self.zone);

        if let Err(e) = self.sink.deliver(&report) {
            logging::error(DataSource::Output, Some(&report.source_id), &e.to_string());
        }

        Completion {
            kind: source.kind,
            source_id: report.source_id,
            is_fallback: report.is_fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
