/// Live USGS API tests
///
/// These make real requests to waterdata.usgs.gov and are ignored by
/// default. Run with: cargo test --test live_usgs -- --ignored
///
/// Failures here usually mean the network is down or the gauge is in
/// maintenance, not a parser bug; check the printed response first.

use bulletin_service::ingest::fetch::{Fetch, HttpFetcher};
use bulletin_service::ingest::usgs;
use bulletin_service::model::SourceDescriptor;
use bulletin_service::report;
use std::time::Duration;

#[test]
#[ignore]
fn test_live_gauge_parses_and_renders() {
    let fetcher = HttpFetcher::new(Duration::from_secs(30)).expect("Failed to create HTTP client");
    let gauge = SourceDescriptor::gauge(12150800, "Snohomish River near Monroe");

    let url = usgs::build_gauge_url(12150800);
    println!("Testing USGS API: {}", url);

    let body = fetcher
        .fetch(&url)
        .expect("USGS request failed - check network connectivity");

    match usgs::parse_rdb(&body) {
        Ok(obs) => {
            let text = report::render_gauge(&gauge.label, &obs);
            println!("✓ {}", text);
            assert!(text.contains("cubic feet per second"));
        }
        Err(e) => {
            eprintln!("\n⚠ WARNING: USGS returned no usable row for {}", gauge.source_id());
            eprintln!("  Error: {}", e);
            eprintln!("  First lines of response:");
            for line in body.lines().take(20) {
                eprintln!("    {}", line);
            }
            panic!("live gauge did not parse: {}", e);
        }
    }
}
