/// HTTP retrieval of raw source payloads.
///
/// One blocking GET per call, no retry. The `Fetch` trait is the seam the
/// pipeline uses so tests can serve canned payloads.

use crate::model::ReportError;
use std::time::Duration;

/// Anything that can turn a URL into a response body.
///
/// Implementations are shared by every worker in a run, so they must be
/// `Sync`.
pub trait Fetch: Sync {
    fn fetch(&self, url: &str) -> Result<String, ReportError>;
}

/// Production fetcher backed by a blocking reqwest client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bulletin_service/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, ReportError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ReportError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReportError::HttpStatus(response.status().as_u16()));
        }

        response
            .text()
            .map_err(|e| ReportError::BodyRead(e.to_string()))
    }
}
