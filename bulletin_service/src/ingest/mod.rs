/// Retrieval and parsing of upstream source data.
///
/// Submodules:
/// - `fetch` — the HTTP fetcher shared by every worker.
/// - `usgs` — USGS river gauge RDB tables.
/// - `wunderground` — Weather Underground station conditions JSON.

pub mod fetch;
pub mod usgs;
pub mod wunderground;
