//! Spoken river-gauge and weather-station bulletins for a radio repeater.
//!
//! Each run fetches every configured source concurrently, turns its data
//! into one sentence, and hands that sentence to the output stage, which
//! writes a text file and a playable wav per source.

pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod report;
