//! ci-explain library crate
//!
//! Exposes the extractor, normalizer and diagnosis pipeline so benchmarks and
//! external tooling can run them without going through CLI startup.

pub mod classify;
pub mod config;
pub mod diagnose;
pub mod extract;
pub mod llm;
pub mod report;
pub mod util;
