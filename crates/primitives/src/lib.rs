//! Core primitives shared by the healthchecks crates.
/// Retry helpers with exponential backoff
pub mod retries;
