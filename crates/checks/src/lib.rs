//! Checks crate: Healthchecks.io API client and declarative check management.
#![allow(clippy::uninlined_format_args)]
/// Check payload and ping URL helpers
pub mod check;
/// Dispatch of a desired state to a single API call
pub mod checks;
/// Healthchecks.io API client
pub mod client;
/// Retry helpers for HTTP operations
pub mod retry;

pub use check::{Check, uuid_from_ping_url};
pub use checks::{Checks, Outcome};
pub use client::{ApiResponse, Client};
