//! Shared helpers for integration tests.
//!
//! - `logger`: per-test structured logging
//! - `log_capture`: tracing capture for asserting on the crate's log lines
//!
//! Data fixtures live in `reip::test_utils`.

pub mod log_capture;
pub mod logger;
