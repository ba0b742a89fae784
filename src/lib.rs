//! reip - Real Estate Intelligence Portal
//!
//! Authenticated, cached and rate-aware access to a property data API, a
//! store's order API and a hosted backend, with thin domain facades and a
//! command-line front end.

// deny (not forbid) so test helpers can #[allow(unsafe_code)] for env var manipulation
#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod render;
pub mod services;
pub mod storage;
pub mod util;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ExitCode, PortalError, Result};
pub use services::Portal;

// Re-export test utilities for external test crates
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::*;
