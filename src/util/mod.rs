//! Utility functions.

pub mod env;
pub mod format;
pub mod redact;
pub mod time;

pub use format::{format_cents, format_currency, format_optional, format_percent};
pub use redact::{Secret, fingerprint, truncate_body};
pub use time::{format_relative_time, month_start};
