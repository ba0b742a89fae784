//! Error types for reip.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into seven categories:
//! - **Validation**: Malformed input, rejected before any network call
//! - **Authentication**: Credential or token failures
//! - **Transient**: Timeouts, connection failures and 5xx responses
//! - **RateLimit**: Upstream quota signals and the local monthly limit
//! - **Upstream**: Other API rejections and undecodable responses
//! - **Configuration**: Config or secrets file problems
//! - **Internal**: Unexpected errors, bugs, or unclassified issues
//!
//! Each error has a stable error code (e.g., `REIP-A001`) for programmatic handling.
//!
//! ## User-facing messages
//!
//! [`PortalError::user_message()`] renders the text shown to end users. It
//! never includes upstream response bodies or credential material; the
//! `Display` impl follows the same rule so errors are safe to log.

pub mod suggestions;

use std::time::Duration;
use thiserror::Error;

pub use suggestions::FixSuggestion;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input (not retried, surfaced immediately).
    Validation,
    /// Credential or token failure.
    Authentication,
    /// Network or 5xx failure (retried with backoff).
    Transient,
    /// Quota exceeded (never retried automatically).
    RateLimit,
    /// Upstream rejected the request or sent something unreadable.
    Upstream,
    /// Configuration or secrets problems.
    Configuration,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Validation error",
            Self::Authentication => "Authentication error",
            Self::Transient => "Temporary failure",
            Self::RateLimit => "Rate limit",
            Self::Upstream => "Upstream error",
            Self::Configuration => "Configuration error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Validation => "V",
            Self::Authentication => "A",
            Self::Transient => "T",
            Self::RateLimit => "R",
            Self::Upstream => "U",
            Self::Configuration => "C",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the `reip` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Configuration or secrets problem
    ConfigError = 2,
    /// Invalid input
    InvalidInput = 3,
    /// Timeout or exhausted retries
    Timeout = 4,
    /// Authentication failed
    AuthFailed = 5,
    /// Rate limited or over quota
    RateLimited = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for reip operations.
///
/// Each variant has:
/// - A stable error code (e.g., `REIP-A001`)
/// - A category for classification
/// - A retryable flag for retry logic
#[derive(Error, Debug)]
pub enum PortalError {
    // ==========================================================================
    // Validation errors (Category: Validation)
    // ==========================================================================
    /// Input failed validation before any request was made.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    // ==========================================================================
    // Authentication errors (Category: Authentication)
    // ==========================================================================
    /// The service rejected our credentials or token.
    #[error("authentication rejected by {service}")]
    AuthRejected { service: String },

    /// The login endpoint could not be reached after retries.
    #[error("login endpoint for {service} unreachable: {reason}")]
    AuthUnavailable { service: String, reason: String },

    /// No credentials are configured for the service.
    #[error("authentication not configured for {service}")]
    AuthNotConfigured { service: String },

    // ==========================================================================
    // Transient errors (Category: Transient)
    // ==========================================================================
    /// Request timed out.
    #[error("request to {service} timed out after {seconds}s")]
    Timeout { service: String, seconds: u64 },

    /// Connection-level failure (DNS, refused, reset).
    #[error("network error talking to {service}: {reason}")]
    Network { service: String, reason: String },

    /// Upstream answered with a 5xx status.
    #[error("{service} returned server error {status}")]
    ServerError { service: String, status: u16 },

    /// Transient failures persisted through every retry attempt.
    #[error("{service} still failing after {attempts} attempt(s): {last}")]
    Transient {
        service: String,
        attempts: u32,
        last: String,
    },

    // ==========================================================================
    // Rate limit errors (Category: RateLimit)
    // ==========================================================================
    /// Upstream signalled that our quota is exhausted.
    #[error("rate limited by {service}")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    /// The user's monthly lookup allowance is used up.
    #[error("monthly API limit reached ({used}/{limit})")]
    QuotaExceeded { used: u32, limit: u32 },

    // ==========================================================================
    // Upstream errors (Category: Upstream)
    // ==========================================================================
    /// Upstream rejected the request with a non-retryable client error.
    #[error("{service} rejected the request with HTTP {status}")]
    Api { service: String, status: u16 },

    /// Failed to decode the upstream response.
    #[error("failed to parse response from {service}: {message}")]
    ParseResponse { service: String, message: String },

    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error parsing a config or secrets file.
    #[error("parse error in {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// A required secret is absent or empty.
    #[error("missing secret '{key}'")]
    SecretMissing { key: String },

    // ==========================================================================
    // Internal errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PortalError {
    /// Shorthand for a [`PortalError::Validation`].
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Map error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self.category() {
            ErrorCategory::Validation => ExitCode::InvalidInput,
            ErrorCategory::Authentication => ExitCode::AuthFailed,
            ErrorCategory::Transient => ExitCode::Timeout,
            ErrorCategory::RateLimit => ExitCode::RateLimited,
            ErrorCategory::Configuration => ExitCode::ConfigError,
            ErrorCategory::Upstream | ErrorCategory::Internal => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,

            Self::AuthRejected { .. }
            | Self::AuthUnavailable { .. }
            | Self::AuthNotConfigured { .. } => ErrorCategory::Authentication,

            Self::Timeout { .. }
            | Self::Network { .. }
            | Self::ServerError { .. }
            | Self::Transient { .. } => ErrorCategory::Transient,

            Self::RateLimited { .. } | Self::QuotaExceeded { .. } => ErrorCategory::RateLimit,

            Self::Api { .. } | Self::ParseResponse { .. } => ErrorCategory::Upstream,

            Self::Config(_) | Self::ConfigParse { .. } | Self::SecretMissing { .. } => {
                ErrorCategory::Configuration
            }

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `REIP-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "REIP-V001",

            Self::AuthRejected { .. } => "REIP-A001",
            Self::AuthUnavailable { .. } => "REIP-A002",
            Self::AuthNotConfigured { .. } => "REIP-A003",

            Self::Timeout { .. } => "REIP-T001",
            Self::Network { .. } => "REIP-T002",
            Self::ServerError { .. } => "REIP-T003",
            Self::Transient { .. } => "REIP-T010",

            Self::RateLimited { .. } => "REIP-R001",
            Self::QuotaExceeded { .. } => "REIP-R002",

            Self::Api { .. } => "REIP-U001",
            Self::ParseResponse { .. } => "REIP-U002",

            Self::Config(_) => "REIP-C001",
            Self::ConfigParse { .. } => "REIP-C002",
            Self::SecretMissing { .. } => "REIP-C003",

            Self::Io(_) => "REIP-X001",
            Self::Json(_) => "REIP-X002",
            Self::Other(_) => "REIP-X099",
        }
    }

    /// Whether a single failed attempt is worth another try inside the
    /// retry loop.
    ///
    /// Only timeouts, connection failures and 5xx responses qualify. Rate
    /// limits are never retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Network { .. } | Self::ServerError { .. }
        )
    }

    /// Returns the retry-after duration if this error specifies one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns the service name if this error is service-specific.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::AuthRejected { service }
            | Self::AuthUnavailable { service, .. }
            | Self::AuthNotConfigured { service }
            | Self::Timeout { service, .. }
            | Self::Network { service, .. }
            | Self::ServerError { service, .. }
            | Self::Transient { service, .. }
            | Self::RateLimited { service, .. }
            | Self::Api { service, .. }
            | Self::ParseResponse { service, .. } => Some(service),
            _ => None,
        }
    }

    /// Human-readable message for the UI.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::AuthRejected { service } => {
                format!("Sign-in to {service} was rejected. Check your credentials.")
            }
            Self::AuthUnavailable { service, .. } => {
                format!("Could not reach {service} to sign in. Please try again shortly.")
            }
            Self::AuthNotConfigured { service } => {
                format!("Credentials for {service} are not configured.")
            }
            Self::Timeout { service, .. }
            | Self::Network { service, .. }
            | Self::ServerError { service, .. }
            | Self::Transient { service, .. } => {
                format!("{service} is temporarily unavailable. Please try again.")
            }
            Self::RateLimited {
                service,
                retry_after: Some(after),
            } => format!(
                "{service} rate limit reached. Please try again in {} seconds.",
                after.as_secs()
            ),
            Self::RateLimited { service, .. } => {
                format!("{service} rate limit reached. Please try again later.")
            }
            Self::QuotaExceeded { used, limit } => format!(
                "Monthly API limit reached ({used}/{limit}). Upgrade your plan or wait until next month."
            ),
            Self::Api { service, status } => {
                format!("{service} could not process the request (HTTP {status}).")
            }
            Self::ParseResponse { service, .. } => {
                format!("Received an unexpected response from {service}.")
            }
            Self::Config(msg) => format!("Configuration error: {msg}"),
            Self::ConfigParse { path, .. } => format!("Could not read {path}."),
            Self::SecretMissing { key } => {
                format!("Missing secret '{key}' in the secrets file.")
            }
            Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                "An internal error occurred.".to_string()
            }
        }
    }

    /// Returns actionable fix suggestions for this error.
    #[must_use]
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        match self {
            Self::Validation { field, message } => {
                suggestions::validation_suggestions(field, message)
            }
            Self::AuthRejected { service } | Self::AuthNotConfigured { service } => {
                suggestions::auth_suggestions(service)
            }
            Self::AuthUnavailable { service, .. }
            | Self::Network { service, .. }
            | Self::Timeout { service, .. }
            | Self::ServerError { service, .. }
            | Self::Transient { service, .. } => suggestions::transient_suggestions(service),
            Self::RateLimited {
                service,
                retry_after,
            } => suggestions::rate_limited_suggestions(service, *retry_after),
            Self::QuotaExceeded { used, limit } => suggestions::quota_suggestions(*used, *limit),
            Self::Api { service, status } => suggestions::api_error_suggestions(service, *status),
            Self::ParseResponse { service, .. } => {
                vec![FixSuggestion::new(
                    vec!["reip check --online".to_string()],
                    format!("{service} returned data in an unexpected shape. The API may have changed."),
                )]
            }
            Self::Config(_) | Self::ConfigParse { .. } => suggestions::config_suggestions(),
            Self::SecretMissing { key } => suggestions::secret_missing_suggestions(key),
            Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                vec![FixSuggestion::new(
                    vec!["reip check".to_string()],
                    "Unexpected error. Re-run with --verbose and report the log if it persists.",
                )]
            }
        }
    }
}

/// Result type alias for reip operations.
pub type Result<T> = std::result::Result<T, PortalError>;

// =============================================================================
// Tests
// =============================================================================
