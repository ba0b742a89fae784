//! Fix suggestions for reip errors.
//!
//! Maps error variants to commands and short explanations that help the
//! user recover. Nothing here may echo secret values back to the user.

use std::time::Duration;

// =============================================================================
// Fix Suggestion Types
// =============================================================================

/// A fix suggestion for an error.
#[derive(Debug, Clone)]
pub struct FixSuggestion {
    /// Commands to try, in order of preference.
    pub commands: Vec<String>,

    /// Explanation of why this error occurred.
    pub context: String,

    /// Tips to prevent this error in the future.
    pub prevention: Option<String>,
}

impl FixSuggestion {
    /// Creates a new fix suggestion with required fields.
    #[must_use]
    pub fn new(commands: Vec<String>, context: impl Into<String>) -> Self {
        Self {
            commands,
            context: context.into(),
            prevention: None,
        }
    }

    /// Builder: adds prevention tips.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }
}

// =============================================================================
// Per-category suggestions
// =============================================================================

pub fn validation_suggestions(field: &str, message: &str) -> Vec<FixSuggestion> {
    let example = match field {
        "address" => "reip lookup \"123 Main St, Springfield, IL\"",
        "customer" => "reip orders --customer 42",
        _ => "reip --help",
    };
    vec![FixSuggestion::new(
        vec![example.to_string()],
        format!("The {field} value was rejected: {message}"),
    )]
}

pub fn auth_suggestions(service: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["reip check".to_string(), "reip whoami".to_string()],
            format!("{service} did not accept the configured credentials."),
        )
        .with_prevention(format!(
            "Keep the [{service}] section of secrets.toml in sync with the account on the service."
        )),
    ]
}

pub fn transient_suggestions(service: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["reip check --online".to_string()],
            format!("{service} did not respond successfully, even after retries."),
        )
        .with_prevention("Raise http.max_attempts or http.timeout_seconds in config.toml on slow links."),
    ]
}

pub fn rate_limited_suggestions(service: &str, retry_after: Option<Duration>) -> Vec<FixSuggestion> {
    let context = retry_after.map_or_else(
        || format!("{service} reported that the request quota is exhausted."),
        |d| {
            format!(
                "{service} reported that the request quota is exhausted. Retry in {} seconds.",
                d.as_secs()
            )
        },
    );
    vec![
        FixSuggestion::new(vec!["reip usage".to_string()], context)
            .with_prevention("Repeated property lookups within two hours are served from cache."),
    ]
}

pub fn quota_suggestions(used: u32, limit: u32) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["reip usage".to_string()],
        format!("{used} of {limit} monthly property lookups are used."),
    )]
}

pub fn api_error_suggestions(service: &str, status: u16) -> Vec<FixSuggestion> {
    let context = match status {
        403 => format!("{service} refused access (HTTP 403). The key may lack permissions."),
        404 => format!("{service} has no such resource (HTTP 404)."),
        _ => format!("{service} rejected the request (HTTP {status})."),
    };
    vec![FixSuggestion::new(vec!["reip check --online".to_string()], context)]
}

pub fn config_suggestions() -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["reip check".to_string()],
        "The configuration file could not be used. Fix the reported key and retry.",
    )]
}

pub fn secret_missing_suggestions(key: &str) -> Vec<FixSuggestion> {
    let (section, field) = key.split_once('.').unwrap_or((key, ""));
    vec![FixSuggestion::new(
        vec!["reip check".to_string()],
        format!("Add `{field} = \"...\"` under [{section}] in secrets.toml."),
    )]
}
