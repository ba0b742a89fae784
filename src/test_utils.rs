//! Test utilities for reip.
//!
//! Fixture builders for secrets, tokens and upstream payloads, a temporary
//! directory helper and assertion macros shared by unit and integration
//! tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use reip::test_utils::*;
//!
//! let server = wiremock::MockServer::start().await;
//! let clock = make_test_clock();
//! let portal = make_test_portal(&server.uri(), clock.clone());
//! ```

use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::core::clock::{ManualClock, SharedClock};
use crate::core::token::UserSession;
use crate::services::Portal;
use crate::storage::config::Config;
use crate::storage::secrets::CredentialStore;

// =============================================================================
// Test Data Factories
// =============================================================================

/// Fixed "now" used by test clocks: 2026-03-15 12:00 UTC.
#[must_use]
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_773_576_000, 0).expect("valid timestamp")
}

/// A manual clock starting at [`test_now`].
#[must_use]
pub fn make_test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(test_now()))
}

/// A secrets document with every service pointing at `base_url`.
#[must_use]
pub fn make_test_secrets_toml(base_url: &str) -> String {
    format!(
        r#"[wordpress]
base_url = "{base_url}"
username = "agent"
password = "hunter2-password"

[woocommerce]
consumer_key = "ck_test_key"
consumer_secret = "cs_test_secret"

[rentcast]
api_key = "rc-test-api-key"
base_url = "{base_url}"

[supabase]
url = "{base_url}"
key = "sb-test-service-key"
"#
    )
}

/// Parsed [`make_test_secrets_toml`].
///
/// # Panics
///
/// Panics if the fixture does not parse.
#[must_use]
pub fn make_test_credential_store(base_url: &str) -> CredentialStore {
    CredentialStore::parse(&make_test_secrets_toml(base_url), "test secrets")
        .expect("test secrets parse")
}

/// Default config with millisecond backoff so retry tests stay fast.
#[must_use]
pub fn make_test_config() -> Config {
    let mut config = Config::default();
    config.http.timeout_seconds = 5;
    config.http.base_delay_ms = 1;
    config.http.max_delay_ms = 5;
    config
}

/// A portal wired to `base_url` for every service.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn make_test_portal(base_url: &str, clock: Arc<ManualClock>) -> Portal {
    make_test_portal_with(&make_test_credential_store(base_url), make_test_config(), clock)
}

/// A portal over explicit credentials and config.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn make_test_portal_with(store: &CredentialStore, config: Config, clock: Arc<ManualClock>) -> Portal {
    let clock: SharedClock = clock;
    Portal::new(store, config, clock).expect("portal builds")
}

/// An unsigned JWT carrying `exp` and the identity user id.
#[must_use]
pub fn make_test_jwt(user_id: u64, exp: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = json!({
        "iss": "https://shop.example.com",
        "exp": exp.timestamp(),
        "data": {"user": {"id": user_id.to_string()}}
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.test-signature")
}

/// Body of a successful JWT login response.
#[must_use]
pub fn make_test_login_response(token: &str) -> Value {
    json!({
        "token": token,
        "user_email": "jane@example.com",
        "user_nicename": "jane",
        "user_display_name": "Jane Doe"
    })
}

/// A `/wp/v2/users/me` profile for `user_id`.
#[must_use]
pub fn make_test_current_user(user_id: u64) -> Value {
    json!({
        "id": user_id,
        "name": "Jane Doe",
        "slug": "jane"
    })
}

/// The session a login with [`make_test_login_response`] produces.
#[must_use]
pub fn make_test_session(user_id: &str) -> UserSession {
    UserSession {
        user_id: user_id.to_string(),
        email: Some("jane@example.com".to_string()),
        display_name: Some("Jane Doe".to_string()),
    }
}

/// A `/properties` response with one record.
#[must_use]
pub fn make_test_property_json() -> Value {
    json!([{
        "id": "123-Main-St,-Springfield,-IL-62701",
        "formattedAddress": "123 Main St, Springfield, IL 62701",
        "addressLine1": "123 Main St",
        "city": "Springfield",
        "state": "IL",
        "zipCode": "62701",
        "county": "Sangamon",
        "propertyType": "Single Family",
        "bedrooms": 3,
        "bathrooms": 2,
        "squareFootage": 1600,
        "lotSize": 6500,
        "yearBuilt": 2018,
        "lastSalePrice": 240000,
        "lastSaleDate": "2024-06-01T00:00:00.000Z",
        "latitude": 39.78,
        "longitude": -89.65
    }])
}

/// One order in the commerce API's shape.
#[must_use]
pub fn make_test_order_json(id: u64, status: &str, total: &str, date_created: &str) -> Value {
    json!({
        "id": id,
        "number": id.to_string(),
        "status": status,
        "total": total,
        "currency": "USD",
        "date_created": date_created,
        "customer_id": 42,
        "line_items": [{"name": "Market report", "quantity": 1, "total": total}]
    })
}

// =============================================================================
// Temporary Directory
// =============================================================================

/// An isolated temporary directory, removed on drop.
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file with `content`, creating parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
        path
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string does NOT contain a substring.
#[macro_export]
macro_rules! assert_not_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string is valid JSON.
#[macro_export]
macro_rules! assert_json_valid {
    ($json:expr) => {
        let json = $json;
        if let Err(e) = serde_json::from_str::<serde_json::Value>(json) {
            panic!(
                "Expected valid JSON, but parsing failed: {}\n\nJSON string:\n{}",
                e, json
            );
        }
    };
}

/// Assert approximate floating point equality.
#[macro_export]
macro_rules! assert_float_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_float_eq!($left, $right, f64::EPSILON * 100.0)
    };
    ($left:expr, $right:expr, $epsilon:expr) => {
        let left: f64 = $left;
        let right: f64 = $right;
        let epsilon: f64 = $epsilon;
        assert!(
            (left - right).abs() < epsilon,
            "Float equality assertion failed: {} != {} (epsilon: {})",
            left,
            right,
            epsilon
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::secrets::Service;

    #[test]
    fn fixture_secrets_configure_every_service() {
        let store = make_test_credential_store("http://127.0.0.1:1");
        assert!(store.missing_services().is_empty());
        assert_eq!(
            store.get(Service::PropertyData).unwrap().base_url,
            "http://127.0.0.1:1"
        );
    }

    #[test]
    fn fixture_config_is_valid() {
        make_test_config().validate().unwrap();
    }

    #[test]
    fn test_dir_round_trip() {
        let dir = TestDir::new();
        let path = dir.create_file("nested/a.toml", "x = 1");
        assert!(path.exists());
        assert_eq!(dir.read_file("nested/a.toml").unwrap(), "x = 1");
    }

    #[test]
    fn float_macro_accepts_epsilon() {
        assert_float_eq!(0.1 + 0.2, 0.3);
        assert_float_eq!(70.0, 70.05, 0.1);
    }
}
