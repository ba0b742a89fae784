//! Bearer token lifecycle for the identity service.
//!
//! Tokens come from the JWT login endpoint
//! (`POST {base_url}/wp-json/jwt-auth/v1/token`). The current token is held
//! behind an `RwLock<Option<Arc<AuthToken>>>` and replaced wholesale on each
//! login, so readers always see a complete token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::clock::SharedClock;
use super::http::{read_response, transport_error};
use super::retry::RetryPolicy;
use crate::error::{PortalError, Result};
use crate::storage::config::Config;
use crate::storage::secrets::{Credentials, Service};
use crate::util::Secret;

/// Login path below the identity base URL.
pub const LOGIN_PATH: &str = "/wp-json/jwt-auth/v1/token";

/// Profile of the signed-in user; requires the bearer token.
pub const CURRENT_USER_PATH: &str = "/wp-json/wp/v2/users/me";

/// A bearer token and its validity window.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub value: Secret,
    pub issued_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl AuthToken {
    /// Usable at `now` if it stays valid for at least `skew` longer.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>, skew: TimeDelta) -> bool {
        now + skew < self.expiry
    }
}

/// Who is signed in, as reported by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user_email: Option<String>,
    user_nicename: Option<String>,
    user_display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
    data: Option<JwtData>,
}

#[derive(Debug, Deserialize)]
struct JwtData {
    user: Option<JwtUser>,
}

#[derive(Debug, Deserialize)]
struct JwtUser {
    id: Option<Value>,
}

/// Decode the (unverified) claims segment of a JWT. Opaque tokens yield
/// default claims.
fn decode_claims(token: &str) -> JwtClaims {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_sig)) = (parts.next(), parts.next(), parts.next())
    else {
        return JwtClaims::default();
    };
    URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Owns the identity credentials and the current token.
#[derive(Debug)]
pub struct TokenManager {
    credentials: Credentials,
    client: Client,
    clock: SharedClock,
    retry: RetryPolicy,
    timeout: Duration,
    token_ttl: TimeDelta,
    refresh_skew: TimeDelta,
    current: RwLock<Option<Arc<AuthToken>>>,
    session: RwLock<Option<UserSession>>,
    logins: AtomicU64,
}

impl TokenManager {
    #[must_use]
    pub fn new(credentials: Credentials, client: Client, clock: SharedClock, config: &Config) -> Self {
        Self {
            credentials,
            client,
            clock,
            retry: config.http.retry_policy(),
            timeout: config.http.timeout(),
            token_ttl: seconds(config.auth.token_ttl_seconds),
            refresh_skew: seconds(config.auth.refresh_skew_seconds),
            current: RwLock::new(None),
            session: RwLock::new(None),
            logins: AtomicU64::new(0),
        }
    }

    /// The cached token if still usable, otherwise a fresh one.
    ///
    /// # Errors
    ///
    /// `AuthRejected` when the login endpoint refuses the credentials,
    /// `AuthUnavailable` when it cannot be reached after retries.
    pub async fn get_valid_token(&self) -> Result<Arc<AuthToken>> {
        let now = self.clock.now();
        let cached = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(token) = cached
            && token.is_usable_at(now, self.refresh_skew)
        {
            return Ok(token);
        }
        self.refresh().await
    }

    /// Log in again regardless of the cached token.
    pub async fn refresh(&self) -> Result<Arc<AuthToken>> {
        let service = Service::Identity;
        let result = self
            .retry
            .run(service.name(), move |attempt| self.login_once(attempt))
            .await;

        let (response, attempts) = match result {
            Ok(ok) => ok,
            Err(PortalError::Transient { last, .. }) => {
                return Err(PortalError::AuthUnavailable {
                    service: service.name().to_string(),
                    reason: last,
                });
            }
            Err(PortalError::Api {
                status: 400 | 403, ..
            }) => {
                return Err(PortalError::AuthRejected {
                    service: service.name().to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let issued_at = self.clock.now();
        let claims = decode_claims(&response.token);
        let expiry = claims
            .exp
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .unwrap_or(issued_at + self.token_ttl);

        let user_id = claims
            .data
            .and_then(|d| d.user)
            .and_then(|u| u.id)
            .and_then(|id| match id {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .or_else(|| response.user_nicename.clone())
            .unwrap_or_else(|| self.credentials.key_or_username.clone());

        let token = Arc::new(AuthToken {
            value: Secret::new(response.token),
            issued_at,
            expiry,
        });
        // Never hand out a token that is already past (or inside) its expiry.
        if !token.is_usable_at(issued_at, self.refresh_skew) {
            tracing::warn!(
                service = service.name(),
                expiry = %token.expiry,
                now = %issued_at,
                "Login returned an expired token"
            );
            return Err(PortalError::AuthUnavailable {
                service: service.name().to_string(),
                reason: "login returned an expired token".to_string(),
            });
        }
        let session = UserSession {
            user_id,
            email: response.user_email,
            display_name: response.user_display_name,
        };

        tracing::info!(
            service = service.name(),
            user_id = %session.user_id,
            token = %token.value.fingerprint(),
            expiry = %token.expiry,
            attempts,
            "Obtained identity token"
        );

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&token));
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        self.logins.fetch_add(1, Ordering::Relaxed);
        Ok(token)
    }

    async fn login_once(&self, attempt: u32) -> Result<LoginResponse> {
        let service = Service::Identity;
        let url = format!("{}{LOGIN_PATH}", self.credentials.base_url);
        tracing::debug!(service = service.name(), attempt, "Logging in");

        let response = self
            .client
            .post(url)
            .json(&json!({
                "username": self.credentials.key_or_username,
                "password": self.credentials.secret_or_password.expose(),
            }))
            .send()
            .await
            .map_err(|e| transport_error(service, e, self.timeout))?;

        let body = read_response(service, response, self.timeout).await?;
        serde_json::from_value(body).map_err(|e| PortalError::ParseResponse {
            service: service.name().to_string(),
            message: e.to_string(),
        })
    }

    /// Session of the most recent successful login.
    #[must_use]
    pub fn session(&self) -> Option<UserSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the cached token so the next request logs in again.
    pub fn invalidate(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Successful logins so far.
    #[must_use]
    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::Relaxed)
    }
}

fn seconds(secs: u64) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
}
