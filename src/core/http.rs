//! HTTP client wrapper.
//!
//! Every outbound call goes through [`ApiClient::call`], which
//! 1. serves cacheable requests from the [`ResponseCache`] while live,
//! 2. attaches the service's credentials,
//! 3. retries transient failures per [`RetryPolicy`],
//! 4. refreshes the bearer token once on a 401, and
//! 5. stores successful cacheable payloads.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_RANGE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;

use super::retry::RetryPolicy;
use super::token::TokenManager;
use crate::error::{PortalError, Result};
use crate::storage::cache::{ResponseCache, fingerprint};
use crate::storage::secrets::{Credentials, Service};
use crate::util::{Secret, truncate_body};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the property API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

const MAX_LOGGED_BODY: usize = 200;

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("reip/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PortalError::Config(format!("failed to build HTTP client: {}", e.without_url())))
}

// =============================================================================
// Authentication
// =============================================================================

/// How requests to one service are authenticated.
#[derive(Debug, Clone)]
pub enum Authenticator {
    /// Bearer token from the login endpoint; refreshable.
    Bearer(Arc<TokenManager>),
    /// Static key in a request header.
    ApiKey { header: &'static str, key: Secret },
    /// HTTP basic auth with a consumer key/secret pair.
    Basic { username: String, password: Secret },
    /// PostgREST style: `apikey` header plus the same key as bearer.
    Backend { key: Secret },
    Anonymous,
}

impl Authenticator {
    /// The scheme each service uses. The identity service needs `tokens`.
    #[must_use]
    pub fn for_credentials(credentials: &Credentials, tokens: Option<Arc<TokenManager>>) -> Self {
        match credentials.service {
            Service::Identity => tokens.map_or(Self::Anonymous, Self::Bearer),
            Service::Commerce => Self::Basic {
                username: credentials.key_or_username.clone(),
                password: credentials.secret_or_password.clone(),
            },
            Service::PropertyData => Self::ApiKey {
                header: API_KEY_HEADER,
                key: credentials.secret_or_password.clone(),
            },
            Service::Backend => Self::Backend {
                key: credentials.secret_or_password.clone(),
            },
        }
    }

    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        matches!(self, Self::Bearer(_))
    }

    async fn apply(&self, rb: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self {
            Self::Bearer(tokens) => {
                let token = tokens.get_valid_token().await?;
                rb.bearer_auth(token.value.expose())
            }
            Self::ApiKey { header, key } => rb.header(*header, key.expose()),
            Self::Basic { username, password } => rb.basic_auth(username, Some(password.expose())),
            Self::Backend { key } => rb.header("apikey", key.expose()).bearer_auth(key.expose()),
            Self::Anonymous => rb,
        })
    }

    async fn refresh(&self) -> Result<()> {
        if let Self::Bearer(tokens) = self {
            tokens.refresh().await?;
        }
        Ok(())
    }
}

// =============================================================================
// Requests and outcomes
// =============================================================================

/// One logical call against a registered service.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub service: Service,
    pub method: Method,
    /// Path below the service base URL, starting with `/`.
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(&'static str, String)>,
    /// Cache successful responses for this long. `None` disables caching.
    pub cache_ttl: Option<Duration>,
    /// Whether repeating the call is harmless. Non-idempotent calls get a
    /// single attempt.
    pub idempotent: bool,
}

impl ApiRequest {
    fn new(service: Service, method: Method, endpoint: impl Into<String>, idempotent: bool) -> Self {
        Self {
            service,
            method,
            endpoint: endpoint.into(),
            params: Vec::new(),
            body: None,
            headers: Vec::new(),
            cache_ttl: None,
            idempotent,
        }
    }

    #[must_use]
    pub fn get(service: Service, endpoint: impl Into<String>) -> Self {
        Self::new(service, Method::GET, endpoint, true)
    }

    #[must_use]
    pub fn post(service: Service, endpoint: impl Into<String>, body: Value) -> Self {
        let mut request = Self::new(service, Method::POST, endpoint, false);
        request.body = Some(body);
        request
    }

    #[must_use]
    pub fn delete(service: Service, endpoint: impl Into<String>) -> Self {
        Self::new(service, Method::DELETE, endpoint, true)
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub const fn cache_for(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Mark a write as safe to repeat (e.g. an upsert).
    #[must_use]
    pub const fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(self.service.name(), &self.endpoint, &self.params)
    }

    fn validate(&self) -> Result<()> {
        let endpoint = &self.endpoint;
        if !endpoint.starts_with('/')
            || endpoint.contains("..")
            || endpoint.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(PortalError::validation(
                "endpoint",
                format!("Malformed endpoint path \"{endpoint}\""),
            ));
        }
        for (key, value) in &self.params {
            if key.trim().is_empty() {
                return Err(PortalError::validation("params", "Empty query parameter name"));
            }
            if value.chars().any(char::is_control) {
                return Err(PortalError::validation(
                    key.clone(),
                    format!("Parameter {key} contains control characters"),
                ));
            }
        }
        Ok(())
    }
}

/// Result of a successful call.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub payload: Arc<Value>,
    pub from_cache: bool,
    /// When the payload entered the cache (cacheable calls only).
    pub stored_at: Option<DateTime<Utc>>,
    /// Upstream attempts made; 0 for a cache hit.
    pub attempts: u32,
    /// Whether a token refresh happened during the call.
    pub refreshed: bool,
    /// Row total from a `Content-Range` header, when the upstream sent one.
    pub total_count: Option<u64>,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug)]
struct Endpoint {
    base_url: String,
    auth: Authenticator,
}

/// Authenticated, retrying, caching client over all registered services.
#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    endpoints: HashMap<Service, Endpoint>,
    cache: Arc<ResponseCache>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ApiClient {
    #[must_use]
    pub fn new(client: Client, cache: Arc<ResponseCache>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            client,
            endpoints: HashMap::new(),
            cache,
            retry,
            timeout,
        }
    }

    /// Route `service` to `base_url` with the given authentication.
    pub fn register(&mut self, service: Service, base_url: impl Into<String>, auth: Authenticator) {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::debug!(service = service.name(), %base_url, "Registered service");
        self.endpoints.insert(service, Endpoint { base_url, auth });
    }

    #[must_use]
    pub fn is_registered(&self, service: Service) -> bool {
        self.endpoints.contains_key(&service)
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Execute `request`.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed requests, `AuthNotConfigured` for an
    /// unregistered service, `AuthRejected` after a failed refresh-and-retry,
    /// `RateLimited` on 429, `Transient` once retries are exhausted, `Api` for
    /// other client errors and `ParseResponse` for undecodable bodies.
    pub async fn call(&self, request: &ApiRequest) -> Result<CallOutcome> {
        request.validate()?;
        let service = request.service.name();

        let cache_key = request.cache_ttl.map(|_| request.fingerprint());
        if let (Some(ttl), Some(key)) = (request.cache_ttl, cache_key.as_deref())
            && let Some(entry) = self.cache.get(key, ttl)
        {
            tracing::debug!(service, endpoint = %request.endpoint, "Served from cache");
            return Ok(CallOutcome {
                payload: entry.value,
                from_cache: true,
                stored_at: Some(entry.stored_at),
                attempts: 0,
                refreshed: false,
                total_count: None,
            });
        }

        let endpoint = self
            .endpoints
            .get(&request.service)
            .ok_or_else(|| PortalError::AuthNotConfigured {
                service: service.to_string(),
            })?;

        let policy = if request.idempotent {
            self.retry
        } else {
            self.retry.single_attempt()
        };

        // Set when credentials could not be attached, e.g. the login itself
        // was refused. Such a rejection is final.
        let credentials_failed = AtomicBool::new(false);
        let mut refreshed = false;
        let mut attempts = 0;
        let (value, total_count) = loop {
            let flag = &credentials_failed;
            let result = policy
                .run(service, move |attempt| self.send_once(endpoint, request, attempt, flag))
                .await;
            match result {
                Ok((sent, used)) => {
                    attempts += used;
                    break sent;
                }
                Err(PortalError::AuthRejected { .. })
                    if !refreshed
                        && endpoint.auth.can_refresh()
                        && !credentials_failed.load(Ordering::Relaxed) =>
                {
                    tracing::info!(service, "Token rejected, refreshing once");
                    attempts += 1;
                    endpoint.auth.refresh().await?;
                    refreshed = true;
                }
                Err(err) => return Err(err),
            }
        };

        let payload = Arc::new(value);
        let stored_at = cache_key.map(|key| self.cache.put(&key, Arc::clone(&payload)).stored_at);

        Ok(CallOutcome {
            payload,
            from_cache: false,
            stored_at,
            attempts,
            refreshed,
            total_count,
        })
    }

    async fn send_once(
        &self,
        endpoint: &Endpoint,
        request: &ApiRequest,
        attempt: u32,
        credentials_failed: &AtomicBool,
    ) -> Result<(Value, Option<u64>)> {
        let service = request.service;
        let url = build_url(&endpoint.base_url, request)?;

        let mut rb = self.client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            rb = rb.header(*name, value);
        }
        if let Some(body) = &request.body {
            rb = rb.json(body);
        }
        let rb = match endpoint.auth.apply(rb).await {
            Ok(rb) => rb,
            Err(e) => {
                credentials_failed.store(true, Ordering::Relaxed);
                return Err(e);
            }
        };

        tracing::debug!(
            service = service.name(),
            method = %request.method,
            endpoint = %request.endpoint,
            attempt,
            "Sending request"
        );

        let response = rb
            .send()
            .await
            .map_err(|e| transport_error(service, e, self.timeout))?;
        let total_count = parse_content_range_total(response.headers());
        let value = read_response(service, response, self.timeout).await?;
        Ok((value, total_count))
    }
}

fn build_url(base_url: &str, request: &ApiRequest) -> Result<Url> {
    let mut url = Url::parse(&format!("{base_url}{}", request.endpoint))
        .map_err(|e| PortalError::validation("endpoint", format!("Invalid request URL: {e}")))?;
    if !request.params.is_empty() {
        url.query_pairs_mut().extend_pairs(
            request
                .params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
    }
    Ok(url)
}

// =============================================================================
// Response classification (shared with the token manager)
// =============================================================================

/// Map a reqwest transport failure. The URL is stripped because query
/// strings may carry user input.
pub(crate) fn transport_error(service: Service, err: reqwest::Error, timeout: Duration) -> PortalError {
    if err.is_timeout() {
        PortalError::Timeout {
            service: service.name().to_string(),
            seconds: timeout.as_secs(),
        }
    } else {
        PortalError::Network {
            service: service.name().to_string(),
            reason: err.without_url().to_string(),
        }
    }
}

/// Error for a non-success status, `None` for 2xx.
pub(crate) fn status_error(service: Service, status: StatusCode, headers: &HeaderMap) -> Option<PortalError> {
    let name = service.name().to_string();
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED => PortalError::AuthRejected { service: name },
        StatusCode::TOO_MANY_REQUESTS => PortalError::RateLimited {
            service: name,
            retry_after: parse_retry_after(headers),
        },
        s if s.is_server_error() => PortalError::ServerError {
            service: name,
            status: s.as_u16(),
        },
        s => PortalError::Api {
            service: name,
            status: s.as_u16(),
        },
    })
}

/// `Retry-After` in delta-seconds form.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Total from `Content-Range: 0-24/3573` or `*/3573`. `*` totals are unknown.
fn parse_content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit_once('/'))
        .and_then(|(_, total)| total.trim().parse().ok())
}

/// Classify the status and decode a JSON body. An empty body is `null`.
pub(crate) async fn read_response(service: Service, response: Response, timeout: Duration) -> Result<Value> {
    let status = response.status();
    if let Some(err) = status_error(service, status, response.headers()) {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(
            service = service.name(),
            status = status.as_u16(),
            body = %truncate_body(&body, MAX_LOGGED_BODY),
            "Upstream error response"
        );
        return Err(err);
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(service, e, timeout))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| PortalError::ParseResponse {
        service: service.name().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn status_classification() {
        let headers = HeaderMap::new();
        assert!(status_error(Service::PropertyData, StatusCode::OK, &headers).is_none());
        assert!(matches!(
            status_error(Service::PropertyData, StatusCode::UNAUTHORIZED, &headers),
            Some(PortalError::AuthRejected { .. })
        ));
        assert!(matches!(
            status_error(Service::PropertyData, StatusCode::BAD_GATEWAY, &headers),
            Some(PortalError::ServerError { status: 502, .. })
        ));
        assert!(matches!(
            status_error(Service::PropertyData, StatusCode::FORBIDDEN, &headers),
            Some(PortalError::Api { status: 403, .. })
        ));
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("17"));
        let err = status_error(Service::PropertyData, StatusCode::TOO_MANY_REQUESTS, &headers).unwrap();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(17)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn content_range_total() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_content_range_total(&headers), None);
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("0-24/3573"));
        assert_eq!(parse_content_range_total(&headers), Some(3573));
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("*/12"));
        assert_eq!(parse_content_range_total(&headers), Some(12));
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("0-24/*"));
        assert_eq!(parse_content_range_total(&headers), None);
    }

    #[test]
    fn url_encodes_params() {
        let request = ApiRequest::get(Service::PropertyData, "/properties")
            .param("address", "123 Main St, Springfield");
        let url = build_url("https://api.rentcast.io/v1", &request).unwrap();
        assert_eq!(url.path(), "/v1/properties");
        assert_eq!(url.query(), Some("address=123+Main+St%2C+Springfield"));
    }

    #[test]
    fn rejects_malformed_endpoints() {
        for endpoint in ["properties", "/../admin", "/a b"] {
            let request = ApiRequest::get(Service::PropertyData, endpoint);
            assert!(matches!(
                request.validate(),
                Err(PortalError::Validation { .. })
            ));
        }
    }

    #[test]
    fn post_is_single_shot_unless_marked() {
        let post = ApiRequest::post(Service::Backend, "/rest/v1/api_usage", Value::Null);
        assert!(!post.idempotent);
        assert!(post.idempotent().idempotent);
        assert!(ApiRequest::get(Service::Backend, "/x").idempotent);
    }
}
