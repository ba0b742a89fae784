//! Domain facades over the request layer.
//!
//! [`Portal`] is the explicitly passed application context: it owns the
//! shared [`ApiClient`], the [`TokenManager`], the clock and the usage
//! recorder, and hands out the per-domain services.

pub mod orders;
pub mod portfolio;
pub mod property;

use std::sync::Arc;

use serde_json::Value;

pub use orders::OrderService;
pub use portfolio::PortfolioService;
pub use property::{PropertyLookup, PropertyService};

use crate::core::clock::SharedClock;
use crate::core::http::{ApiClient, ApiRequest, Authenticator, build_client};
use crate::core::token::{CURRENT_USER_PATH, TokenManager, UserSession};
use crate::core::usage::{UsageRecorder, UsageSummary};
use crate::error::{PortalError, Result};
use crate::storage::backend::BackendClient;
use crate::storage::cache::ResponseCache;
use crate::storage::config::Config;
use crate::storage::paths::AppPaths;
use crate::storage::secrets::{CredentialStore, Service};

/// Shared state for all facade calls.
#[derive(Debug, Clone)]
pub struct Portal {
    config: Config,
    clock: SharedClock,
    tokens: Option<Arc<TokenManager>>,
    api: Arc<ApiClient>,
    usage: UsageRecorder,
}

impl Portal {
    /// Wire up every service that has credentials in `store`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(store: &CredentialStore, config: Config, clock: SharedClock) -> Result<Self> {
        let cache = if config.cache.persist {
            ResponseCache::with_persistence(clock.clone(), AppPaths::new().response_cache_dir())
        } else {
            ResponseCache::new(clock.clone())
        };
        Self::with_cache(store, config, clock, Arc::new(cache))
    }

    /// Like [`Portal::new`] with a caller-supplied response cache.
    pub fn with_cache(
        store: &CredentialStore,
        config: Config,
        clock: SharedClock,
        cache: Arc<ResponseCache>,
    ) -> Result<Self> {
        let client = build_client(config.http.timeout())?;

        let tokens = store.get(Service::Identity).ok().map(|creds| {
            Arc::new(TokenManager::new(
                creds.clone(),
                client.clone(),
                clock.clone(),
                &config,
            ))
        });

        let mut api = ApiClient::new(
            client,
            cache,
            config.http.retry_policy(),
            config.http.timeout(),
        );
        for service in Service::ALL {
            if let Ok(creds) = store.get(service) {
                let auth = Authenticator::for_credentials(creds, tokens.clone());
                api.register(service, creds.base_url.clone(), auth);
            }
        }
        let api = Arc::new(api);
        let usage = UsageRecorder::new(BackendClient::new(Arc::clone(&api)), clock.clone())
            .with_record_timeout(config.usage.record_timeout());

        tracing::debug!(
            configured = ?Service::ALL.iter().filter(|s| api.is_registered(**s)).collect::<Vec<_>>(),
            "Portal ready"
        );

        Ok(Self {
            config,
            clock,
            tokens,
            api,
            usage,
        })
    }

    /// Sign in with the identity credentials, reusing a live token, and
    /// confirm the session against the user profile endpoint. A token the
    /// identity service no longer accepts is refreshed once.
    ///
    /// # Errors
    ///
    /// `AuthNotConfigured` without identity credentials, otherwise whatever
    /// the login or profile endpoint reports.
    pub async fn login(&self) -> Result<UserSession> {
        let tokens = self.token_manager()?;
        let profile = self
            .api
            .call(&ApiRequest::get(Service::Identity, CURRENT_USER_PATH))
            .await?;
        let session = tokens.session().ok_or_else(|| PortalError::AuthUnavailable {
            service: Service::Identity.name().to_string(),
            reason: "login returned no session".to_string(),
        })?;
        Ok(confirm_session(session, &profile.payload))
    }

    fn token_manager(&self) -> Result<&Arc<TokenManager>> {
        self.tokens
            .as_ref()
            .ok_or_else(|| PortalError::AuthNotConfigured {
                service: Service::Identity.name().to_string(),
            })
    }

    #[must_use]
    pub fn properties(&self) -> PropertyService {
        PropertyService::new(
            Arc::clone(&self.api),
            self.usage.clone(),
            self.config.cache.property_ttl(),
            self.config.usage.monthly_limit,
        )
    }

    #[must_use]
    pub fn orders(&self) -> OrderService {
        OrderService::new(Arc::clone(&self.api), self.usage.clone())
    }

    #[must_use]
    pub fn portfolio(&self) -> PortfolioService {
        PortfolioService::new(
            BackendClient::new(Arc::clone(&self.api)),
            self.usage.clone(),
            self.clock.clone(),
        )
    }

    /// This month's usage for `user`.
    pub async fn usage_summary(&self, user: &UserSession) -> Result<UsageSummary> {
        self.usage
            .summary(&user.user_id, self.config.usage.monthly_limit)
            .await
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn clock(&self) -> &SharedClock {
        &self.clock
    }

    #[must_use]
    pub const fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    #[must_use]
    pub const fn usage(&self) -> &UsageRecorder {
        &self.usage
    }

    #[must_use]
    pub fn tokens(&self) -> Option<&Arc<TokenManager>> {
        self.tokens.as_ref()
    }
}

/// Overlay the profile's `id` and `name` on the login session.
fn confirm_session(mut session: UserSession, profile: &Value) -> UserSession {
    match profile.get("id") {
        Some(Value::Number(id)) => session.user_id = id.to_string(),
        Some(Value::String(id)) if !id.is_empty() => session.user_id.clone_from(id),
        _ => {}
    }
    if let Some(name) = profile.get("name").and_then(Value::as_str)
        && !name.is_empty()
    {
        session.display_name = Some(name.to_string());
    }
    session
}

/// Log a failed facade call by code and category only.
pub(crate) fn log_failure(action: &str, err: &PortalError) {
    tracing::warn!(
        action,
        error_code = err.error_code(),
        category = ?err.category(),
        "Facade call failed"
    );
}
