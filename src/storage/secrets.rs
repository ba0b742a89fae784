//! Credential store backed by `secrets.toml`.
//!
//! ```toml
//! [wordpress]
//! base_url = "https://shop.example.com"
//! username = "agent"
//! password = "..."
//!
//! [woocommerce]
//! consumer_key = "ck_..."
//! consumer_secret = "cs_..."
//!
//! [rentcast]
//! api_key = "..."
//! # base_url = "https://api.rentcast.io/v1"
//!
//! [supabase]
//! url = "https://project.supabase.co"
//! key = "..."
//! ```
//!
//! The document is read once at startup. A missing section leaves that
//! service unconfigured; a section with a missing or blank key is an error.
//! Commerce calls go to the identity site, so `[woocommerce]` needs
//! `[wordpress].base_url`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use reqwest::Url;
use serde::Deserialize;

use crate::error::{PortalError, Result};
use crate::util::Secret;

/// Default base URL of the property data API.
pub const DEFAULT_RENTCAST_BASE_URL: &str = "https://api.rentcast.io/v1";

/// External services the portal talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    /// WordPress site issuing JWT login tokens.
    Identity,
    /// WooCommerce REST API on the same site.
    Commerce,
    /// RentCast property records.
    PropertyData,
    /// Supabase PostgREST backend.
    Backend,
}

impl Service {
    pub const ALL: [Self; 4] = [
        Self::Identity,
        Self::Commerce,
        Self::PropertyData,
        Self::Backend,
    ];

    /// Section name in `secrets.toml`, also used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Identity => "wordpress",
            Self::Commerce => "woocommerce",
            Self::PropertyData => "rentcast",
            Self::Backend => "supabase",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Identity => "WordPress",
            Self::Commerce => "WooCommerce",
            Self::PropertyData => "RentCast",
            Self::Backend => "Supabase",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Credentials for one service. Key-only services leave `key_or_username`
/// empty and keep the key in `secret_or_password`.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub service: Service,
    pub base_url: String,
    pub key_or_username: String,
    pub secret_or_password: Secret,
}

#[derive(Debug, Default, Deserialize)]
struct SecretsDocument {
    wordpress: Option<WordpressSection>,
    woocommerce: Option<WoocommerceSection>,
    rentcast: Option<RentcastSection>,
    supabase: Option<SupabaseSection>,
}

#[derive(Debug, Deserialize)]
struct WordpressSection {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WoocommerceSection {
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RentcastSection {
    api_key: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupabaseSection {
    url: Option<String>,
    key: Option<String>,
}

/// Immutable per-service credentials.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: BTreeMap<Service, Credentials>,
}

impl CredentialStore {
    /// Load from a secrets file. A missing file is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PortalError::Config(format!(
                "secrets file not found: {}",
                path.display()
            )));
        }
        tracing::debug!(?path, "Loading secrets file");
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse a secrets document. `origin` names it in error messages.
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        // Only the parser's message is kept: the full error echoes source lines.
        let doc: SecretsDocument = toml::from_str(content).map_err(|e| PortalError::ConfigParse {
            path: origin.to_string(),
            message: e.message().to_string(),
        })?;

        let mut store = Self::default();

        let wordpress_url = match &doc.wordpress {
            Some(wp) => Some(normalize_base_url(required(
                wp.base_url.as_deref(),
                "wordpress.base_url",
            )?)?),
            None => None,
        };

        if let (Some(wp), Some(base_url)) = (&doc.wordpress, &wordpress_url) {
            store.insert(Credentials {
                service: Service::Identity,
                base_url: base_url.clone(),
                key_or_username: required(wp.username.as_deref(), "wordpress.username")?
                    .to_string(),
                secret_or_password: Secret::new(required(
                    wp.password.as_deref(),
                    "wordpress.password",
                )?),
            });
        }

        if let Some(wc) = &doc.woocommerce {
            let base_url = wordpress_url
                .clone()
                .ok_or_else(|| PortalError::SecretMissing {
                    key: "wordpress.base_url".to_string(),
                })?;
            store.insert(Credentials {
                service: Service::Commerce,
                base_url,
                key_or_username: required(wc.consumer_key.as_deref(), "woocommerce.consumer_key")?
                    .to_string(),
                secret_or_password: Secret::new(required(
                    wc.consumer_secret.as_deref(),
                    "woocommerce.consumer_secret",
                )?),
            });
        }

        if let Some(rc) = &doc.rentcast {
            let base_url = rc
                .base_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(DEFAULT_RENTCAST_BASE_URL);
            store.insert(Credentials {
                service: Service::PropertyData,
                base_url: normalize_base_url(base_url)?,
                key_or_username: String::new(),
                secret_or_password: Secret::new(required(
                    rc.api_key.as_deref(),
                    "rentcast.api_key",
                )?),
            });
        }

        if let Some(sb) = &doc.supabase {
            store.insert(Credentials {
                service: Service::Backend,
                base_url: normalize_base_url(required(sb.url.as_deref(), "supabase.url")?)?,
                key_or_username: String::new(),
                secret_or_password: Secret::new(required(sb.key.as_deref(), "supabase.key")?),
            });
        }

        tracing::debug!(
            services = ?store.entries.keys().map(|s| s.name()).collect::<Vec<_>>(),
            "Credentials loaded"
        );
        Ok(store)
    }

    /// Build a store from already-validated credentials.
    #[must_use]
    pub fn from_credentials(credentials: impl IntoIterator<Item = Credentials>) -> Self {
        let mut store = Self::default();
        for creds in credentials {
            store.insert(creds);
        }
        store
    }

    fn insert(&mut self, credentials: Credentials) {
        self.entries.insert(credentials.service, credentials);
    }

    /// Credentials for `service`, or `AuthNotConfigured`.
    pub fn get(&self, service: Service) -> Result<&Credentials> {
        self.entries
            .get(&service)
            .ok_or_else(|| PortalError::AuthNotConfigured {
                service: service.name().to_string(),
            })
    }

    #[must_use]
    pub fn is_configured(&self, service: Service) -> bool {
        self.entries.contains_key(&service)
    }

    /// Services without a section in the secrets document.
    #[must_use]
    pub fn missing_services(&self) -> Vec<Service> {
        Service::ALL
            .into_iter()
            .filter(|s| !self.entries.contains_key(s))
            .collect()
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PortalError::SecretMissing {
            key: key.to_string(),
        }),
    }
}

/// Validate an http(s) base URL and strip the trailing slash.
fn normalize_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim())
        .map_err(|e| PortalError::Config(format!("invalid base URL \"{raw}\": {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PortalError::Config(format!(
            "base URL \"{raw}\" must use http or https"
        )));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[wordpress]
base_url = "https://shop.example.com/"
username = "agent"
password = "wp-pass"

[woocommerce]
consumer_key = "ck_123"
consumer_secret = "cs_456"

[rentcast]
api_key = "rc-key"

[supabase]
url = "https://project.supabase.co"
key = "sb-key"
"#;

    #[test]
    fn parses_all_services() {
        let store = CredentialStore::parse(FULL, "secrets.toml").unwrap();
        assert!(store.missing_services().is_empty());

        let wp = store.get(Service::Identity).unwrap();
        assert_eq!(wp.base_url, "https://shop.example.com");
        assert_eq!(wp.key_or_username, "agent");
        assert_eq!(wp.secret_or_password.expose(), "wp-pass");

        let wc = store.get(Service::Commerce).unwrap();
        assert_eq!(wc.base_url, "https://shop.example.com");

        let rc = store.get(Service::PropertyData).unwrap();
        assert_eq!(rc.base_url, DEFAULT_RENTCAST_BASE_URL);
    }

    #[test]
    fn debug_output_is_redacted() {
        let store = CredentialStore::parse(FULL, "secrets.toml").unwrap();
        let debug = format!("{store:?}");
        for secret in ["wp-pass", "cs_456", "rc-key", "sb-key"] {
            assert!(!debug.contains(secret), "{secret} leaked into Debug");
        }
    }

    #[test]
    fn blank_key_is_secret_missing() {
        let doc = "[rentcast]\napi_key = \"   \"\n";
        let err = CredentialStore::parse(doc, "secrets.toml").unwrap_err();
        assert!(matches!(err, PortalError::SecretMissing { ref key } if key == "rentcast.api_key"));
    }

    #[test]
    fn missing_section_is_unconfigured() {
        let doc = "[rentcast]\napi_key = \"k\"\n";
        let store = CredentialStore::parse(doc, "secrets.toml").unwrap();
        assert!(store.is_configured(Service::PropertyData));
        assert!(matches!(
            store.get(Service::Backend),
            Err(PortalError::AuthNotConfigured { .. })
        ));
        assert_eq!(store.missing_services().len(), 3);
    }

    #[test]
    fn commerce_requires_site_url() {
        let doc = "[woocommerce]\nconsumer_key = \"a\"\nconsumer_secret = \"b\"\n";
        let err = CredentialStore::parse(doc, "secrets.toml").unwrap_err();
        assert!(matches!(err, PortalError::SecretMissing { ref key } if key == "wordpress.base_url"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let doc = "[supabase]\nurl = \"ftp://example.com\"\nkey = \"k\"\n";
        assert!(matches!(
            CredentialStore::parse(doc, "secrets.toml"),
            Err(PortalError::Config(_))
        ));
    }

    #[test]
    fn parse_error_does_not_echo_document() {
        let doc = "[wordpress]\npassword = \"hunter2\nbase_url = 1";
        let err = CredentialStore::parse(doc, "secrets.toml").unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = CredentialStore::load(Path::new("/nonexistent/secrets.toml")).unwrap_err();
        assert!(matches!(err, PortalError::Config(_)));
    }
}
