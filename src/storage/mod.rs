//! Configuration, credentials, the response cache and backend tables.

pub mod backend;
pub mod cache;
pub mod config;
pub mod paths;
pub mod secrets;

pub use backend::{BackendClient, Filter};
pub use cache::{CacheEntry, CacheMetrics, ResponseCache};
pub use config::{
    Config, ConfigSource, ConfigSources, ENV_CONFIG, ENV_SECRETS, ENV_TIMEOUT, ResolvedConfig,
};
pub use paths::AppPaths;
pub use secrets::{CredentialStore, Credentials, Service};
