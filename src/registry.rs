use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dashmap::DashSet;
use moka::future::Cache;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{debug, error};
use version_matcher::{decode_versions, PublishedVersion};

use crate::config::RegistryConfig;

/// Characters escaped in a crate name used as a path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub type Versions = Arc<Vec<PublishedVersion>>;

/// Client for the registry `versions` endpoint.
///
/// Results are cached per crate name for the configured TTL, and for one
/// crate name at most one request is in flight.
#[derive(Debug, Clone)]
pub struct Registry {
    client: reqwest::Client,
    endpoint: String,
    cache: Cache<String, Versions>,
    in_flight: Arc<DashSet<String>>,
}

/// Removes the crate name from the in-flight set when dropped
#[derive(Debug)]
pub struct FetchGuard {
    name: String,
    in_flight: Arc<DashSet<String>>,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.name);
    }
}

impl Registry {
    pub fn new(config: &RegistryConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &RegistryConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .max_capacity(1000)
                .build(),
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn versions_url(&self, name: &str) -> String {
        format!(
            "{}/crates/{}/versions",
            self.endpoint,
            utf8_percent_encode(name, PATH_SEGMENT)
        )
    }

    /// Claim the right to fetch `name`. `None` if a fetch is already running.
    pub fn begin_fetch(&self, name: &str) -> Option<FetchGuard> {
        if !self.in_flight.insert(name.to_string()) {
            debug!("fetch for '{}' already in flight", name);
            return None;
        }
        Some(FetchGuard {
            name: name.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub async fn cached(&self, name: &str) -> Option<Versions> {
        self.cache.get(name).await
    }

    /// Published versions of `name`, from the cache or the registry.
    ///
    /// Failures are logged and reported as `None`.
    pub async fn fetch_versions(&self, name: &str) -> Option<Versions> {
        if let Some(cached) = self.cache.get(name).await {
            debug!("cache hit for '{}'", name);
            return Some(cached);
        }

        let url = self.versions_url(name);
        debug!("cache miss for '{}', fetching {}", name, url);

        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                error!("failed to fetch versions for '{}': {}", name, e);
                return None;
            }
        };

        if !resp.status().is_success() {
            error!("registry returned {} for '{}'", resp.status(), name);
            return None;
        }

        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => {
                error!("failed to read registry response for '{}': {}", name, e);
                return None;
            }
        };

        let versions = match decode_versions(&text) {
            Ok(v) => Arc::new(v),
            Err(e) => {
                error!("failed to decode versions for '{}': {}", name, e);
                return None;
            }
        };
        debug!("fetched {} versions for '{}'", versions.len(), name);

        self.cache.insert(name.to_string(), versions.clone()).await;
        Some(versions)
    }

    #[cfg(test)]
    pub async fn prime(&self, name: &str, versions: Vec<PublishedVersion>) {
        self.cache.insert(name.to_string(), Arc::new(versions)).await;
    }
}
