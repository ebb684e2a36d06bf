use std::path::Path;

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::decoration::{CompiledFormatter, DecorationFormatter};

#[derive(Default, Debug, Clone)]
pub struct Config {
    pub decoration_formatter: CompiledFormatter,
    pub registry: RegistryConfig,
    pub allow_prerelease: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_agent: default_user_agent(),
            cache_ttl_secs: default_cache_ttl_secs(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = url::Url::parse(&self.endpoint)
            .with_context(|| format!("invalid registry endpoint '{}'", self.endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("registry endpoint must be http(s), got '{}'", self.endpoint);
        }
        if self.max_concurrent_fetches == 0 {
            bail!("maxConcurrentFetches must be at least 1");
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "https://crates.io/api/v1".to_string()
}

fn default_user_agent() -> String {
    format!(
        "{}/{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION")
    )
}

fn default_cache_ttl_secs() -> u64 {
    3 * 60
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_fetches() -> usize {
    8
}

#[derive(Default, Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    #[serde(default)]
    pub decoration_formatter: DecorationFormatter,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub allow_prerelease: bool,
}

impl UserConfig {
    /// Read a JSON config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

pub static GLOBAL_CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

pub fn initialize_config(config: UserConfig) -> anyhow::Result<()> {
    config.registry.validate()?;
    let mut global_config = GLOBAL_CONFIG.write();
    *global_config = Config {
        decoration_formatter: config.decoration_formatter.compile(),
        registry: config.registry,
        allow_prerelease: config.allow_prerelease,
    };
    debug!("config {:?}", global_config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = UserConfig::load(None).unwrap();
        assert_eq!(config.registry.endpoint, "https://crates.io/api/v1");
        assert_eq!(config.registry.cache_ttl_secs, 180);
        assert!(!config.allow_prerelease);
        assert!(config.registry.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "allowPrerelease": true,
                "registry": {{ "endpoint": "http://localhost:8080/api/v1", "timeoutSecs": 5 }},
                "decorationFormatter": {{ "latest": "ok {{{{matched}}}}" }}
            }}"#
        )
        .unwrap();

        let config = UserConfig::load(Some(file.path())).unwrap();
        assert!(config.allow_prerelease);
        assert_eq!(config.registry.endpoint, "http://localhost:8080/api/v1");
        assert_eq!(config.registry.timeout_secs, 5);
        assert_eq!(config.registry.max_concurrent_fetches, 8);
        assert_eq!(config.decoration_formatter.latest, "ok {{matched}}");
        assert_eq!(
            config.decoration_formatter.outdated,
            DecorationFormatter::default().outdated
        );
    }

    #[test]
    fn test_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(UserConfig::load(Some(file.path())).is_err());

        let registry = RegistryConfig {
            endpoint: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(registry.validate().is_err());

        let registry = RegistryConfig {
            max_concurrent_fetches: 0,
            ..Default::default()
        };
        assert!(registry.validate().is_err());
    }
}
