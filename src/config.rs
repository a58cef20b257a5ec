use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the anime source resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Catalog origin settings
    pub origin: OriginConfig,

    /// Cache lifetimes
    pub cache: CacheConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL of the catalog site, without trailing slash
    pub base_url: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for entry points called without an explicit one
    pub default_ttl_seconds: u64,

    /// TTL of the server lookup done while resolving sources
    pub server_lookup_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive
    pub filter: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: "https://anime-world.co".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 3600,       // 1 hour
            server_lookup_ttl_seconds: 3600, // 1 hour
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "anime_source_resolver=info,warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_paths = ["anime-resolver.toml", "config/anime-resolver.toml"];

        for path in &config_paths {
            if !Path::new(path).exists() {
                continue;
            }

            match Self::load_from(path) {
                Ok(mut config) => {
                    tracing::info!("📄 Loaded configuration from: {}", path);
                    config.apply_overrides(|key| std::env::var(key).ok());
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file {}: {:#}", path, e);
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Default configuration with environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup("ANIME_RESOLVER_BASE_URL") {
            self.origin.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Some(timeout) = lookup("ANIME_RESOLVER_TIMEOUT") {
            match timeout.parse() {
                Ok(seconds) => self.origin.request_timeout_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid ANIME_RESOLVER_TIMEOUT: {}", timeout),
            }
        }

        if let Some(ttl) = lookup("ANIME_RESOLVER_CACHE_TTL") {
            match ttl.parse() {
                Ok(seconds) => self.cache.default_ttl_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid ANIME_RESOLVER_CACHE_TTL: {}", ttl),
            }
        }

        if let Some(filter) = lookup("ANIME_RESOLVER_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base_url = url::Url::parse(&self.origin.base_url)
            .map_err(|e| anyhow!("base_url is not a valid URL ({}): {}", self.origin.base_url, e))?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(anyhow!("base_url must use http or https: {}", self.origin.base_url));
        }

        if self.origin.request_timeout_seconds == 0 {
            return Err(anyhow!("request_timeout_seconds must be greater than 0"));
        }

        if self.origin.user_agent.trim().is_empty() {
            return Err(anyhow!("user_agent must not be empty"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Anime Resolver Configuration:\n\
            - Origin: {}\n\
            - Request Timeout: {}s\n\
            - Default Cache TTL: {}s\n\
            - Server Lookup TTL: {}s\n\
            - Log Filter: {}",
            self.origin.base_url,
            self.origin.request_timeout_seconds,
            self.cache.default_ttl_seconds,
            self.cache.server_lookup_ttl_seconds,
            self.logging.filter
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.origin.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.origin.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.origin.request_timeout_seconds = seconds;
        self
    }

    pub fn with_default_ttl(mut self, seconds: u64) -> Self {
        self.config.cache.default_ttl_seconds = seconds;
        self
    }

    pub fn with_server_lookup_ttl(mut self, seconds: u64) -> Self {
        self.config.cache.server_lookup_ttl_seconds = seconds;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.logging.filter = filter.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
