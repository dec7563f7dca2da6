use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TubescribeError};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "tubescribe.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub fetch: FetchConfig,
    pub selection: SelectionConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Watch page URL template, `{video_id}` is substituted
    pub watch_url: String,
    /// Innertube player endpoint template, `{api_key}` is substituted
    pub innertube_url: String,
    /// Innertube client name sent in the player request context
    pub client_name: String,
    /// Innertube client version sent in the player request context
    pub client_version: String,
    /// User agent sent by strategies that use the default headers
    pub user_agent: String,
    /// Accept-Language sent by strategies that use the default headers
    pub accept_language: String,
    /// Raw Cookie header value for authenticated sessions
    pub cookies: Option<String>,
    /// Proxy URL applied to every request (http, https or socks5)
    pub proxy: Option<String>,
    /// Timeout for a single HTTP request
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of backoff rounds; each round tries every strategy once
    pub rounds: u32,
    /// Backoff after failed round `n` is `backoff_base_secs * 2^n`
    pub backoff_base_secs: f64,
    /// Upper bound for a single backoff sleep
    pub max_backoff_secs: f64,
    /// Request variants, tried in order within a round
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    /// Send the provider's default user agent, language and cookie headers
    #[serde(default = "default_true")]
    pub use_default_headers: bool,
    /// Extra headers layered on top
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Languages tried, in order, when the preferred one has no track
    pub fallback_languages: Vec<String>,
    /// Preference used when the caller does not give one (`auto` or a code)
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of references retrieved concurrently
    pub concurrency: usize,
    /// Overall time budget for one reference, retries included
    pub reference_timeout_secs: f64,
}

fn default_true() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            watch_url: "https://www.youtube.com/watch?v={video_id}".to_string(),
            innertube_url: "https://www.youtube.com/youtubei/v1/player?key={api_key}".to_string(),
            client_name: "ANDROID".to_string(),
            client_version: "20.10.38".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            accept_language: "en-US".to_string(),
            cookies: None,
            proxy: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        let strategy = |name: &str, use_default_headers: bool, headers: &[(&str, &str)]| StrategyConfig {
            name: name.to_string(),
            use_default_headers,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        Self {
            rounds: 3,
            backoff_base_secs: 1.0,
            max_backoff_secs: 30.0,
            strategies: vec![
                strategy("default", true, &[]),
                strategy("consent-cookie", true, &[("Cookie", "CONSENT=YES+cb")]),
                strategy("no-headers", false, &[]),
                strategy("minimal", false, &[("Accept", "*/*")]),
            ],
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            fallback_languages: vec!["en".to_string(), "hi".to_string()],
            default_language: "auto".to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            reference_timeout_secs: 120.0,
        }
    }
}

impl FetchConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_base_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.max_backoff_secs)
    }
}

impl BatchConfig {
    pub fn reference_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.reference_timeout_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TubescribeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| TubescribeError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TubescribeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TubescribeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Load from an explicit path, else `tubescribe.toml` in the working directory, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                    Self::from_file(DEFAULT_CONFIG_FILE)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch.rounds == 0 {
            return Err(TubescribeError::Config("fetch.rounds must be at least 1".to_string()));
        }
        if self.fetch.strategies.is_empty() {
            return Err(TubescribeError::Config(
                "fetch.strategies must contain at least one strategy".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for strategy in &self.fetch.strategies {
            if strategy.name.trim().is_empty() {
                return Err(TubescribeError::Config("Fetch strategy names must not be empty".to_string()));
            }
            if !names.insert(strategy.name.as_str()) {
                return Err(TubescribeError::Config(format!(
                    "Duplicate fetch strategy name '{}'",
                    strategy.name
                )));
            }
        }

        for (field, value) in [
            ("fetch.backoff_base_secs", self.fetch.backoff_base_secs),
            ("fetch.max_backoff_secs", self.fetch.max_backoff_secs),
            ("batch.reference_timeout_secs", self.batch.reference_timeout_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TubescribeError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }

        if self.batch.concurrency == 0 {
            return Err(TubescribeError::Config("batch.concurrency must be at least 1".to_string()));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(TubescribeError::Config(
                "provider.request_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch.rounds, 3);
        assert_eq!(config.selection.fallback_languages, vec!["en", "hi"]);
        assert_eq!(config.fetch.strategies[0].name, "default");
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tubescribe.toml");
        std::fs::write(
            &path,
            "[fetch]\nrounds = 5\n\n[selection]\nfallback_languages = [\"de\"]\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.fetch.rounds, 5);
        assert_eq!(config.fetch.strategies.len(), 4);
        assert_eq!(config.selection.fallback_languages, vec!["de"]);
        assert_eq!(config.batch.concurrency, 4);
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");

        let mut config = Config::default();
        config.provider.proxy = Some("socks5://127.0.0.1:9050".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.provider.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
        assert_eq!(loaded.fetch.strategies, config.fetch.strategies);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.fetch.rounds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.strategies.push(config.fetch.strategies[0].clone());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.backoff_base_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.batch.concurrency = 0;
        assert!(config.validate().is_err());
    }
}
