//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// File-level configuration for caseflux.
///
/// Every value here is a fallback: environment variables and command-line
/// flags take precedence.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub influx: InfluxConfig,
    pub geocode: GeocodeConfig,
    pub pipeline: PipelineConfig,
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InputConfig {
    pub dir: Option<PathBuf>,
    pub suffix: Option<String>,
    pub checkpoint: Option<PathBuf>,
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    pub measurement: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
    pub base_url: String,
    pub max_retries: Option<u32>,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: caseflux_ingest::geo::google::DEFAULT_BASE_URL.to_string(),
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub s2_level: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: caseflux_ingest::BATCH_SIZE,
            s2_level: caseflux_ingest::config::DEFAULT_S2_LEVEL,
        }
    }
}

/// `[http]` section, all values in seconds except `max_retries`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub connect_timeout: u64,
    pub request_timeout: u64,
    pub max_retries: u32,
    pub initial_backoff: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        let http = caseflux_core::HttpConfig::default();
        Self {
            connect_timeout: http.connect_timeout.as_secs(),
            request_timeout: http.request_timeout.as_secs(),
            max_retries: http.max_retries,
            initial_backoff: http.initial_backoff.as_secs(),
        }
    }
}

impl HttpSection {
    pub fn to_http_config(self) -> caseflux_core::HttpConfig {
        caseflux_core::HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_secs(self.initial_backoff),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./caseflux.toml (current directory)
    /// 2. ~/.config/caseflux/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("caseflux.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "caseflux") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.input.dir.is_none());
        assert_eq!(config.pipeline.batch_size, 500);
        assert_eq!(config.pipeline.s2_level, 30);
        assert_eq!(config.http.max_retries, 3);
        assert!(config.geocode.base_url.starts_with("https://"));
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("CASEFLUX_TEST_TOKEN", "test_value");
        assert_eq!(
            expand_env_var("${CASEFLUX_TEST_TOKEN}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("CASEFLUX_TEST_TOKEN");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[input]
dir = "/srv/csse/daily_reports"
strategy = "filename"

[influx]
url = "http://localhost:8086"
org = "epi"
bucket = "covid"
measurement = "cases"

[pipeline]
batch_size = 250

[http]
request_timeout = 10
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.input.dir,
            Some(PathBuf::from("/srv/csse/daily_reports"))
        );
        assert_eq!(config.input.strategy.as_deref(), Some("filename"));
        assert_eq!(config.influx.bucket.as_deref(), Some("covid"));
        assert!(config.influx.token.is_none());
        assert_eq!(config.pipeline.batch_size, 250);
        assert_eq!(config.pipeline.s2_level, 30);
        assert_eq!(
            config.http.to_http_config().request_timeout,
            Duration::from_secs(10)
        );
        assert_eq!(config.http.connect_timeout, 30);
    }
}
