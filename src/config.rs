use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::commands::Command;
use crate::dashboard::DashboardConfig;
use crate::error::{ApiError, ApiResult};

/// Address used when neither the environment nor the config file names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Every endpoint lives under this prefix.
pub const API_PREFIX: &str = "/api/v1";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "unifocus", about = "Campus opportunities client and dashboard")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base address
    #[arg(long, env = "API_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Path to data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection settings for one `ApiClient`. Fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: Url,
    timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ApiError::Config(format!("invalid base address {base_url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "base address must be http or https, got {:?}",
                parsed.scheme()
            )));
        }
        if parsed.cannot_be_a_base() {
            return Err(ApiError::Config(format!("{base_url:?} cannot be a base address")));
        }
        if timeout.is_zero() {
            return Err(ApiError::Config("request timeout must be greater than zero".into()));
        }
        Ok(Self {
            base_url: parsed,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL for an API path such as `/opportunities/3`.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let prefix = self.base_url.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{API_PREFIX}{path}"));
        url.set_query(None);
        url
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base address is valid"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiSection,
    pub dashboard: DashboardSection,
    pub session: SessionSection,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DashboardSection {
    pub interval_secs: u64,
    pub recent_limit: u32,
    pub min_successes: usize,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SessionSection {
    pub path: Option<PathBuf>,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for DashboardSection {
    fn default() -> Self {
        let defaults = DashboardConfig::default();
        Self {
            interval_secs: defaults.interval.as_secs(),
            recent_limit: defaults.recent_limit,
            min_successes: defaults.min_successes,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // Environment and CLI overrides (clap resolves API_BASE_URL into base_url)
        if let Some(ref base_url) = cli.base_url {
            config.api.base_url = base_url.clone();
        }
        if let Some(timeout) = cli.timeout_secs {
            config.api.timeout_secs = timeout;
        }

        if config.session.path.is_none() {
            config.session.path = Some(data_dir.join("session.json"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".unifocus")
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.session
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("session.json"))
    }

    pub fn client_config(&self) -> ApiResult<ClientConfig> {
        ClientConfig::new(
            &self.api.base_url,
            Duration::from_secs(self.api.timeout_secs),
        )
    }

    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            interval: Duration::from_secs(self.dashboard.interval_secs.max(1)),
            recent_limit: self.dashboard.recent_limit,
            min_successes: self.dashboard.min_successes,
        }
    }
}
