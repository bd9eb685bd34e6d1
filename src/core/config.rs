use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SgsProviderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
}

impl Default for SgsProviderConfig {
    fn default() -> Self {
        SgsProviderConfig {
            base_url: "https://api.bcb.gov.br".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 15,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FocusProviderConfig {
    pub base_url: String,
}

impl Default for FocusProviderConfig {
    fn default() -> Self {
        FocusProviderConfig {
            base_url: "https://olinda.bcb.gov.br".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub sgs: SgsProviderConfig,
    pub focus: FocusProviderConfig,
}

/// SGS series codes for each indicator.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SeriesConfig {
    pub selic: u32,
    pub ipca: u32,
    pub igpm: u32,
    pub ptax: u32,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        SeriesConfig {
            selic: 432,
            ipca: 13522,
            igpm: 189,
            ptax: 1,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    /// Full fetch rounds before falling back to the local snapshot
    pub attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            attempts: 2,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub providers: ProvidersConfig,
    pub series: SeriesConfig,
    pub fetch: FetchConfig,
    pub lookback_years: u32,
    pub cache_ttl_hours: u64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            series: SeriesConfig::default(),
            fetch: FetchConfig::default(),
            lookback_years: 10,
            cache_ttl_hours: 24,
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or returns the defaults
    /// when no file has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("br", "bcbmon", "bcbmon")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("br", "bcbmon", "bcbmon")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
