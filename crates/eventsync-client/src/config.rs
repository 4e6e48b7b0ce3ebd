//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/eventsync/config.toml` by default.
//!
//! Credential values (`access_token`, `api_key`) support secret references:
//! - `pass::path/in/store`: resolved via `pass show`
//! - `env::VAR_NAME`: resolved from the environment
//! - plain text: used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use eventsync_providers::{DEFAULT_GEOCODING_DOMAIN, SiteConfig};
use eventsync_server::{RetryPolicy, SyncConfig};
use serde::{Deserialize, Serialize};

/// Configuration for the eventsync client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub calendar: CalendarSettings,
    pub geocoding: GeocodingSettings,
    /// Public site the events are published on.
    pub site: Option<SiteConfig>,
    pub sync: SyncSettings,
    pub store: StoreSettings,
}

/// Remote calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// Calendar to mirror.
    pub id: Option<String>,
    /// IANA zone of local event times.
    pub timezone: String,
    /// OAuth bearer token (supports `pass::` and `env::` prefixes).
    pub access_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            id: None,
            timezone: "UTC".to_string(),
            access_token: None,
            timeout_secs: 30,
        }
    }
}

/// Geocoding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingSettings {
    /// API host, for regional endpoints.
    pub domain: String,
    /// API key (supports `pass::` and `env::` prefixes).
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GeocodingSettings {
    fn default() -> Self {
        Self {
            domain: DEFAULT_GEOCODING_DOMAIN.to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

/// Pull and push scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Seconds between pull cycles.
    pub interval_secs: u64,
    /// Attempts per push, including the first.
    pub push_attempts: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 900,
            push_attempts: 5,
        }
    }
}

/// Local store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// JSON store file; `~` expands to the home directory.
    pub path: Option<PathBuf>,
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventsync")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventsync")
    }

    /// Path of the JSON event store.
    pub fn store_path(&self) -> PathBuf {
        match self.store.path {
            Some(ref path) => expand_home(path),
            None => Self::default_data_dir().join("events.json"),
        }
    }

    /// Builds the sync engine configuration.
    pub fn to_sync_config(&self) -> Result<SyncConfig, String> {
        let calendar_id = self.calendar.id.as_deref().ok_or_else(|| {
            format!(
                "no calendar configured. Add to {}:\n  \
                 [calendar]\n  \
                 id = \"YOUR_CALENDAR@group.calendar.google.com\"",
                Self::default_path().display()
            )
        })?;

        let timezone: Tz = self
            .calendar
            .timezone
            .parse()
            .map_err(|e| format!("invalid calendar timezone {:?}: {}", self.calendar.timezone, e))?;

        if self.sync.interval_secs == 0 {
            return Err("sync interval_secs must be greater than zero".to_string());
        }

        let mut config = SyncConfig::new(calendar_id)
            .with_timezone(timezone)
            .with_geocoding_domain(&self.geocoding.domain)
            .with_pull_interval(Duration::from_secs(self.sync.interval_secs))
            .with_retry(RetryPolicy::default().with_max_attempts(self.sync.push_attempts));

        if let Some(ref site) = self.site {
            config = config.with_site(site.clone());
        }

        Ok(config)
    }

    /// Resolves the calendar access token.
    pub fn access_token(&self) -> Result<String, String> {
        let raw = self.calendar.access_token.as_deref().ok_or_else(|| {
            "access_token is missing from [calendar] section in config.toml".to_string()
        })?;
        crate::secret::resolve(raw).map_err(|e| format!("failed to resolve access_token: {}", e))
    }

    /// Resolves the geocoding API key, if one is configured.
    pub fn geocoding_api_key(&self) -> Result<Option<String>, String> {
        self.geocoding
            .api_key
            .as_deref()
            .map(|raw| {
                crate::secret::resolve(raw).map_err(|e| format!("failed to resolve api_key: {}", e))
            })
            .transpose()
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
