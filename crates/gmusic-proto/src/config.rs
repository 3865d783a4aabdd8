use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::platform;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("`{0}` is not set")]
    Missing(&'static str),
    #[error("device_id must be 16 hex characters, got {0:?}")]
    InvalidDeviceId(String),
    #[error("poller.queue_capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("unknown tagger backend {0:?} (expected \"id3v2\" or \"lofty\")")]
    UnknownTagger(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Account login.
    #[serde(rename = "Email", alias = "email", default)]
    pub email: String,
    #[serde(rename = "Password", alias = "password", default)]
    pub password: String,
    /// Directory downloaded tracks are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Android device id (16 hex characters) the service authorizes streams for.
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub tagger: TaggerConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Delay between clipboard samples.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Tracks waiting for the worker before the poller blocks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaggerBackend {
    /// External `id3v2` tool.
    Id3v2,
    /// In-process tagging through lofty.
    Lofty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerConfig {
    #[serde(default = "default_tagger_backend")]
    pub backend: TaggerBackend,
    /// Explicit id3v2 binary; searched for when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id3v2_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout; no timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            backend: default_tagger_backend(),
            id3v2_path: None,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl FromStr for TaggerBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id3v2" => Ok(Self::Id3v2),
            "lofty" => Ok(Self::Lofty),
            _ => Err(ConfigError::UnknownTagger(s.to_string())),
        }
    }
}

impl fmt::Display for TaggerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id3v2 => f.write_str("id3v2"),
            Self::Lofty => f.write_str("lofty"),
        }
    }
}

fn default_output_dir() -> PathBuf {
    platform::music_dir()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_queue_capacity() -> usize {
    50
}

fn default_tagger_backend() -> TaggerBackend {
    TaggerBackend::Id3v2
}

/// 16 hexadecimal characters, as Android device ids are.
pub fn is_valid_device_id(device_id: &str) -> bool {
    device_id.len() == 16 && device_id.chars().all(|c| c.is_ascii_hexdigit())
}

impl Config {
    /// Load the default config file, writing a template first if none exists.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load a specific file. `.json` and `.conf` files use the legacy JSON
    /// layout (`gmusicdl.conf`); anything else is TOML.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let legacy = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("json") | Some("conf")
        );
        if legacy {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else {
            toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Check everything the pipeline needs before logging in.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.email.trim().is_empty() {
            return Err(ConfigError::Missing("Email"));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Missing("Password"));
        }
        if self.device_id.is_empty() {
            return Err(ConfigError::Missing("device_id"));
        }
        if !is_valid_device_id(&self.device_id) {
            return Err(ConfigError::InvalidDeviceId(self.device_id.clone()));
        }
        if self.poller.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            output_dir: default_output_dir(),
            device_id: String::new(),
            poller: PollerConfig::default(),
            tagger: TaggerConfig::default(),
            http: HttpConfig::default(),
        }
    }
}
