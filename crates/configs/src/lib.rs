use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

/// Environment variable overriding `storage.data_dir`.
pub const DATA_DIR_ENV: &str = "SHELTER_DATA_DIR";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: StorageBackend::File, data_dir: default_data_dir(), key: default_key() }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self { Self { event_capacity: default_event_capacity() } }
}

fn default_data_dir() -> String { "data".into() }
fn default_key() -> String { models::DEFAULT_STORAGE_KEY.into() }
fn default_event_capacity() -> usize { 64 }

pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_default() -> Result<AppConfig> {
    load_from_file(&config_path())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

fn is_missing_file(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>().is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Load [`config_path`], using defaults only when that file does not exist.
    /// A file that exists but does not parse or validate is an error.
    /// The flag reports whether the file was found.
    pub fn load_or_default() -> Result<(Self, bool)> {
        Self::load_or_default_from(&config_path())
    }

    pub fn load_or_default_from(path: &str) -> Result<(Self, bool)> {
        let (mut cfg, found) = match load_from_file(path) {
            Ok(cfg) => (cfg, true),
            Err(e) if is_missing_file(&e) => (AppConfig::default(), false),
            Err(e) => return Err(e.context(format!("cannot load config {path}"))),
        };
        cfg.normalize_and_validate()?;
        Ok((cfg, found))
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.storage.normalize_from_env();
        self.storage.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

impl StorageConfig {
    /// `SHELTER_DATA_DIR` wins over the file; a blank directory falls back to the default.
    pub fn normalize_from_env(&mut self) {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.data_dir = dir;
            }
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !models::is_valid_storage_key(&self.key) {
            return Err(anyhow!(
                "storage.key {:?} must be non-empty, use only [A-Za-z0-9._-] and not start with '.'",
                self.key
            ));
        }
        Ok(())
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(anyhow!("store.event_capacity must be >= 1"));
        }
        Ok(())
    }
}
