//! Runtime configuration read from `config.json` in the user's config directory.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR_NAME: &str = "droid-inventory";
const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable that overrides `targetSerial`.
pub const TARGET_SERIAL_ENV: &str = "DROID_INVENTORY_SERIAL";

/// Upper bound for the hour-valued settings (ten years).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365 * 10;

pub const DEFAULT_DEVICE_DB_URL: &str = "https://raw.githubusercontent.com/Boehrsi/DeviceMarketingNames/refs/heads/main/DeviceMarketingNames/src/main/java/de/boehrsi/devicemarketingnames/data/DeviceIdentifiers.kt";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryConfig {
    pub adb_path: String,
    /// Locations probed, in order, for the `aapt` binary.
    pub aapt_candidates: Vec<PathBuf>,
    /// Maximum number of per-package queries in flight at once.
    pub batch_size: usize,
    pub query_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub cache_validity_hours: i64,
    pub cache_dir: PathBuf,
    pub device_db_url: String,
    pub device_db_ttl_hours: u64,
    /// Pull each APK and read its label with aapt before falling back to tables.
    pub extract_labels: bool,
    pub include_system_apps: bool,
    pub extra_protected_packages: Vec<String>,
    pub target_serial: Option<String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            aapt_candidates: vec![
                PathBuf::from("./tools/sdk/build-tools/34.0.0/aapt"),
                PathBuf::from("./macos/tools/sdk/build-tools/34.0.0/aapt"),
                PathBuf::from("../tools/sdk/build-tools/34.0.0/aapt"),
                PathBuf::from("tools/sdk/build-tools/34.0.0/aapt"),
            ],
            batch_size: 5,
            query_timeout_secs: 30,
            tool_timeout_secs: 60,
            cache_validity_hours: 24,
            cache_dir: default_cache_dir(),
            device_db_url: DEFAULT_DEVICE_DB_URL.to_string(),
            device_db_ttl_hours: 24,
            extract_labels: true,
            include_system_apps: false,
            extra_protected_packages: Vec::new(),
            target_serial: None,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("cache"))
        .unwrap_or_else(|| PathBuf::from("./cache"))
}

/// Returns the path of the configuration file, e.g. `~/.config/droid-inventory/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

impl InventoryConfig {
    /// Loads the configuration from the default location, then applies
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&default_config_path())?;
        if let Ok(serial) = env::var(TARGET_SERIAL_ENV) {
            let serial = serial.trim();
            if !serial.is_empty() {
                log::info!("[CONFIG] Target serial overridden by {}", TARGET_SERIAL_ENV);
                config.target_serial = Some(serial.to_string());
            }
        }
        Ok(config)
    }

    /// Reads a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("[CONFIG] No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;

        log::info!("[CONFIG] Loaded config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.device_db_url)
            .map_err(|e| ConfigError::InvalidUrl(self.device_db_url.clone(), e))?;
        check_hours("cacheValidityHours", self.cache_validity_hours)?;
        check_hours(
            "deviceDbTtlHours",
            i64::try_from(self.device_db_ttl_hours).unwrap_or(i64::MAX),
        )?;
        Ok(())
    }

    pub fn batch_width(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs.max(1))
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs.max(1))
    }

    // Both windows are clamped so configs built in code cannot overflow either.
    pub fn cache_validity(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_validity_hours.clamp(1, MAX_WINDOW_HOURS))
    }

    pub fn device_db_ttl(&self) -> Duration {
        let hours = self.device_db_ttl_hours.clamp(1, MAX_WINDOW_HOURS as u64);
        Duration::from_secs(hours * 60 * 60)
    }
}

fn check_hours(field: &'static str, value: i64) -> Result<(), ConfigError> {
    if (1..=MAX_WINDOW_HOURS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            max: MAX_WINDOW_HOURS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = InventoryConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.cache_validity_hours, 24);
        assert!(config.extract_labels);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "batchSize": 0, "targetSerial": "RFCW708JTVX" }"#).unwrap();

        let config = InventoryConfig::load_from(&path).unwrap();
        assert_eq!(config.batch_width(), 1);
        assert_eq!(config.target_serial.as_deref(), Some("RFCW708JTVX"));
        assert_eq!(config.adb_path, "adb");
    }

    #[test]
    fn rejects_bad_url_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{ "deviceDbUrl": "not a url" }"#).unwrap();
        assert!(matches!(
            InventoryConfig::load_from(&path),
            Err(ConfigError::InvalidUrl(..))
        ));

        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            InventoryConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_windows_that_cannot_become_durations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{ "deviceDbTtlHours": 18446744073709551615 }"#).unwrap();
        assert!(matches!(
            InventoryConfig::load_from(&path),
            Err(ConfigError::OutOfRange { field: "deviceDbTtlHours", .. })
        ));

        fs::write(&path, r#"{ "cacheValidityHours": 9223372036854775807 }"#).unwrap();
        assert!(matches!(
            InventoryConfig::load_from(&path),
            Err(ConfigError::OutOfRange { field: "cacheValidityHours", .. })
        ));

        fs::write(&path, r#"{ "cacheValidityHours": -3 }"#).unwrap();
        assert!(matches!(
            InventoryConfig::load_from(&path),
            Err(ConfigError::OutOfRange { field: "cacheValidityHours", .. })
        ));

        fs::write(&path, r#"{ "cacheValidityHours": 48, "deviceDbTtlHours": 6 }"#).unwrap();
        let config = InventoryConfig::load_from(&path).unwrap();
        assert_eq!(config.cache_validity(), chrono::Duration::hours(48));
        assert_eq!(config.device_db_ttl(), Duration::from_secs(6 * 3600));
    }

    #[test]
    fn extreme_windows_built_in_code_are_clamped() {
        let config = InventoryConfig {
            cache_validity_hours: i64::MAX,
            device_db_ttl_hours: u64::MAX,
            ..InventoryConfig::default()
        };
        assert_eq!(config.cache_validity(), chrono::Duration::hours(MAX_WINDOW_HOURS));
        assert_eq!(
            config.device_db_ttl(),
            Duration::from_secs(MAX_WINDOW_HOURS as u64 * 3600)
        );
    }
}
