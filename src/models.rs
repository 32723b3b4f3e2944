// Central data model definitions shared by the parser, the fetcher, the cache
// and the service. Fields serialize in camelCase (`packageName`, `installDate`,
// `detailsFetched`, ...), and that JSON is also the cache file format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel used for every display value that could not be determined.
pub const UNKNOWN: &str = "Unknown";

// -----------------------------------------------------------------------------
// AppKind
// -----------------------------------------------------------------------------
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    User,
    System,
    #[default]
    Unknown,
}

// -----------------------------------------------------------------------------
// ReportDate
// -----------------------------------------------------------------------------
/// A calendar date extracted from a device report, or the explicit
/// `"Unknown"` sentinel. Serialized as `YYYY-MM-DD` or `Unknown`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum ReportDate {
    Date(NaiveDate),
    #[default]
    Unknown,
}

impl ReportDate {
    pub fn is_known(&self) -> bool {
        matches!(self, ReportDate::Date(_))
    }

    /// Returns `self` when known, otherwise `fallback`.
    pub fn or(self, fallback: ReportDate) -> ReportDate {
        if self.is_known() {
            self
        } else {
            fallback
        }
    }
}

impl From<String> for ReportDate {
    fn from(value: String) -> Self {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(ReportDate::Date)
            .unwrap_or(ReportDate::Unknown)
    }
}

impl From<ReportDate> for String {
    fn from(value: ReportDate) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ReportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportDate::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            ReportDate::Unknown => f.write_str(UNKNOWN),
        }
    }
}

// -----------------------------------------------------------------------------
// InstallSource
// -----------------------------------------------------------------------------
/// Where an app was installed from. Known stores get a friendly label; any
/// other installer keeps its raw package id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum InstallSource {
    PlayStore,
    SamsungStore,
    AmazonStore,
    Sideloaded,
    #[default]
    Unknown,
    Other(String),
}

impl InstallSource {
    /// Maps the `installerPackageName` value reported by the package manager.
    pub fn from_installer(installer: &str) -> Self {
        match installer.trim() {
            "" => InstallSource::Unknown,
            "com.android.vending" => InstallSource::PlayStore,
            "com.sec.android.app.samsungapps" => InstallSource::SamsungStore,
            "com.amazon.venezia" => InstallSource::AmazonStore,
            "null" => InstallSource::Sideloaded,
            other => InstallSource::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            InstallSource::PlayStore => "Play Store",
            InstallSource::SamsungStore => "Samsung Store",
            InstallSource::AmazonStore => "Amazon Store",
            InstallSource::Sideloaded => "Sideloaded",
            InstallSource::Unknown => UNKNOWN,
            InstallSource::Other(raw) => raw,
        }
    }
}

impl From<String> for InstallSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Play Store" => InstallSource::PlayStore,
            "Samsung Store" => InstallSource::SamsungStore,
            "Amazon Store" => InstallSource::AmazonStore,
            "Sideloaded" => InstallSource::Sideloaded,
            "" | UNKNOWN => InstallSource::Unknown,
            _ => InstallSource::Other(value),
        }
    }
}

impl From<InstallSource> for String {
    fn from(value: InstallSource) -> Self {
        value.label().to_string()
    }
}

// -----------------------------------------------------------------------------
// InventoryItem
// -----------------------------------------------------------------------------
/// One installed application as seen on the device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    #[serde(rename = "packageName")]
    pub identifier: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: AppKind,
    pub size: String,
    #[serde(rename = "installDate")]
    pub installed_at: ReportDate,
    #[serde(rename = "lastUpdate")]
    pub updated_at: ReportDate,
    #[serde(rename = "lastUsed")]
    pub last_used_at: ReportDate,
    pub version_name: String,
    pub version_code: u64,
    pub target_sdk: Option<u32>,
    pub install_source: InstallSource,
    #[serde(rename = "isEnabled")]
    pub enabled: bool,
    #[serde(rename = "appFlags")]
    pub flags: Vec<String>,
    pub data_size: String,
    /// Whether detailed extraction succeeded; `false` marks a degraded record.
    #[serde(rename = "detailsFetched")]
    pub resolution_succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<i64>,
}

impl InventoryItem {
    /// Builds the record returned when detailed extraction failed. The display
    /// name is still resolved; every other field holds its sentinel.
    pub fn degraded(identifier: &str, display_name: String, error: impl Into<String>) -> Self {
        Self {
            identifier: identifier.to_string(),
            display_name,
            kind: AppKind::Unknown,
            size: UNKNOWN.to_string(),
            installed_at: ReportDate::Unknown,
            updated_at: ReportDate::Unknown,
            last_used_at: ReportDate::Unknown,
            version_name: UNKNOWN.to_string(),
            version_code: 0,
            target_sdk: None,
            install_source: InstallSource::Unknown,
            enabled: true,
            flags: Vec::new(),
            data_size: UNKNOWN.to_string(),
            resolution_succeeded: false,
            error: Some(error.into()),
            cached_at: None,
        }
    }
}

// -----------------------------------------------------------------------------
// Device types
// -----------------------------------------------------------------------------
/// A line of `adb devices` output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttachedDevice {
    pub serial: String,
    pub state: String,
}

impl AttachedDevice {
    /// `true` when adb reports the device as ready for shell commands.
    pub fn is_ready(&self) -> bool {
        self.state == "device"
    }
}

/// The endpoint an inventory was taken from.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub serial: String,
    pub model: String,
    pub brand: String,
    pub product_name: String,
    #[serde(rename = "marketName")]
    pub marketing_name: String,
    pub manufacturer: String,
    pub android_version: String,
    #[serde(rename = "displayName")]
    pub resolved_display_name: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub adb_available: bool,
    pub target_device: Option<String>,
    pub device_connected: bool,
    pub device_state: Option<String>,
    pub device_info: Option<DeviceIdentity>,
    pub all_devices: Vec<AttachedDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -----------------------------------------------------------------------------
// CacheSnapshot
// -----------------------------------------------------------------------------
/// The persisted inventory of one device at one point in time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    #[serde(rename = "apps")]
    pub items: BTreeMap<String, InventoryItem>,
    /// Epoch milliseconds of the last wholesale write.
    pub last_updated: i64,
    #[serde(rename = "deviceSerial")]
    pub owner_device_serial: Option<String>,
}

impl CacheSnapshot {
    /// A fresh, empty snapshot owned by `serial`.
    pub fn for_device(serial: &str, now: DateTime<Utc>) -> Self {
        Self {
            items: BTreeMap::new(),
            last_updated: now.timestamp_millis(),
            owner_device_serial: Some(serial.to_string()),
        }
    }

    /// A snapshot is consumable only for its owning device and only while it
    /// is younger than the validity window.
    pub fn is_valid_for(&self, serial: &str, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        if self.last_updated <= 0 || self.owner_device_serial.as_deref() != Some(serial) {
            return false;
        }
        let age_ms = now.timestamp_millis() - self.last_updated;
        age_ms < window.num_milliseconds()
    }
}

// -----------------------------------------------------------------------------
// Service responses
// -----------------------------------------------------------------------------
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InventoryListing {
    pub device_serial: String,
    pub items: Vec<InventoryItem>,
    pub cached: bool,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ItemLookup {
    pub device_serial: String,
    pub item: InventoryItem,
    pub cached: bool,
}

/// Result of one removal request.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemovalOutcome {
    pub identifier: String,
    pub success: bool,
    /// Set when the identifier was refused before any removal was attempted.
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
