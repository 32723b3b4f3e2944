//! Utility module for the regular expressions used to read device output.
use once_cell::sync::Lazy;
use regex::Regex;

/// Package identifiers that are safe to interpolate into a device shell command.
pub static PACKAGE_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*$").expect("package id regex"));

// `dumpsys package <id>` fields. Timestamps take the rest of the line because
// they may be either epoch millis or a formatted date-time.
pub static FIRST_INSTALL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"firstInstallTime=([^\n]+)").expect("firstInstallTime regex"));

pub static LAST_UPDATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"lastUpdateTime=([^\n]+)").expect("lastUpdateTime regex"));

pub static TIME_STAMP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"timeStamp=([^\n]+)").expect("timeStamp regex"));

pub static VERSION_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"versionName=(\S+)").expect("versionName regex"));

pub static VERSION_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"versionCode=(\d+)").expect("versionCode regex"));

pub static TARGET_SDK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"targetSdk=(\d+)").expect("targetSdk regex"));

pub static CODE_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"codePath=([^\n]+)").expect("codePath regex"));

pub static DATA_DIR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"dataDir=(\S+)").expect("dataDir regex"));

pub static INSTALLER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"installerPackageName=(\S+)").expect("installer regex"));

pub static ENABLED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"enabled=(\d+)").expect("enabled regex"));

pub static FLAGS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"flags=\[\s*([^\]]+?)\s*\]").expect("flags regex"));

/// `aapt dump badging` label line.
pub static APPLICATION_LABEL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"application-label:'([^']+)'").expect("application-label regex"));

/// Entries of the DeviceMarketingNames Kotlin source: `put("SM-F946U1", "Galaxy Z Fold5")`.
pub static DEVICE_DB_ENTRY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"put\("([^"]+)",\s*"([^"]+)"\)"#).expect("device db regex"));

/// Returns `true` if `identifier` is a well-formed package id.
pub fn is_valid_package_id(identifier: &str) -> bool {
    PACKAGE_ID_REGEX.is_match(identifier)
}

/// First capture group of `regex` in `text`, trimmed; `None` if absent or blank.
pub fn capture<'a>(regex: &Regex, text: &'a str) -> Option<&'a str> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}
