//! Pure parsers for the text reports produced on the device.
//!
//! Every function here is total: a field that is missing or malformed comes
//! back as `None` or as the `"Unknown"` sentinel, never as an error.
use crate::models::{AttachedDevice, InstallSource, ReportDate, UNKNOWN};
use crate::regex_utils::{self, capture};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use itertools::Itertools;

/// Maximum number of package flags kept per record.
pub const MAX_FLAGS: usize = 3;

/// Date-time layouts seen in `dumpsys package` output across Android releases.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Partial record extracted from `dumpsys package <id>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageReport {
    pub installed_at: ReportDate,
    pub updated_at: ReportDate,
    pub last_used_at: ReportDate,
    pub version_name: Option<String>,
    pub version_code: Option<u64>,
    pub target_sdk: Option<u32>,
    pub code_path: Option<String>,
    pub data_dir: Option<String>,
    pub install_source: InstallSource,
    pub enabled: bool,
    pub flags: Vec<String>,
}

/// Device properties read through `getprop`, one per line in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceProps {
    pub model: String,
    pub brand: String,
    pub product_name: String,
    pub marketing_name: String,
    pub manufacturer: String,
    pub android_version: String,
}

/// Shell command that prints the properties consumed by [`parse_device_props`].
pub const DEVICE_PROPS_COMMAND: &str = "getprop ro.product.model; \
getprop ro.product.brand; \
getprop ro.product.name; \
getprop ro.product.marketname; \
getprop ro.product.manufacturer; \
getprop ro.build.version.release";

/// Parses a timestamp captured from a report.
///
/// All-digit input is epoch milliseconds; anything else is tried as a
/// calendar date-time. Both yield the UTC calendar date. Unparseable input
/// yields [`ReportDate::Unknown`].
pub fn parse_report_date(raw: &str) -> ReportDate {
    let raw = raw.trim();
    if raw.is_empty() {
        return ReportDate::Unknown;
    }

    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| ReportDate::Date(dt.date_naive()))
            .unwrap_or(ReportDate::Unknown);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return ReportDate::Date(dt.naive_utc().date());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return ReportDate::Date(dt.date());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(ReportDate::Date)
        .unwrap_or(ReportDate::Unknown)
}

/// Extracts the fields of interest from `dumpsys package <id>` output.
pub fn parse_package_report(text: &str) -> PackageReport {
    let installed_at = capture(&regex_utils::FIRST_INSTALL_REGEX, text)
        .map(parse_report_date)
        .unwrap_or_default();

    // A missing or unreadable update time means the app was never updated.
    let updated_at = capture(&regex_utils::LAST_UPDATE_REGEX, text)
        .map(parse_report_date)
        .unwrap_or_default()
        .or(installed_at);

    let last_used_at = capture(&regex_utils::TIME_STAMP_REGEX, text)
        .map(parse_report_date)
        .unwrap_or_default();

    let install_source = capture(&regex_utils::INSTALLER_REGEX, text)
        .map(InstallSource::from_installer)
        .unwrap_or_default();

    // 0 = default state, 1 = explicitly enabled; anything higher is a disabled state.
    let enabled = capture(&regex_utils::ENABLED_REGEX, text)
        .and_then(|v| v.parse::<u32>().ok())
        .map(|state| state <= 1)
        .unwrap_or(true);

    let flags = capture(&regex_utils::FLAGS_REGEX, text)
        .map(|raw| {
            raw.split_whitespace()
                .take(MAX_FLAGS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PackageReport {
        installed_at,
        updated_at,
        last_used_at,
        version_name: capture(&regex_utils::VERSION_NAME_REGEX, text).map(str::to_string),
        version_code: capture(&regex_utils::VERSION_CODE_REGEX, text).and_then(|v| v.parse().ok()),
        target_sdk: capture(&regex_utils::TARGET_SDK_REGEX, text).and_then(|v| v.parse().ok()),
        code_path: capture(&regex_utils::CODE_PATH_REGEX, text).map(str::to_string),
        data_dir: capture(&regex_utils::DATA_DIR_REGEX, text).map(str::to_string),
        install_source,
        enabled,
        flags,
    }
}

/// Parses `pm list packages` output into unique package ids, preserving order.
pub fn parse_package_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// Parses `adb devices` output. The header line and blank lines are skipped.
pub fn parse_device_list(text: &str) -> Vec<AttachedDevice> {
    text.lines()
        .filter(|line| line.contains('\t'))
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let serial = parts.next()?.trim();
            let state = parts.next()?.trim();
            if serial.is_empty() {
                return None;
            }
            Some(AttachedDevice {
                serial: serial.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// Parses the output of [`DEVICE_PROPS_COMMAND`]. `getprop` prints an empty
/// line for an unset property, so positions are significant.
pub fn parse_device_props(text: &str) -> DeviceProps {
    let mut lines = text.lines().map(|line| line.trim().to_string());
    let mut next = || lines.next().unwrap_or_default();
    DeviceProps {
        model: next(),
        brand: next(),
        product_name: next(),
        marketing_name: next(),
        manufacturer: next(),
        android_version: next(),
    }
}

/// Parses `du -sh <path>` output into a display size. Empty or zero output
/// usually means the path was unreadable, so it maps to `"Unknown"`.
pub fn parse_du_size(text: &str) -> String {
    match text.split_whitespace().next() {
        Some(size) if !is_zero_size(size) => size.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn is_zero_size(size: &str) -> bool {
    size.trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse::<f64>()
        .map(|v| v == 0.0)
        .unwrap_or(false)
}

/// First APK path in `pm path <id>` output.
pub fn parse_apk_path(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(str::trim)
        .find(|path| !path.is_empty())
        .map(str::to_string)
}

/// Application label from `aapt dump badging` output.
pub fn parse_application_label(text: &str) -> Option<String> {
    capture(&regex_utils::APPLICATION_LABEL_REGEX, text).map(str::to_string)
}

/// `pm uninstall` prints `Success` on success and `Failure [...]` otherwise.
pub fn is_uninstall_success(output: &str) -> bool {
    output.contains("Success")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOTIFY_DUMPSYS: &str = "\
Packages:
  Package [com.spotify.music] (a1b2c3):
    userId=10234
    pkg=Package{d4e5f6 com.spotify.music}
    codePath=/data/app/~~xyz==/com.spotify.music-abc==
    resourcePath=/data/app/~~xyz==/com.spotify.music-abc==
    dataDir=/data/user/0/com.spotify.music
    versionCode=109400123 minSdk=24 targetSdk=34
    versionName=8.9.40.414
    flags=[ HAS_CODE ALLOW_CLEAR_USER_DATA ALLOW_BACKUP LARGE_HEAP ]
    privateFlags=[ PRIVATE_FLAG_ACTIVITIES_RESIZE_MODE_RESIZEABLE ]
    timeStamp=2024-04-02 10:15:30
    firstInstallTime=2023-01-15 08:00:01
    lastUpdateTime=2024-04-02 10:16:02
    installerPackageName=com.android.vending
    User 0: ceDataInode=1234 installed=true hidden=false suspended=false stopped=false notLaunched=false enabled=0 instant=false virtual=false
";

    #[test]
    fn parses_full_report() {
        let report = parse_package_report(SPOTIFY_DUMPSYS);
        assert_eq!(report.installed_at.to_string(), "2023-01-15");
        assert_eq!(report.updated_at.to_string(), "2024-04-02");
        assert_eq!(report.last_used_at.to_string(), "2024-04-02");
        assert_eq!(report.version_name.as_deref(), Some("8.9.40.414"));
        assert_eq!(report.version_code, Some(109400123));
        assert_eq!(report.target_sdk, Some(34));
        assert_eq!(
            report.code_path.as_deref(),
            Some("/data/app/~~xyz==/com.spotify.music-abc==")
        );
        assert_eq!(report.data_dir.as_deref(), Some("/data/user/0/com.spotify.music"));
        assert_eq!(report.install_source, InstallSource::PlayStore);
        assert!(report.enabled);
        assert_eq!(
            report.flags,
            vec!["HAS_CODE", "ALLOW_CLEAR_USER_DATA", "ALLOW_BACKUP"]
        );
    }

    #[test]
    fn empty_report_is_all_sentinels() {
        let report = parse_package_report("");
        assert_eq!(report.installed_at, ReportDate::Unknown);
        assert_eq!(report.updated_at, ReportDate::Unknown);
        assert_eq!(report.last_used_at, ReportDate::Unknown);
        assert_eq!(report.version_name, None);
        assert_eq!(report.version_code, None);
        assert_eq!(report.target_sdk, None);
        assert_eq!(report.install_source, InstallSource::Unknown);
        assert!(report.enabled);
        assert!(report.flags.is_empty());
    }

    #[test]
    fn garbage_report_does_not_panic() {
        let report = parse_package_report("firstInstallTime=\u{0}\u{1}??\nversionCode=abc\nflags=[");
        assert_eq!(report.installed_at, ReportDate::Unknown);
        assert_eq!(report.version_code, None);
        assert!(report.flags.is_empty());
    }

    #[test]
    fn epoch_millis_and_formatted_date_agree() {
        // 2023-06-15T12:30:00Z
        let from_millis = parse_report_date("1686832200000");
        let from_string = parse_report_date("2023-06-15 12:30:00");
        assert_eq!(from_millis, from_string);
        assert_eq!(from_millis.to_string(), "2023-06-15");
    }

    #[test]
    fn date_variants() {
        assert_eq!(parse_report_date("2023-06-15T12:30:00Z").to_string(), "2023-06-15");
        assert_eq!(parse_report_date("2023-06-15").to_string(), "2023-06-15");
        assert_eq!(parse_report_date("  2023-06-15 12:30  ").to_string(), "2023-06-15");
        assert_eq!(parse_report_date("yesterday"), ReportDate::Unknown);
        assert_eq!(parse_report_date(""), ReportDate::Unknown);
        assert_eq!(parse_report_date("99999999999999999999999"), ReportDate::Unknown);
    }

    #[test]
    fn update_time_falls_back_to_install_time() {
        let report = parse_package_report("firstInstallTime=1686832200000\nlastUpdateTime=never\n");
        assert_eq!(report.updated_at, report.installed_at);
        assert!(report.updated_at.is_known());
    }

    #[test]
    fn enabled_states() {
        assert!(parse_package_report("enabled=0").enabled);
        assert!(parse_package_report("enabled=1").enabled);
        assert!(!parse_package_report("enabled=2").enabled);
        assert!(!parse_package_report("enabled=3").enabled);
    }

    #[test]
    fn installer_variants() {
        let sideloaded = parse_package_report("installerPackageName=null\n");
        assert_eq!(sideloaded.install_source, InstallSource::Sideloaded);
        let samsung = parse_package_report("installerPackageName=com.sec.android.app.samsungapps\n");
        assert_eq!(samsung.install_source, InstallSource::SamsungStore);
        let raw = parse_package_report("installerPackageName=com.aurora.store\n");
        assert_eq!(raw.install_source, InstallSource::Other("com.aurora.store".into()));
    }

    #[test]
    fn package_list_dedups_and_skips_noise() {
        let out = "package:com.a\r\npackage:com.b\n\nWARNING: linker\npackage:com.a\npackage:\n";
        assert_eq!(parse_package_list(out), vec!["com.a", "com.b"]);
    }

    #[test]
    fn device_list_skips_header() {
        let out = "List of devices attached\nRFCW708JTVX\tdevice\nemulator-5554\toffline\n\n";
        let devices = parse_device_list(out);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "RFCW708JTVX");
        assert!(devices[0].is_ready());
        assert!(!devices[1].is_ready());
    }

    #[test]
    fn device_props_keep_positions() {
        let props = parse_device_props("SM-F946U1\nsamsung\nq5quew\n\nsamsung\n14\n");
        assert_eq!(props.model, "SM-F946U1");
        assert_eq!(props.brand, "samsung");
        assert_eq!(props.product_name, "q5quew");
        assert_eq!(props.marketing_name, "");
        assert_eq!(props.manufacturer, "samsung");
        assert_eq!(props.android_version, "14");

        let short = parse_device_props("Pixel 8\n");
        assert_eq!(short.model, "Pixel 8");
        assert_eq!(short.android_version, "");
    }

    #[test]
    fn du_sizes() {
        assert_eq!(parse_du_size("142M\t/data/app/com.x\n"), "142M");
        assert_eq!(parse_du_size("1.5G /data/app"), "1.5G");
        assert_eq!(parse_du_size("0K\t/data/app"), UNKNOWN);
        assert_eq!(parse_du_size("0\t/data"), UNKNOWN);
        assert_eq!(parse_du_size(""), UNKNOWN);
    }

    #[test]
    fn apk_path_and_label() {
        assert_eq!(
            parse_apk_path("package:/data/app/com.x-1/base.apk\npackage:/data/app/com.x-1/split.apk\n"),
            Some("/data/app/com.x-1/base.apk".to_string())
        );
        assert_eq!(parse_apk_path(""), None);
        assert_eq!(
            parse_application_label("package: name='com.x'\napplication-label:'Spotify'\napplication-icon-160:'res/x.png'"),
            Some("Spotify".to_string())
        );
        assert_eq!(parse_application_label("application: label='' icon=''"), None);
    }

    #[test]
    fn uninstall_output() {
        assert!(is_uninstall_success("Success\n"));
        assert!(!is_uninstall_success("Failure [DELETE_FAILED_INTERNAL_ERROR]\n"));
        assert!(!is_uninstall_success(""));
    }
}
