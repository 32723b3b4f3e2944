//! Application display names: APK label, then a bundled table, then a name
//! derived from the package id.
use super::{capitalize_first, NameTier, ResolverChain};
use crate::aapt::ArtifactInspector;
use crate::adb::DeviceChannel;
use crate::error::ToolError;
use crate::regex_utils::is_valid_package_id;
use crate::report_parser;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Returned when nothing at all can be derived from the identifier.
pub const UNKNOWN_APP: &str = "Unknown App";

const KNOWN_APP_NAMES: &[(&str, &str)] = &[
    ("com.spotify.music", "Spotify"),
    ("com.facebook.katana", "Facebook"),
    ("com.instagram.android", "Instagram"),
    ("com.whatsapp", "WhatsApp"),
    ("com.google.android.youtube", "YouTube"),
    ("com.twitter.android", "Twitter"),
    ("com.samsung.android.messaging", "Samsung Messages"),
    ("com.samsung.android.contacts", "Samsung Contacts"),
    ("com.android.chrome", "Chrome"),
    ("com.google.android.gm", "Gmail"),
    ("com.samsung.android.gallery3d", "Samsung Gallery"),
];

#[derive(Debug, Clone)]
pub struct AppNameQuery {
    pub serial: String,
    pub identifier: String,
}

/// Pulls the package's base APK into a scoped temp directory and reads
/// `application-label` from the inspection tool's report.
pub struct ApkLabelTier {
    channel: Arc<dyn DeviceChannel>,
    inspector: Arc<dyn ArtifactInspector>,
}

impl ApkLabelTier {
    pub fn new(channel: Arc<dyn DeviceChannel>, inspector: Arc<dyn ArtifactInspector>) -> Self {
        Self { channel, inspector }
    }

    async fn extract_label(&self, query: &AppNameQuery) -> Result<String, ToolError> {
        let command = format!("pm path {}", query.identifier);
        let path_output = self
            .channel
            .run_query(&query.serial, &command)
            .await
            .map_err(|e| ToolError::Failed(format!("pm path: {}", e)))?;
        let apk_path = report_parser::parse_apk_path(&path_output)
            .ok_or_else(|| ToolError::Failed("no APK path reported".to_string()))?;

        let temp_dir = tempfile::Builder::new().prefix("droid-inventory-apk").tempdir()?;
        let local = temp_dir
            .path()
            .join(format!("{}.apk", query.identifier.replace('.', "_")));

        let result = self.pull_and_inspect(query, &apk_path, &local).await;

        // The label result wins over a cleanup failure.
        if let Err(e) = temp_dir.close() {
            log::warn!(
                "[AAPT] Failed to clean up temp APK for {}: {}",
                query.identifier,
                e
            );
        }
        result
    }

    async fn pull_and_inspect(
        &self,
        query: &AppNameQuery,
        apk_path: &str,
        local: &Path,
    ) -> Result<String, ToolError> {
        self.channel
            .pull_file(&query.serial, apk_path, local)
            .await
            .map_err(|e| ToolError::Failed(format!("pull: {}", e)))?;
        let report = self.inspector.inspect_artifact(local).await?;
        report_parser::parse_application_label(&report).ok_or(ToolError::NoLabel)
    }
}

#[async_trait]
impl NameTier<AppNameQuery> for ApkLabelTier {
    fn label(&self) -> &'static str {
        "apk-label"
    }

    async fn resolve(&self, query: &AppNameQuery) -> Option<String> {
        if !is_valid_package_id(&query.identifier) {
            return None;
        }
        match self.extract_label(query).await {
            Ok(label) => Some(label),
            Err(e) => {
                log::debug!(
                    "[AAPT] Label extraction failed for {}: {}",
                    query.identifier,
                    e
                );
                None
            }
        }
    }
}

/// Exact-match lookup in the bundled table of well-known apps.
pub struct KnownAppsTier;

#[async_trait]
impl NameTier<AppNameQuery> for KnownAppsTier {
    fn label(&self) -> &'static str {
        "known-apps"
    }

    async fn resolve(&self, query: &AppNameQuery) -> Option<String> {
        known_app_name(&query.identifier).map(str::to_string)
    }
}

pub fn known_app_name(identifier: &str) -> Option<&'static str> {
    KNOWN_APP_NAMES
        .iter()
        .find(|(id, _)| *id == identifier)
        .map(|(_, name)| *name)
}

/// Turns `com.example.my_app` into `My app`.
///
/// Falls back to the identifier itself when its last segment is empty, and to
/// [`UNKNOWN_APP`] when the identifier is blank, so the result is never empty.
pub fn derive_display_name(identifier: &str) -> String {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return UNKNOWN_APP.to_string();
    }

    let segment = identifier.rsplit('.').next().unwrap_or(identifier);
    let spaced = segment.replace(['_', '-'], " ");
    let derived = capitalize_first(spaced.trim());
    if derived.is_empty() {
        identifier.to_string()
    } else {
        derived
    }
}

/// Total application-name resolution.
pub struct AppNameResolver {
    chain: ResolverChain<AppNameQuery>,
}

impl AppNameResolver {
    /// Full chain. Label extraction is skipped when `extract_labels` is off.
    pub fn new(
        channel: Arc<dyn DeviceChannel>,
        inspector: Arc<dyn ArtifactInspector>,
        extract_labels: bool,
    ) -> Self {
        let mut chain = ResolverChain::<AppNameQuery>::new(fallback_name);
        if extract_labels {
            chain = chain.with_tier(ApkLabelTier::new(channel, inspector));
        }
        Self {
            chain: chain.with_tier(KnownAppsTier),
        }
    }

    /// Table and heuristic only; never touches the device.
    pub fn offline() -> Self {
        Self {
            chain: ResolverChain::<AppNameQuery>::new(fallback_name).with_tier(KnownAppsTier),
        }
    }

    pub async fn resolve_app_name(&self, serial: &str, identifier: &str) -> String {
        let query = AppNameQuery {
            serial: serial.to_string(),
            identifier: identifier.to_string(),
        };
        self.chain.resolve(&query).await
    }
}

fn fallback_name(query: &AppNameQuery) -> String {
    derive_display_name(&query.identifier)
}
