//! Per-package detail acquisition with a bounded number of queries in flight.
//!
//! Every requested identifier yields exactly one record. A failure for one
//! package produces a degraded record for that package and nothing else.
use crate::adb::DeviceChannel;
use crate::error::QueryError;
use crate::models::{AppKind, InventoryItem, UNKNOWN};
use crate::names::app_names::AppNameResolver;
use crate::regex_utils::is_valid_package_id;
use crate::report_parser;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const LIST_USER_PACKAGES: &str = "pm list packages -3";
const LIST_SYSTEM_PACKAGES: &str = "pm list packages -s";

pub struct BatchFetcher {
    channel: Arc<dyn DeviceChannel>,
    app_names: Arc<AppNameResolver>,
    width: usize,
    query_timeout: Duration,
}

impl BatchFetcher {
    pub fn new(
        channel: Arc<dyn DeviceChannel>,
        app_names: Arc<AppNameResolver>,
        width: usize,
        query_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            app_names,
            width: width.max(1),
            query_timeout,
        }
    }

    /// Identifiers of user-installed packages.
    pub async fn list_user_packages(&self, serial: &str) -> Result<Vec<String>, QueryError> {
        let output = self.query(serial, LIST_USER_PACKAGES).await?;
        Ok(report_parser::parse_package_list(&output))
    }

    /// Enumerates the device's packages and fetches all of them.
    pub async fn fetch_listed(
        &self,
        serial: &str,
        include_system: bool,
    ) -> Result<Vec<InventoryItem>, QueryError> {
        let user_packages = self.list_user_packages(serial).await?;
        let mut identifiers = user_packages.clone();

        if include_system {
            match self.query(serial, LIST_SYSTEM_PACKAGES).await {
                Ok(output) => identifiers.extend(report_parser::parse_package_list(&output)),
                Err(e) => log::warn!("[BATCH] Failed to list system packages: {}", e),
            }
        }

        let user_set: HashSet<String> = user_packages.into_iter().collect();
        Ok(self.fetch_with_kinds(serial, &identifiers, Some(&user_set)).await)
    }

    /// Fetches details for `identifiers`. Duplicates are collapsed; the output
    /// follows the order of first appearance.
    pub async fn fetch_inventory(&self, serial: &str, identifiers: &[String]) -> Vec<InventoryItem> {
        let user_set = self.user_package_set(serial).await;
        self.fetch_with_kinds(serial, identifiers, user_set.as_ref()).await
    }

    /// Single-package acquisition.
    pub async fn fetch_one(&self, serial: &str, identifier: &str) -> InventoryItem {
        let user_set = self.user_package_set(serial).await;
        self.fetch_item(serial, identifier, user_set.as_ref()).await
    }

    async fn user_package_set(&self, serial: &str) -> Option<HashSet<String>> {
        match self.list_user_packages(serial).await {
            Ok(packages) => Some(packages.into_iter().collect()),
            Err(e) => {
                log::warn!("[BATCH] Could not list user packages, kinds unknown: {}", e);
                None
            }
        }
    }

    async fn fetch_with_kinds(
        &self,
        serial: &str,
        identifiers: &[String],
        user_set: Option<&HashSet<String>>,
    ) -> Vec<InventoryItem> {
        let unique: Vec<&String> = identifiers.iter().unique().collect();
        log::info!(
            "[BATCH] Fetching {} packages from {} ({} at a time)",
            unique.len(),
            serial,
            self.width
        );

        let items: Vec<InventoryItem> = stream::iter(unique)
            .map(|identifier| self.fetch_item(serial, identifier, user_set))
            .buffered(self.width)
            .collect()
            .await;

        let degraded = items.iter().filter(|item| !item.resolution_succeeded).count();
        log::info!(
            "[BATCH] Completed {} packages ({} degraded)",
            items.len(),
            degraded
        );
        items
    }

    async fn fetch_item(
        &self,
        serial: &str,
        identifier: &str,
        user_set: Option<&HashSet<String>>,
    ) -> InventoryItem {
        let display_name = self.app_names.resolve_app_name(serial, identifier).await;

        if !is_valid_package_id(identifier) {
            return InventoryItem::degraded(identifier, display_name, "invalid package identifier");
        }

        let report = match self.query(serial, &format!("dumpsys package {}", identifier)).await {
            Ok(text) if !text.trim().is_empty() => report_parser::parse_package_report(&text),
            Ok(_) => {
                return InventoryItem::degraded(identifier, display_name, "empty package report")
            }
            Err(e) => {
                log::warn!("[BATCH] Failed to fetch details for {}: {}", identifier, e);
                return InventoryItem::degraded(identifier, display_name, e.to_string());
            }
        };

        let size = self.probe_size(serial, report.code_path.as_deref()).await;
        let data_size = self.probe_size(serial, report.data_dir.as_deref()).await;

        let kind = match user_set {
            Some(set) if set.contains(identifier) => AppKind::User,
            Some(_) => AppKind::System,
            None => AppKind::Unknown,
        };

        InventoryItem {
            identifier: identifier.to_string(),
            display_name,
            kind,
            size,
            installed_at: report.installed_at,
            updated_at: report.updated_at,
            last_used_at: report.last_used_at,
            version_name: report.version_name.unwrap_or_else(|| UNKNOWN.to_string()),
            version_code: report.version_code.unwrap_or(0),
            target_sdk: report.target_sdk,
            install_source: report.install_source,
            enabled: report.enabled,
            flags: report.flags,
            data_size,
            resolution_succeeded: true,
            error: None,
            cached_at: None,
        }
    }

    /// `du -sh` on a device path. Any failure reads as `"Unknown"`.
    async fn probe_size(&self, serial: &str, path: Option<&str>) -> String {
        let Some(path) = path else {
            return UNKNOWN.to_string();
        };
        match self.query(serial, &format!("du -sh \"{}\"", path)).await {
            Ok(output) => report_parser::parse_du_size(&output),
            Err(e) => {
                log::debug!("[BATCH] Size probe failed for {}: {}", path, e);
                UNKNOWN.to_string()
            }
        }
    }

    async fn query(&self, serial: &str, command: &str) -> Result<String, QueryError> {
        match tokio::time::timeout(self.query_timeout, self.channel.run_query(serial, command)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(self.query_timeout.as_secs())),
        }
    }
}
