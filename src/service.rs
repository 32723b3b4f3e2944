//! The inventory boundary: target selection, cache-first listing, single-item
//! lookup, guarded removal and device status.
//!
//! Only [`ServiceError`] escapes from here. Cache I/O problems are logged and
//! otherwise ignored.
use crate::aapt::{AaptInspector, ArtifactInspector};
use crate::adb::{AdbChannel, DeviceChannel};
use crate::batch::BatchFetcher;
use crate::cache::{FileStore, InventoryCache, KeyValueStore};
use crate::config::InventoryConfig;
use crate::device_db::{DeviceNameDatabase, HttpTableSource, TableSource};
use crate::error::ServiceError;
use crate::models::{
    AttachedDevice, DeviceIdentity, DeviceStatus, InventoryItem, InventoryListing, ItemLookup,
    RemovalOutcome,
};
use crate::names::app_names::AppNameResolver;
use crate::names::device_names::{DeviceNameQuery, DeviceNameResolver};
use crate::protection::{ProtectionList, RemovalDecision};
use crate::regex_utils::is_valid_package_id;
use crate::report_parser::{self, DEVICE_PROPS_COMMAND};
use std::sync::Arc;

pub struct InventoryService {
    channel: Arc<dyn DeviceChannel>,
    fetcher: BatchFetcher,
    device_names: DeviceNameResolver,
    device_db: Arc<DeviceNameDatabase>,
    cache: InventoryCache,
    protection: ProtectionList,
    include_system_apps: bool,
    default_target: Option<String>,
}

impl InventoryService {
    /// Wires the service against adb, aapt, the HTTP name table and the
    /// on-disk cache named in `config`.
    pub fn from_config(config: &InventoryConfig) -> Self {
        let channel = Arc::new(AdbChannel::new(config.adb_path.clone(), config.query_timeout()));
        let inspector = Arc::new(AaptInspector::new(
            config.aapt_candidates.clone(),
            config.tool_timeout(),
        ));
        Self::new(
            channel,
            inspector,
            HttpTableSource::new(config.device_db_url.clone()),
            FileStore::new(config.cache_dir.clone()),
            config,
        )
    }

    pub fn new(
        channel: Arc<dyn DeviceChannel>,
        inspector: Arc<dyn ArtifactInspector>,
        table_source: impl TableSource + 'static,
        store: impl KeyValueStore + 'static,
        config: &InventoryConfig,
    ) -> Self {
        let app_names = Arc::new(AppNameResolver::new(
            channel.clone(),
            inspector,
            config.extract_labels,
        ));
        let device_db = Arc::new(DeviceNameDatabase::new(table_source, config.device_db_ttl()));

        Self {
            fetcher: BatchFetcher::new(
                channel.clone(),
                app_names,
                config.batch_width(),
                config.query_timeout(),
            ),
            device_names: DeviceNameResolver::new(device_db.clone()),
            device_db,
            cache: InventoryCache::new(store, config.cache_validity()),
            protection: ProtectionList::new(config.extra_protected_packages.clone()),
            include_system_apps: config.include_system_apps,
            default_target: config.target_serial.clone(),
            channel,
        }
    }

    /// Picks the device to talk to: the hint (or configured target) when it is
    /// attached, otherwise the first ready device.
    pub async fn resolve_target(&self, device_hint: Option<&str>) -> Result<String, ServiceError> {
        let devices = self.channel.list_devices().await?;
        select_target(&devices, device_hint.or(self.default_target.as_deref()))
    }

    /// Cached snapshot when valid for the target; otherwise a full acquisition
    /// that replaces the snapshot.
    pub async fn list_inventory(&self, device_hint: Option<&str>) -> Result<InventoryListing, ServiceError> {
        let serial = self.resolve_target(device_hint).await?;

        if let Some(snapshot) = self.cache.valid_snapshot(&serial) {
            return Ok(InventoryListing {
                device_serial: serial,
                items: snapshot.items.into_values().collect(),
                cached: true,
            });
        }

        log::info!("[INVENTORY] Fetching fresh app list from {}", serial);
        let items = self
            .fetcher
            .fetch_listed(&serial, self.include_system_apps)
            .await?;
        self.save_snapshot(&serial, &items).await;

        Ok(InventoryListing {
            device_serial: serial,
            items,
            cached: false,
        })
    }

    /// Cache-first lookup of one package on the default target.
    pub async fn get_item(&self, identifier: &str) -> Result<ItemLookup, ServiceError> {
        if !is_valid_package_id(identifier) {
            return Err(ServiceError::InvalidIdentifier(identifier.to_string()));
        }
        let serial = self.resolve_target(None).await?;

        if let Some(item) = self.cache.cached_item(&serial, identifier) {
            log::debug!("[INVENTORY] Cache hit for {}", identifier);
            return Ok(ItemLookup {
                device_serial: serial,
                item,
                cached: true,
            });
        }

        // Degraded records are cached too; `resolution_succeeded` marks them.
        let item = self.fetcher.fetch_one(&serial, identifier).await;
        if let Err(e) = self.cache.upsert_item(&serial, &item).await {
            log::warn!("[CACHE] Failed to cache {}: {}", identifier, e);
        }

        Ok(ItemLookup {
            device_serial: serial,
            item,
            cached: false,
        })
    }

    /// Uninstalls each identifier for user 0, in request order. Protected
    /// identifiers are reported as skipped and never attempted.
    pub async fn remove_items(&self, identifiers: &[String]) -> Result<Vec<RemovalOutcome>, ServiceError> {
        let serial = self.resolve_target(None).await?;
        let mut outcomes = Vec::with_capacity(identifiers.len());

        for identifier in identifiers {
            outcomes.push(self.remove_one(&serial, identifier).await);
        }

        let removed: Vec<String> = outcomes
            .iter()
            .filter(|outcome| outcome.success)
            .map(|outcome| outcome.identifier.clone())
            .collect();
        if !removed.is_empty() {
            if let Err(e) = self.cache.remove_items(&serial, &removed).await {
                log::warn!("[CACHE] Failed to drop removed apps from cache: {}", e);
            }
        }

        log::info!(
            "[INVENTORY] Removal finished: {} of {} succeeded",
            removed.len(),
            identifiers.len()
        );
        Ok(outcomes)
    }

    async fn remove_one(&self, serial: &str, identifier: &str) -> RemovalOutcome {
        if let RemovalDecision::Deny(reason) = self.protection.check(identifier) {
            log::info!("[INVENTORY] Skipping protected package {}", identifier);
            return RemovalOutcome {
                identifier: identifier.to_string(),
                success: false,
                skipped: true,
                reason: Some(reason),
            };
        }

        if !is_valid_package_id(identifier) {
            return RemovalOutcome {
                identifier: identifier.to_string(),
                success: false,
                skipped: false,
                reason: Some("invalid package identifier".to_string()),
            };
        }

        let command = format!("pm uninstall --user 0 {}", identifier);
        let (success, reason) = match self.channel.run_query(serial, &command).await {
            Ok(output) if report_parser::is_uninstall_success(&output) => (true, None),
            Ok(output) => (false, Some(output.trim().to_string())),
            Err(e) => (false, Some(e.to_string())),
        };
        RemovalOutcome {
            identifier: identifier.to_string(),
            success,
            skipped: false,
            reason,
        }
    }

    /// Deletes the persisted snapshot. The remote name table is kept.
    pub async fn clear_cache(&self) {
        if let Err(e) = self.cache.clear().await {
            log::warn!("[CACHE] Failed to clear cache: {}", e);
        }
    }

    /// Overwrites the persisted snapshot with `items` for `serial`.
    pub async fn save_snapshot(&self, serial: &str, items: &[InventoryItem]) {
        if let Err(e) = self.cache.save_snapshot(serial, items).await {
            log::warn!("[CACHE] Failed to save snapshot for {}: {}", serial, e);
        }
    }

    /// Forces the next device-name lookup to refetch the remote table.
    pub async fn invalidate_device_names(&self) {
        self.device_db.invalidate().await;
    }

    /// Reads identity properties from `serial` and resolves its display name.
    pub async fn resolve_device(&self, serial: &str) -> DeviceIdentity {
        let props = match self.channel.run_query(serial, DEVICE_PROPS_COMMAND).await {
            Ok(output) => report_parser::parse_device_props(&output),
            Err(e) => {
                log::warn!("[INVENTORY] Failed to read device properties: {}", e);
                Default::default()
            }
        };

        let query = DeviceNameQuery::from_props(serial, &props);
        let resolved_display_name = self.device_names.resolve_device_name(&query).await;
        DeviceIdentity {
            serial: serial.to_string(),
            model: props.model,
            brand: props.brand,
            product_name: props.product_name,
            marketing_name: props.marketing_name,
            manufacturer: props.manufacturer,
            android_version: props.android_version,
            resolved_display_name,
        }
    }

    /// Channel availability, attached devices and the selected target. Never
    /// fails; problems are reported in the `error` field.
    pub async fn device_status(&self, device_hint: Option<&str>) -> DeviceStatus {
        let mut status = DeviceStatus {
            adb_available: false,
            target_device: None,
            device_connected: false,
            device_state: None,
            device_info: None,
            all_devices: Vec::new(),
            error: None,
        };

        if let Err(e) = self.channel.version().await {
            status.error = Some(e.to_string());
            return status;
        }
        status.adb_available = true;

        status.all_devices = match self.channel.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                status.error = Some(e.to_string());
                return status;
            }
        };

        let hint = device_hint.or(self.default_target.as_deref());
        match select_target(&status.all_devices, hint) {
            Ok(serial) => {
                status.device_connected = true;
                status.device_state = Some("device".to_string());
                status.device_info = Some(self.resolve_device(&serial).await);
                status.target_device = Some(serial);
            }
            Err(ServiceError::DeviceUnavailable { serial, state }) => {
                status.target_device = Some(serial);
                status.device_state = Some(state);
            }
            Err(e) => status.error = Some(e.to_string()),
        }
        status
    }
}

fn select_target(devices: &[AttachedDevice], hint: Option<&str>) -> Result<String, ServiceError> {
    if let Some(hint) = hint {
        if let Some(device) = devices.iter().find(|d| d.serial == hint) {
            if device.is_ready() {
                return Ok(device.serial.clone());
            }
            return Err(ServiceError::DeviceUnavailable {
                serial: device.serial.clone(),
                state: device.state.clone(),
            });
        }
        log::debug!("[INVENTORY] Requested device {} is not attached", hint);
    }

    if let Some(device) = devices.iter().find(|d| d.is_ready()) {
        return Ok(device.serial.clone());
    }
    match devices.first() {
        Some(device) => Err(ServiceError::DeviceUnavailable {
            serial: device.serial.clone(),
            state: device.state.clone(),
        }),
        None => Err(ServiceError::NoDevice),
    }
}
