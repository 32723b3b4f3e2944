//! Remote model-id → marketing-name table with its own in-memory TTL.
//!
//! The table is fetched lazily on the first lookup after expiry. A failed
//! fetch leaves an empty table that counts as fresh, so a broken source costs
//! at most one round trip per TTL window.
use crate::error::FetchError;
use crate::regex_utils::DEVICE_DB_ENTRY_REGEX;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Where the raw table document comes from.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Downloads the table document over HTTP.
pub struct HttpTableSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTableSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl TableSource for HttpTableSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        log::info!("[DEVICE-DB] Fetching device database from: {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

struct NameTable {
    entries: HashMap<String, String>,
    fetched_at: Instant,
}

/// Process-scoped cache of the remote name table.
pub struct DeviceNameDatabase {
    source: Box<dyn TableSource>,
    ttl: Duration,
    table: Mutex<Option<NameTable>>,
}

impl DeviceNameDatabase {
    pub fn new(source: impl TableSource + 'static, ttl: Duration) -> Self {
        Self {
            source: Box::new(source),
            ttl,
            table: Mutex::new(None),
        }
    }

    /// Looks up `model` by exact key, then upper-case, then lower-case.
    pub async fn lookup(&self, model: &str) -> Option<String> {
        let model = model.trim();
        if model.is_empty() {
            return None;
        }

        // Holding the lock across the fetch keeps concurrent lookups to one request.
        let mut guard = self.table.lock().await;
        let stale = (*guard)
            .as_ref()
            .map(|table| table.fetched_at.elapsed() >= self.ttl)
            .unwrap_or(true);

        if stale {
            log::info!("[DEVICE-DB] Cache expired, fetching fresh data...");
            let entries = self.fetch_entries().await;
            *guard = Some(NameTable {
                entries,
                fetched_at: Instant::now(),
            });
        }

        let entries = &(*guard).as_ref()?.entries;
        let candidates = [model.to_string(), model.to_uppercase(), model.to_lowercase()];
        let hit = candidates.iter().find_map(|key| entries.get(key)).cloned();
        if let Some(name) = &hit {
            log::debug!("[DEVICE-DB] Found match: {} -> {}", model, name);
        }
        hit
    }

    /// Drops the cached table so the next lookup fetches again.
    pub async fn invalidate(&self) {
        *self.table.lock().await = None;
        log::info!("[DEVICE-DB] Cache cleared");
    }

    async fn fetch_entries(&self) -> HashMap<String, String> {
        match self.source.fetch().await {
            Ok(document) => {
                let entries = parse_name_table(&document);
                log::info!("[DEVICE-DB] Successfully parsed {} devices", entries.len());
                entries
            }
            Err(e) => {
                log::warn!("[DEVICE-DB] Failed to fetch device database: {}", e);
                HashMap::new()
            }
        }
    }
}

/// Extracts `put("MODEL", "Name")` pairs. Lines that do not match are ignored.
pub fn parse_name_table(document: &str) -> HashMap<String, String> {
    DEVICE_DB_ENTRY_REGEX
        .captures_iter(document)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}
