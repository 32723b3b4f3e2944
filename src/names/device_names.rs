//! Device display names, from the most to the least specific source.
use super::{capitalize_first, NameTier, ResolverChain};
use crate::device_db::DeviceNameDatabase;
use crate::report_parser::DeviceProps;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const UNKNOWN_DEVICE: &str = "Unknown Device";

/// Devices that report no usable properties but have recognisable serials.
static SERIAL_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"^8557R58QQS16", "Spotify Car Thing"),
        (r"^RFCW708JTVX", "Samsung Galaxy Z Fold5"),
    ]
    .into_iter()
    .map(|(pattern, name)| (Regex::new(pattern).expect("Invalid serial pattern"), name))
    .collect()
});

/// Samsung foldables whose model ids carry a regional suffix.
const SAMSUNG_MODEL_FAMILIES: &[(&str, &str)] = &[
    ("F946U", "Samsung Galaxy Z Fold5"),
    ("F936U", "Samsung Galaxy Z Fold4"),
    ("F926U", "Samsung Galaxy Z Fold3"),
];

#[derive(Debug, Clone, Default)]
pub struct DeviceNameQuery {
    pub model: String,
    pub brand: String,
    pub marketing_name: String,
    pub manufacturer: String,
    pub serial: String,
}

impl DeviceNameQuery {
    pub fn from_props(serial: &str, props: &DeviceProps) -> Self {
        Self {
            model: props.model.clone(),
            brand: props.brand.clone(),
            marketing_name: props.marketing_name.clone(),
            manufacturer: props.manufacturer.clone(),
            serial: serial.to_string(),
        }
    }
}

/// `ro.product.marketname` as reported by the device.
pub struct LiveMarketingNameTier;

#[async_trait]
impl NameTier<DeviceNameQuery> for LiveMarketingNameTier {
    fn label(&self) -> &'static str {
        "live-marketing-name"
    }

    async fn resolve(&self, query: &DeviceNameQuery) -> Option<String> {
        let name = query.marketing_name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("unknown") {
            return None;
        }
        Some(name.to_string())
    }
}

pub struct RemoteDatabaseTier {
    database: Arc<DeviceNameDatabase>,
}

impl RemoteDatabaseTier {
    pub fn new(database: Arc<DeviceNameDatabase>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl NameTier<DeviceNameQuery> for RemoteDatabaseTier {
    fn label(&self) -> &'static str {
        "device-database"
    }

    async fn resolve(&self, query: &DeviceNameQuery) -> Option<String> {
        self.database.lookup(&query.model).await
    }
}

pub struct SerialPatternTier;

#[async_trait]
impl NameTier<DeviceNameQuery> for SerialPatternTier {
    fn label(&self) -> &'static str {
        "serial-pattern"
    }

    async fn resolve(&self, query: &DeviceNameQuery) -> Option<String> {
        let serial = query.serial.trim();
        if serial.is_empty() {
            return None;
        }
        SERIAL_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(serial))
            .map(|(_, name)| name.to_string())
    }
}

pub struct ModelFamilyTier;

#[async_trait]
impl NameTier<DeviceNameQuery> for ModelFamilyTier {
    fn label(&self) -> &'static str {
        "model-family"
    }

    async fn resolve(&self, query: &DeviceNameQuery) -> Option<String> {
        if !query.brand.trim().eq_ignore_ascii_case("samsung") {
            return None;
        }
        let model = query.model.to_uppercase();
        SAMSUNG_MODEL_FAMILIES
            .iter()
            .find(|(family, _)| model.contains(family))
            .map(|(_, name)| name.to_string())
    }
}

/// Builds a name out of brand, manufacturer and model without repeating a
/// prefix the model already carries.
pub fn synthesize_device_name(model: &str, brand: &str, manufacturer: &str) -> String {
    let model = model.trim();
    let brand = brand.trim();
    let manufacturer = manufacturer.trim();

    if model.is_empty() {
        return UNKNOWN_DEVICE.to_string();
    }

    match [brand, manufacturer].into_iter().find(|p| !p.is_empty()) {
        Some(prefix) if model.to_lowercase().starts_with(&prefix.to_lowercase()) => {
            model.to_string()
        }
        Some(prefix) => format!("{} {}", capitalize_word(prefix), model),
        None => model.to_string(),
    }
}

/// `SAMSUNG` and `samsung` both become `Samsung`.
fn capitalize_word(word: &str) -> String {
    capitalize_first(&word.to_lowercase())
}

fn fallback_name(query: &DeviceNameQuery) -> String {
    synthesize_device_name(&query.model, &query.brand, &query.manufacturer)
}

/// Total device-name resolution.
pub struct DeviceNameResolver {
    chain: ResolverChain<DeviceNameQuery>,
}

impl DeviceNameResolver {
    pub fn new(database: Arc<DeviceNameDatabase>) -> Self {
        Self {
            chain: ResolverChain::<DeviceNameQuery>::new(fallback_name)
                .with_tier(LiveMarketingNameTier)
                .with_tier(RemoteDatabaseTier::new(database))
                .with_tier(SerialPatternTier)
                .with_tier(ModelFamilyTier),
        }
    }

    pub async fn resolve_device_name(&self, query: &DeviceNameQuery) -> String {
        let name = self.chain.resolve(query).await;
        log::debug!("[DEVICE-DB] Resolved '{}' for serial {}", name, query.serial);
        name
    }
}
