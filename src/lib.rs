pub mod aapt;
pub mod adb;
pub mod batch;
pub mod cache;
pub mod config;
pub mod device_db;
pub mod error;
pub mod models;
pub mod names;
pub mod protection;
pub mod regex_utils;
pub mod report_parser;
pub mod service;

#[cfg(test)]
mod test_support;

use crate::config::InventoryConfig;
use crate::service::InventoryService;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,reqwest=warn,hyper=warn";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // `try_init` also routes `log` records into the subscriber.
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic message".to_string()
        };
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        log::error!("PANIC: {} at {}", message, location);
        eprintln!(
            "[{}] PANIC: {} at {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
            message,
            location
        );
    }));
}

/// Prints the device status and the app inventory of the target device as
/// JSON on stdout. Returns the process exit code.
pub async fn run() -> i32 {
    init_logging();
    install_panic_hook();

    let config = match InventoryConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("[CONFIG] {}", e);
            return 2;
        }
    };

    let service = InventoryService::from_config(&config);

    let status = service.device_status(None).await;
    match serde_json::to_string_pretty(&status) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize device status: {}", e),
    }

    match service.list_inventory(None).await {
        Ok(listing) => {
            log::info!(
                "Listed {} apps from {} (cached: {})",
                listing.items.len(),
                listing.device_serial,
                listing.cached
            );
            match serde_json::to_string_pretty(&listing) {
                Ok(json) => {
                    println!("{}", json);
                    0
                }
                Err(e) => {
                    log::error!("Failed to serialize inventory: {}", e);
                    1
                }
            }
        }
        Err(e) => {
            log::error!("Failed to list inventory: {}", e);
            1
        }
    }
}
