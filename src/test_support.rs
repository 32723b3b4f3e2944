//! In-memory stand-ins for the device channel, inspection tool and name table.
use crate::aapt::ArtifactInspector;
use crate::adb::DeviceChannel;
use crate::device_db::TableSource;
use crate::error::{FetchError, QueryError, ToolError};
use crate::models::AttachedDevice;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A plausible `dumpsys package` report for `identifier`.
pub(crate) fn dumpsys_report(identifier: &str) -> String {
    format!(
        "Packages:
  Package [{id}] (1a2b3c):
    userId=10234
    codePath=/data/app/{id}
    dataDir=/data/user/0/{id}
    versionCode=105672345 minSdk=24 targetSdk=34
    versionName=8.8.12.545
    flags=[ HAS_CODE ALLOW_CLEAR_USER_DATA ALLOW_BACKUP ]
    timeStamp=2024-01-10 09:00:00
    firstInstallTime=2023-06-15 12:30:00
    lastUpdateTime=2024-01-10 09:00:00
    installerPackageName=com.android.vending
    User 0: ceDataInode=1 installed=true hidden=false enabled=0
",
        id = identifier
    )
}

/// Scripted [`DeviceChannel`]. Commands without a scripted response fail.
pub(crate) struct FakeChannel {
    available: bool,
    devices: Vec<AttachedDevice>,
    responses: HashMap<String, Result<String, String>>,
    delays: HashMap<String, Duration>,
    queries: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeChannel {
    pub(crate) fn with_devices(devices: &[(&str, &str)]) -> Self {
        Self {
            available: true,
            devices: devices
                .iter()
                .map(|(serial, state)| AttachedDevice {
                    serial: serial.to_string(),
                    state: state.to_string(),
                })
                .collect(),
            responses: HashMap::new(),
            delays: HashMap::new(),
            queries: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_device(serial: &str) -> Self {
        Self::with_devices(&[(serial, "device")])
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::with_devices(&[])
        }
    }

    pub(crate) fn respond(mut self, command: &str, output: &str) -> Self {
        self.responses
            .insert(command.to_string(), Ok(output.to_string()));
        self
    }

    pub(crate) fn fail(mut self, command: &str) -> Self {
        self.responses
            .insert(command.to_string(), Err("device offline".to_string()));
        self
    }

    pub(crate) fn delay(mut self, command: &str, delay: Duration) -> Self {
        self.delays.insert(command.to_string(), delay);
        self
    }

    pub(crate) fn query_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.queries.clone()
    }

    pub(crate) fn peak_in_flight(&self) -> Arc<AtomicUsize> {
        self.peak.clone()
    }
}

#[async_trait]
impl DeviceChannel for FakeChannel {
    async fn version(&self) -> Result<String, QueryError> {
        if self.available {
            Ok("Android Debug Bridge version 1.0.41\n".to_string())
        } else {
            Err(QueryError::Unavailable("'adb' not found".to_string()))
        }
    }

    async fn list_devices(&self) -> Result<Vec<AttachedDevice>, QueryError> {
        self.version().await?;
        Ok(self.devices.clone())
    }

    async fn run_query(&self, _serial: &str, command: &str) -> Result<String, QueryError> {
        self.version().await?;
        self.queries.lock().unwrap().push(command.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(command) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.responses.get(command) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(stderr)) => Err(QueryError::Failed {
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            }),
            None => Err(QueryError::Failed {
                status: "exit status: 1".to_string(),
                stderr: format!("no scripted response for '{}'", command),
            }),
        }
    }

    async fn pull_file(&self, _serial: &str, remote: &str, local: &Path) -> Result<(), QueryError> {
        self.queries.lock().unwrap().push(format!("pull {}", remote));
        std::fs::write(local, b"PK\x03\x04")?;
        Ok(())
    }
}

/// [`ArtifactInspector`] that returns a fixed report, or behaves as if the
/// tool is not installed.
pub(crate) struct FakeInspector {
    report: Option<String>,
    inspected: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeInspector {
    pub(crate) fn reporting(report: &str) -> Self {
        Self {
            report: Some(report.to_string()),
            inspected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn missing() -> Self {
        Self {
            report: None,
            inspected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn inspected_paths(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        self.inspected.clone()
    }
}

#[async_trait]
impl ArtifactInspector for FakeInspector {
    async fn inspect_artifact(&self, path: &Path) -> Result<String, ToolError> {
        self.inspected.lock().unwrap().push(path.to_path_buf());
        match &self.report {
            Some(report) if path.is_file() => Ok(report.clone()),
            Some(_) => Err(ToolError::Failed(format!("{} was not pulled", path.display()))),
            None => Err(ToolError::NotFound("/nonexistent/aapt".to_string())),
        }
    }
}

/// [`TableSource`] serving a fixed document; `None` fails every fetch.
pub(crate) struct StaticTable(pub(crate) Option<&'static str>);

#[async_trait]
impl TableSource for StaticTable {
    async fn fetch(&self) -> Result<String, FetchError> {
        self.0.map(str::to_string).ok_or(FetchError::Status(404))
    }
}
