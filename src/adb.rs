//! The device-query channel: every interaction with the device goes through
//! [`DeviceChannel`], implemented for real by [`AdbChannel`].
use crate::error::QueryError;
use crate::models::AttachedDevice;
use crate::report_parser;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[async_trait]
pub trait DeviceChannel: Send + Sync {
    /// Checks that the channel itself works and returns its version banner.
    async fn version(&self) -> Result<String, QueryError>;

    async fn list_devices(&self) -> Result<Vec<AttachedDevice>, QueryError>;

    /// Runs `command` in a shell on the device identified by `serial`.
    async fn run_query(&self, serial: &str, command: &str) -> Result<String, QueryError>;

    /// Copies `remote` from the device to `local` on the host.
    async fn pull_file(&self, serial: &str, remote: &str, local: &Path) -> Result<(), QueryError>;
}

/// [`DeviceChannel`] backed by the `adb` executable.
pub struct AdbChannel {
    adb_path: String,
    timeout: Duration,
}

impl AdbChannel {
    pub fn new(adb_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            adb_path: adb_path.into(),
            timeout,
        }
    }

    /// Creates a `tokio::process::Command` for adb without a visible window.
    /// The child is killed if the future awaiting it is dropped.
    fn create_adb_command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Prevents a console window from appearing on Windows.
        #[cfg(windows)]
        cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW

        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<String, QueryError> {
        log::debug!("[ADB] {} {}", self.adb_path, args.join(" "));

        let output = tokio::time::timeout(self.timeout, self.create_adb_command(args).output())
            .await
            .map_err(|_| QueryError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    QueryError::Unavailable(format!("'{}' not found", self.adb_path))
                }
                _ => QueryError::Io(e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(QueryError::Failed {
                status: output.status.to_string(),
                stderr: if stderr.is_empty() { stdout.trim().to_string() } else { stderr },
            })
        }
    }
}

#[async_trait]
impl DeviceChannel for AdbChannel {
    async fn version(&self) -> Result<String, QueryError> {
        self.run(&["version"]).await
    }

    async fn list_devices(&self) -> Result<Vec<AttachedDevice>, QueryError> {
        let output = self.run(&["devices"]).await?;
        Ok(report_parser::parse_device_list(&output))
    }

    async fn run_query(&self, serial: &str, command: &str) -> Result<String, QueryError> {
        self.run(&["-s", serial, "shell", command]).await
    }

    async fn pull_file(&self, serial: &str, remote: &str, local: &Path) -> Result<(), QueryError> {
        let local = local.to_string_lossy();
        self.run(&["-s", serial, "pull", remote, local.as_ref()]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let channel = AdbChannel::new("/nonexistent/adb-binary", Duration::from_secs(5));
        let err = channel.list_devices().await.unwrap_err();
        assert!(matches!(err, QueryError::Unavailable(_)));
    }
}
