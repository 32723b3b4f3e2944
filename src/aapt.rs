//! The asset-inspection tool used to read an APK's application label.
use crate::error::ToolError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[async_trait]
pub trait ArtifactInspector: Send + Sync {
    /// Returns the tool's textual report for the package artifact at `path`.
    async fn inspect_artifact(&self, path: &Path) -> Result<String, ToolError>;
}

/// Runs `aapt dump badging` from the first candidate location that exists.
pub struct AaptInspector {
    candidates: Vec<PathBuf>,
    timeout: Duration,
}

impl AaptInspector {
    pub fn new(candidates: Vec<PathBuf>, timeout: Duration) -> Self {
        Self { candidates, timeout }
    }

    fn locate(&self) -> Result<&Path, ToolError> {
        match self.candidates.iter().find(|path| path.is_file()) {
            Some(path) => {
                log::debug!("[AAPT] Using binary at {}", path.display());
                Ok(path)
            }
            None => {
                let searched = self
                    .candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(ToolError::NotFound(searched))
            }
        }
    }
}

#[async_trait]
impl ArtifactInspector for AaptInspector {
    async fn inspect_artifact(&self, path: &Path) -> Result<String, ToolError> {
        let aapt = self.locate()?;

        let mut cmd = Command::new(aapt);
        cmd.arg("dump")
            .arg("badging")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ToolError::Failed(format!("timed out after {}s", self.timeout.as_secs())))??;

        if !output.status.success() {
            return Err(ToolError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
