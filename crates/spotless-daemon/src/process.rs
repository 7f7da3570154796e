//! OS-level lifecycle for the controlled application: liveness through the
//! process table, launching through Launch Services.

use crate::automation::{capture, ExecError};
use spotless_core::config::SpotifyConfig;
use spotless_core::platform;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProcessController {
    bundle_id: String,
    process_name: String,
    pgrep: PathBuf,
    open: PathBuf,
}

impl ProcessController {
    pub fn new(spotify: &SpotifyConfig) -> Self {
        Self {
            bundle_id: spotify.bundle_id.clone(),
            process_name: spotify.process_name.clone(),
            pgrep: platform::pgrep_binary(),
            open: platform::open_binary(),
        }
    }

    #[cfg(test)]
    pub fn with_binaries(spotify: &SpotifyConfig, pgrep: PathBuf, open: PathBuf) -> Self {
        Self {
            bundle_id: spotify.bundle_id.clone(),
            process_name: spotify.process_name.clone(),
            pgrep,
            open,
        }
    }

    /// True iff a process with the controlled app's name exists right now.
    pub async fn is_running(&self) -> Result<bool, ExecError> {
        let output = capture(&self.pgrep, &["-x", &self.process_name]).await?;
        // pgrep: 0 = matched, 1 = no match, anything else is a real failure
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(ExecError::CommandFailed {
                command: self.pgrep.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    /// Launch by bundle identifier. Returns once the launch request is
    /// accepted, not once the app is interactive.
    pub async fn launch(&self, foreground: bool) -> Result<(), ExecError> {
        let mut args = vec!["-b", self.bundle_id.as_str()];
        if !foreground {
            args.push("--hide");
        }
        debug!("launching {} (foreground: {})", self.bundle_id, foreground);
        let output = capture(&self.open, &args).await?;
        if !output.status.success() {
            return Err(ExecError::CommandFailed {
                command: self.open.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SpotifyConfig {
        SpotifyConfig::default()
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_is_running_maps_exit_codes() {
        let up = ProcessController::with_binaries(
            &config(),
            PathBuf::from("/bin/true"),
            PathBuf::from("/bin/true"),
        );
        assert!(up.is_running().await.unwrap());

        let down = ProcessController::with_binaries(
            &config(),
            PathBuf::from("/bin/false"),
            PathBuf::from("/bin/true"),
        );
        assert!(!down.is_running().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_pgrep_is_spawn_error() {
        let ctl = ProcessController::with_binaries(
            &config(),
            PathBuf::from("/nonexistent/pgrep"),
            PathBuf::from("/nonexistent/open"),
        );
        assert!(matches!(
            ctl.is_running().await,
            Err(ExecError::Spawn { .. })
        ));
    }
}
