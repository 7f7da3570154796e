//! Spotify as a command-executable black box.
//!
//! Every interaction goes through one of two doors: AppleScript commands
//! via the automation executor, or OS process control via
//! `ProcessController`. The engine only ever sees the `PlayerControl`
//! trait, which keeps it testable without a running Spotify.

use crate::automation::{ExecError, ScriptRunner};
use crate::process::ProcessController;
use async_trait::async_trait;
use spotless_core::config::SpotifyConfig;
use spotless_core::songlog::TRACK_ATTRIBUTES;

const TELL_PREFIX: &str = "tell application \"Spotify\" to ";

/// Clicks the Private Session menu item only when it is unchecked; Spotify
/// clears the toggle on its own cadence.
const PRIVATE_SESSION_SCRIPT: &str = r#"tell application "System Events" to tell process "Spotify"
    tell menu bar item 2 of menu bar 1
        tell menu item "Private Session" of menu 1
            set isChecked to value of attribute "AXMenuItemMarkChar" is "✓"
            if not isChecked then click it
        end tell
    end tell
end tell"#;

/// One batched script fetching every logged track attribute,
/// newline-separated, in `TRACK_ATTRIBUTES` order.
fn track_attributes_script() -> String {
    let mut script = String::from("set o to \"\"\ntell application \"Spotify\"\n");
    for (i, attr) in TRACK_ATTRIBUTES.iter().enumerate() {
        if i == 0 {
            script.push_str(&format!("set o to o & (get {} of current track)\n", attr));
        } else {
            script.push_str(&format!(
                "set o to o & linefeed & (get {} of current track)\n",
                attr
            ));
        }
    }
    script.push_str("end tell\nreturn o");
    script
}

/// Everything the reconciliation engine needs from the controlled player.
#[async_trait]
pub trait PlayerControl: Send + Sync {
    async fn is_running(&self) -> Result<bool, ExecError>;
    async fn launch(&self, foreground: bool) -> Result<(), ExecError>;
    async fn quit(&self) -> Result<(), ExecError>;
    /// Content identifier of the current item; empty when Spotify answered
    /// but had nothing to say (treated as indeterminate upstream).
    async fn current_track_id(&self) -> Result<String, ExecError>;
    async fn volume(&self) -> Result<u8, ExecError>;
    async fn set_volume(&self, volume: u8) -> Result<(), ExecError>;
    async fn play(&self) -> Result<(), ExecError>;
    async fn play_pause(&self) -> Result<(), ExecError>;
    async fn enable_private_session(&self) -> Result<(), ExecError>;
    /// Raw newline-separated output of the batched attribute query.
    async fn track_attributes(&self) -> Result<String, ExecError>;
}

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    runner: ScriptRunner,
    process: ProcessController,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Self {
        Self {
            runner: ScriptRunner::new(),
            process: ProcessController::new(config),
        }
    }

    async fn tell(&self, command: &str) -> Result<String, ExecError> {
        self.runner.run(&format!("{}{}", TELL_PREFIX, command)).await
    }
}

#[async_trait]
impl PlayerControl for SpotifyClient {
    async fn is_running(&self) -> Result<bool, ExecError> {
        self.process.is_running().await
    }

    async fn launch(&self, foreground: bool) -> Result<(), ExecError> {
        self.process.launch(foreground).await
    }

    async fn quit(&self) -> Result<(), ExecError> {
        self.tell("quit").await.map(|_| ())
    }

    async fn current_track_id(&self) -> Result<String, ExecError> {
        self.tell("(get spotify url of current track)").await
    }

    async fn volume(&self) -> Result<u8, ExecError> {
        let out = self
            .runner
            .run_expecting_output(&format!("{}(get sound volume)", TELL_PREFIX))
            .await?;
        let first = out.lines().next().unwrap_or("").trim();
        first
            .parse::<i64>()
            .map(|v| v.clamp(0, 100) as u8)
            .map_err(|_| ExecError::UnexpectedOutput {
                command: "get sound volume".to_string(),
                output: out.clone(),
            })
    }

    async fn set_volume(&self, volume: u8) -> Result<(), ExecError> {
        self.tell(&format!("set sound volume to {}", volume))
            .await
            .map(|_| ())
    }

    async fn play(&self) -> Result<(), ExecError> {
        self.tell("play").await.map(|_| ())
    }

    async fn play_pause(&self) -> Result<(), ExecError> {
        self.tell("playpause").await.map(|_| ())
    }

    async fn enable_private_session(&self) -> Result<(), ExecError> {
        self.runner.run(PRIVATE_SESSION_SCRIPT).await.map(|_| ())
    }

    async fn track_attributes(&self) -> Result<String, ExecError> {
        self.runner
            .run_expecting_output(&track_attributes_script())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_script_covers_all_columns() {
        let script = track_attributes_script();
        for attr in TRACK_ATTRIBUTES {
            assert!(
                script.contains(&format!("get {} of current track", attr)),
                "missing attribute {:?}",
                attr
            );
        }
        assert!(script.starts_with("set o to \"\""));
        assert!(script.ends_with("return o"));
    }

    #[test]
    fn test_private_session_script_guards_on_check_state() {
        assert!(PRIVATE_SESSION_SCRIPT.contains("AXMenuItemMarkChar"));
        assert!(PRIVATE_SESSION_SCRIPT.contains("if not isChecked then click it"));
    }
}
