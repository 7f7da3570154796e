use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

/// User-facing toggles. Read by the engine at the start of every
/// reconciliation pass, written by whatever front end the user drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Restart (or quit) Spotify on ad detection instead of muting.
    #[serde(default)]
    pub restart_to_skip_ads: bool,
    /// Re-apply the private-session toggle on every pass; Spotify drops it
    /// on its own after a few hours.
    #[serde(default)]
    pub endless_private_session: bool,
    /// With restart_to_skip_ads: quit Spotify and let the daemon exit
    /// instead of relaunching.
    #[serde(default)]
    pub quit_instead_of_restart: bool,
    /// Launch Spotify (hidden) when the daemon starts.
    #[serde(default = "default_start_on_launch")]
    pub start_on_launch: bool,
    /// Append a CSV row per track to this file; disabled when unset.
    #[serde(default)]
    pub song_log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default = "default_bundle_id")]
    pub bundle_id: String,
    #[serde(default = "default_process_name")]
    pub process_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Cache-file mtime poll period.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wake-up period used when no watchable cache files exist.
    #[serde(default = "default_fallback_interval_ms")]
    pub fallback_interval_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            restart_to_skip_ads: false,
            endless_private_session: false,
            quit_instead_of_restart: false,
            start_on_launch: default_start_on_launch(),
            song_log_path: None,
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            bundle_id: default_bundle_id(),
            process_name: default_process_name(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            fallback_interval_ms: default_fallback_interval_ms(),
        }
    }
}

fn default_start_on_launch() -> bool {
    true
}

fn default_bundle_id() -> String {
    platform::SPOTIFY_BUNDLE_ID.to_string()
}

fn default_process_name() -> String {
    platform::SPOTIFY_PROCESS_NAME.to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_fallback_interval_ms() -> u64 {
    2000
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

/// Shared handle to the live configuration. The engine snapshots it per
/// pass; a settings front end mutates it through `update`.
#[derive(Clone)]
pub struct Settings(Arc<RwLock<Config>>);

impl Settings {
    pub fn new(config: Config) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub fn snapshot(&self) -> Config {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn policy(&self) -> PolicyConfig {
        self.0.read().unwrap_or_else(|e| e.into_inner()).policy.clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut Config)) {
        let mut guard = self.0.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.policy.restart_to_skip_ads);
        assert!(!config.policy.endless_private_session);
        assert!(config.policy.start_on_launch);
        assert!(config.policy.song_log_path.is_none());
        assert_eq!(config.spotify.bundle_id, "com.spotify.client");
        assert_eq!(config.spotify.process_name, "Spotify");
        assert_eq!(config.watcher.poll_interval_ms, 500);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.policy.restart_to_skip_ads = true;
        config.policy.song_log_path = Some(PathBuf::from("/tmp/songs.csv"));

        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert!(back.policy.restart_to_skip_ads);
        assert_eq!(
            back.policy.song_log_path.as_deref(),
            Some(std::path::Path::new("/tmp/songs.csv"))
        );
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.policy.start_on_launch);
        assert_eq!(config.watcher.fallback_interval_ms, 2000);
    }

    #[test]
    fn test_settings_update_visible_in_snapshot() {
        let settings = Settings::new(Config::default());
        settings.update(|c| c.policy.endless_private_session = true);
        assert!(settings.policy().endless_private_session);
    }
}
