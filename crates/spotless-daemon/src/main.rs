mod automation;
mod detector;
mod engine;
mod process;
mod spotify;
mod watcher;

use engine::{Engine, EngineEvent};
use spotless_core::config::{Config, Settings};
use spotless_core::platform;
use spotless_core::status::StatusSignal;
use spotify::{PlayerControl, SpotifyClient};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,spotless_daemon=debug")),
        )
        .init();

    info!("log file: {}", log_path.display());

    let config = Config::load()?;
    info!("config loaded from {}", Config::config_path().display());
    let settings = Settings::new(config.clone());

    // All external inputs funnel into the engine task through this queue.
    let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(64);
    let (status_tx, mut status_rx) = broadcast::channel::<StatusSignal>(16);

    // Status consumer: the display/notification boundary. Today it logs.
    tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(status) => info!("{} {}", status.glyph(), status.label()),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let player = SpotifyClient::new(&config.spotify);

    if config.policy.start_on_launch && !player.is_running().await.unwrap_or(false) {
        info!("launching Spotify");
        if let Err(e) = player.launch(false).await {
            warn!("failed to launch Spotify: {e}");
        }
    }

    let _watcher = watcher::start(
        config.watcher.clone(),
        platform::spotify_watch_files(),
        event_tx.clone(),
    );

    // One immediate pass; after this the watcher drives everything.
    let _ = event_tx.send(EngineEvent::WakeUp).await;

    let engine = Engine::new(player, settings, status_tx, event_tx);
    engine.run(event_rx).await;

    info!("spotless-daemon exiting");
    Ok(())
}
