//! Wake-up source: polls the mtimes of Spotify's per-account cache files
//! and nudges the engine whenever one moves.
//!
//! Delivery uses `try_send`; while the engine is mid-pass a burst of file
//! changes collapses into however many events fit the queue. Losing a
//! nudge is fine; the next change (or the fallback tick) retries.

use crate::engine::EngineEvent;
use spotless_core::config::WatcherConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub fn start(
    config: WatcherConfig,
    files: Vec<PathBuf>,
    event_tx: mpsc::Sender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if files.is_empty() {
            warn!("no Spotify cache files to watch; using periodic wake-ups");
            periodic(Duration::from_millis(config.fallback_interval_ms), event_tx).await;
            return;
        }
        info!("watching {} cache files", files.len());
        poll_mtimes(Duration::from_millis(config.poll_interval_ms), files, event_tx).await;
    })
}

async fn periodic(period: Duration, event_tx: mpsc::Sender<EngineEvent>) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if !nudge(&event_tx) {
            return;
        }
    }
}

/// (mtime, length) per file; length catches rewrites that land inside the
/// filesystem's mtime granularity.
type FileStamp = (SystemTime, u64);

async fn poll_mtimes(
    period: Duration,
    files: Vec<PathBuf>,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let mut ticker = tokio::time::interval(period);
    let mut seen: HashMap<PathBuf, FileStamp> = HashMap::new();

    // Prime with current stamps so startup itself is not a change.
    for f in &files {
        if let Some(stamp) = stamp(f).await {
            seen.insert(f.clone(), stamp);
        }
    }

    loop {
        ticker.tick().await;
        let mut changed = false;
        for f in &files {
            // Cache files disappear and reappear while Spotify restarts.
            let Some(current) = stamp(f).await else {
                continue;
            };
            if seen.get(f) != Some(&current) {
                seen.insert(f.clone(), current);
                changed = true;
            }
        }
        if changed && !nudge(&event_tx) {
            return;
        }
    }
}

async fn stamp(path: &std::path::Path) -> Option<FileStamp> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// Returns false once the engine side of the channel is gone.
fn nudge(event_tx: &mpsc::Sender<EngineEvent>) -> bool {
    match event_tx.try_send(EngineEvent::WakeUp) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => true, // coalesced
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> WatcherConfig {
        WatcherConfig {
            poll_interval_ms: 10,
            fallback_interval_ms: 10,
        }
    }

    async fn expect_wakeup(rx: &mut mpsc::Receiver<EngineEvent>) {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for wake-up")
            .expect("watcher channel closed");
        assert!(matches!(event, EngineEvent::WakeUp));
    }

    #[tokio::test]
    async fn test_mtime_change_triggers_wakeup() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("recently_played.bnk");
        std::fs::write(&file, b"a").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let handle = start(test_config(), vec![file.clone()], tx);

        // let the watcher prime, then move the mtime
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&file, b"ab").unwrap();

        expect_wakeup(&mut rx).await;
        handle.abort();
    }

    #[tokio::test]
    async fn test_file_appearing_triggers_wakeup() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("ad-state-storage.bnk.tmp");

        let (tx, mut rx) = mpsc::channel(8);
        let handle = start(test_config(), vec![file.clone()], tx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&file, b"x").unwrap();

        expect_wakeup(&mut rx).await;
        handle.abort();
    }

    #[tokio::test]
    async fn test_fallback_ticks_without_files() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = start(test_config(), Vec::new(), tx);

        expect_wakeup(&mut rx).await;
        handle.abort();
    }
}
