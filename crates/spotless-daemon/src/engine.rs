//! Playback-state reconciliation engine.
//!
//! One task owns every piece of mutable state below and drains a single
//! queue of `EngineEvent`s: wake-ups from the cache watcher, timer
//! firings, and restart completion. Passes therefore never overlap, and a
//! timer that fires just after cancellation re-validates current state
//! before touching anything.
//!
//! ```text
//!   watcher ──WakeUp──────────────┐
//!   watchdog task ──WatchdogTick──┤
//!   reassert task ──Reassert──────┼──▶ mpsc ──▶ Engine::run (sole owner
//!   restart task ──RestartDone────┘              of mute/restart state)
//! ```

use crate::detector::{self, TrackKind};
use crate::spotify::PlayerControl;
use chrono::Local;
use spotless_core::config::{PolicyConfig, Settings};
use spotless_core::songlog::{self, SongLogger};
use spotless_core::status::StatusSignal;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum EngineEvent {
    /// Something changed in Spotify's cache files (or the periodic
    /// fallback fired); run one reconciliation pass.
    WakeUp,
    /// Stuck-ad watchdog period elapsed.
    WatchdogTick,
    /// Delayed private-session reassertion came due.
    ReassertPrivateSession,
    /// The restart task finished its quit/relaunch/play sequence.
    RestartFinished,
}

/// Net result of handling one event, reported to the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Unchanged,
    Changed(StatusSignal),
    /// Spotify is gone and no restart explains it; the daemon should exit.
    PlayerGone,
}

/// Delays and periods, overridable in tests.
#[derive(Debug, Clone)]
struct EngineTiming {
    watchdog_period: Duration,
    reassert_delay: Duration,
    restart_settle: Duration,
    restart_second_kick: Duration,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            watchdog_period: Duration::from_secs(2),
            reassert_delay: Duration::from_secs(2),
            restart_settle: Duration::from_secs(2),
            restart_second_kick: Duration::from_secs(5),
        }
    }
}

pub struct Engine<P> {
    player: P,
    settings: Settings,
    status_tx: broadcast::Sender<StatusSignal>,
    /// Loops back into the engine's own queue; timer tasks hold clones.
    event_tx: mpsc::Sender<EngineEvent>,
    muted: bool,
    /// Meaningful only while `muted` is true.
    pre_ad_volume: u8,
    /// While true, Spotify's absence is intentional and passes are skipped.
    restarting: bool,
    watchdog: Option<JoinHandle<()>>,
    reassert: Option<JoinHandle<()>>,
    songlog: SongLogger,
    timing: EngineTiming,
}

impl<P: PlayerControl + Clone + 'static> Engine<P> {
    pub fn new(
        player: P,
        settings: Settings,
        status_tx: broadcast::Sender<StatusSignal>,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            player,
            settings,
            status_tx,
            event_tx,
            muted: false,
            pre_ad_volume: 0,
            restarting: false,
            watchdog: None,
            reassert: None,
            songlog: SongLogger::new(),
            timing: EngineTiming::default(),
        }
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<EngineEvent>) {
        while let Some(event) = rx.recv().await {
            if self.handle_event(event).await == PassOutcome::PlayerGone {
                info!("Spotify exited outside of a restart; shutting down");
                break;
            }
        }
        self.disarm_watchdog();
        self.cancel_reassert();
    }

    async fn handle_event(&mut self, event: EngineEvent) -> PassOutcome {
        match event {
            EngineEvent::WakeUp => self.reconcile().await,
            EngineEvent::WatchdogTick => {
                self.nudge_stuck_ad().await;
                PassOutcome::Unchanged
            }
            EngineEvent::ReassertPrivateSession => {
                self.reassert_private_session().await;
                PassOutcome::Unchanged
            }
            EngineEvent::RestartFinished => self.finish_restart(),
        }
    }

    /// One reconciliation pass. Any automation failure inside the pass
    /// degrades to "no change"; the next wake-up starts from fresh state.
    async fn reconcile(&mut self) -> PassOutcome {
        if self.restarting {
            return PassOutcome::Unchanged;
        }
        let policy = self.settings.policy();

        match self.player.is_running().await {
            Ok(true) => {}
            Ok(false) => return PassOutcome::PlayerGone,
            Err(e) => {
                warn!("liveness check failed: {e}");
                return PassOutcome::Unchanged;
            }
        }

        let content_id = match self.player.current_track_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!("current track query failed: {e}");
                return PassOutcome::Unchanged;
            }
        };

        let mut outcome = PassOutcome::Unchanged;
        match detector::classify(&content_id) {
            TrackKind::Ad if policy.restart_to_skip_ads => {
                self.begin_restart(&policy);
                return PassOutcome::Changed(StatusSignal::Ad);
            }
            TrackKind::Ad => {
                if !self.muted {
                    match self.mute().await {
                        Ok(()) => outcome = PassOutcome::Changed(StatusSignal::Ad),
                        Err(e) => warn!("failed to mute: {e}"),
                    }
                }
            }
            TrackKind::Content => {
                if self.muted {
                    self.disarm_watchdog();
                    self.restore_volume().await;
                    self.muted = false;
                    self.emit(StatusSignal::NoAd);
                    outcome = PassOutcome::Changed(StatusSignal::NoAd);
                }
            }
        }

        if policy.restart_to_skip_ads {
            self.disarm_watchdog();
        } else if self.muted && self.watchdog.is_none() {
            self.arm_watchdog();
        }

        if policy.endless_private_session {
            self.schedule_reassert();
        }

        if let Some(path) = policy.song_log_path.as_deref() {
            self.log_current_track(path, &content_id).await;
        }

        outcome
    }

    /// Capture the user's volume, then silence playback. Capture happens
    /// first: restore depends on it.
    async fn mute(&mut self) -> Result<(), crate::automation::ExecError> {
        let current = self.player.volume().await?;
        self.pre_ad_volume = current;
        self.player.set_volume(0).await?;
        self.muted = true;
        self.emit(StatusSignal::Ad);
        Ok(())
    }

    /// Put the volume back where it was, unless the user moved the fader
    /// during the ad (live volume no longer 0) or there is nothing to
    /// restore.
    async fn restore_volume(&mut self) {
        match self.player.volume().await {
            Ok(0) if self.pre_ad_volume != 0 => {
                if let Err(e) = self.player.set_volume(self.pre_ad_volume).await {
                    warn!("failed to restore volume: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => warn!("volume read failed during restore: {e}"),
        }
    }

    /// Ad-bypass via restart: quit, relaunch hidden, then kick playback
    /// twice (the first `play` right after relaunch is unreliable). With
    /// `quit_instead_of_restart` only the quit is issued; the next pass
    /// sees the exit and the daemon follows Spotify down.
    fn begin_restart(&mut self, policy: &PolicyConfig) {
        self.disarm_watchdog();
        self.emit(StatusSignal::Ad);

        if policy.quit_instead_of_restart {
            let player = self.player.clone();
            tokio::spawn(async move {
                if let Err(e) = player.quit().await {
                    warn!("quit command failed: {e}");
                }
            });
            return;
        }

        self.restarting = true;
        let player = self.player.clone();
        let event_tx = self.event_tx.clone();
        let timing = self.timing.clone();
        tokio::spawn(async move {
            if let Err(e) = player.quit().await {
                warn!("quit command failed: {e}");
            }
            if let Err(e) = player.launch(false).await {
                warn!("relaunch failed: {e}");
            }
            tokio::time::sleep(timing.restart_settle).await;
            let _ = player.play().await;
            tokio::time::sleep(timing.restart_second_kick).await;
            let _ = player.play().await;
            let _ = event_tx.send(EngineEvent::RestartFinished).await;
        });
    }

    fn finish_restart(&mut self) -> PassOutcome {
        if !self.restarting {
            return PassOutcome::Unchanged;
        }
        self.restarting = false;
        self.emit(StatusSignal::NoAd);
        PassOutcome::Changed(StatusSignal::NoAd)
    }

    /// Workaround for the upstream defect where ad playback silently
    /// stalls: while muted, a pause/resume pair every watchdog period.
    async fn nudge_stuck_ad(&mut self) {
        let policy = self.settings.policy();
        if !self.muted || self.restarting || policy.restart_to_skip_ads {
            return;
        }
        debug!("nudging possibly stuck ad");
        let _ = self.player.play_pause().await;
        let _ = self.player.play_pause().await;
    }

    fn arm_watchdog(&mut self) {
        let tx = self.event_tx.clone();
        let period = self.timing.watchdog_period;
        self.watchdog = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // interval fires immediately once; the nudge should not
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(EngineEvent::WatchdogTick).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn disarm_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }

    /// (Re)arm the delayed private-session reassertion, cancelling any
    /// prior arm so at most one is pending.
    fn schedule_reassert(&mut self) {
        self.cancel_reassert();
        let tx = self.event_tx.clone();
        let delay = self.timing.reassert_delay;
        self.reassert = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(EngineEvent::ReassertPrivateSession).await;
        }));
    }

    fn cancel_reassert(&mut self) {
        if let Some(handle) = self.reassert.take() {
            handle.abort();
        }
    }

    async fn reassert_private_session(&mut self) {
        if self.restarting || !self.settings.policy().endless_private_session {
            return;
        }
        if let Err(e) = self.player.enable_private_session().await {
            debug!("private session reassert failed: {e}");
        }
    }

    /// Best-effort song logging; never allowed to disturb the pass. The
    /// dedup key is recorded before the fetch so a failed fetch is not
    /// retried for the same track.
    async fn log_current_track(&mut self, path: &Path, content_id: &str) {
        if !self.songlog.mark_new(content_id) {
            return;
        }
        let raw = match self.player.track_attributes().await {
            Ok(raw) => raw,
            Err(e) => {
                debug!("track attribute fetch failed: {e}");
                return;
            }
        };
        let Some(row) = songlog::format_row(&raw, &Local::now()) else {
            return;
        };
        if let Err(e) = songlog::append_row(path, &row).await {
            warn!("song log write failed: {e}");
        }
    }

    fn emit(&self, status: StatusSignal) {
        debug!("emitting status: {}", status.label());
        let _ = self.status_tx.send(status);
    }
}
