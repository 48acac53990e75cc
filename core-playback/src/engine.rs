//! # Playback Engine
//!
//! Per-session playback state machine over the voice transport. Each active
//! session holds at most one output connection and one audio player; both
//! are created lazily on the first start and torn down on stop or by the
//! idle sweep.
//!
//! ## Advancement
//!
//! The engine never polls the player. Each player gets a watcher task
//! subscribed to its event stream; end-of-track and player errors both run
//! the advance handler, which pops the queue head and plays the next track.
//! An explicit skip is just a player stop, so it flows through the same
//! path. Tracks whose payload never arrives are logged and skipped, so a
//! run of unplayable tracks drains in one pass.
//!
//! ## Locking
//!
//! Session states live behind individual `Arc<Mutex<_>>` entries in one
//! map. The map lock is only ever held to fetch or remove an entry, so
//! sessions never serialize each other, and no lock is held across the
//! bounded payload wait. Where a session lock and the queue lock are both
//! needed, the session lock is taken first.

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::transport::{
    AudioPlayer, OutputConnection, PlayerEvent, PlayerStatus, VoiceTransport,
};
use core_metadata::TrackHandle;
use core_queue::{LaunchError, PlaybackLauncher, QueueService};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, RecvError};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Coarse per-session playback state, derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No connection and no player.
    Idle,
    /// Connected to an output channel with nothing sounding.
    ConnectedIdle,
    /// A track is sounding.
    Playing,
    /// A track is loaded but paused.
    Paused,
}

struct SessionState {
    connection: Option<Arc<dyn OutputConnection>>,
    player: Option<Arc<dyn AudioPlayer>>,
    watcher: Option<JoinHandle<()>>,
    output_channel: String,
    /// When this session last became the only occupant of its channel.
    solo_since: Option<Instant>,
}

impl SessionState {
    fn new(output_channel: &str) -> Self {
        Self {
            connection: None,
            player: None,
            watcher: None,
            output_channel: output_channel.to_string(),
            solo_since: None,
        }
    }
}

type SharedSession = Arc<Mutex<SessionState>>;

/// Drives play/pause/skip/stop for every session.
pub struct PlaybackEngine {
    transport: Arc<dyn VoiceTransport>,
    queue: Arc<QueueService>,
    events: Arc<EventBus>,
    config: PlaybackConfig,
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl PlaybackEngine {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        queue: Arc<QueueService>,
        events: Arc<EventBus>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            transport,
            queue,
            events,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start playing the queue head for a session.
    ///
    /// No-op when the session already has an active player; the new track
    /// simply waits its turn. Connection and player are created lazily.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::EmptyQueue`] with nothing queued,
    /// [`PlaybackError::DownloadTimeout`] when the head's payload misses the
    /// bounded wait, and [`PlaybackError::Transport`] for gateway failures.
    pub async fn start(&self, session_id: &str, output_channel: &str) -> Result<()> {
        // The already-playing no-op must come first: an active session must
        // never be stalled by the head's download wait. The wait itself runs
        // without the session lock so pause/stop stay responsive, which
        // means both the session and the queue can change under it; re-check
        // after the wait and retry until a stable head plays.
        loop {
            if let Some(state) = self.session_of(session_id).await {
                if state.lock().await.player.is_some() {
                    debug!(session = session_id, "playback already active; track stays queued");
                    return Ok(());
                }
            }
            let head = self
                .queue
                .peek_head(session_id)
                .await
                .ok_or(PlaybackError::EmptyQueue)?;

            let path = wait_for_payload(&head.track, self.config.max_download_wait).await?;

            let state = self.session_entry(session_id, output_channel).await;
            let mut session = state.lock().await;
            if session.player.is_some() {
                debug!(session = session_id, "playback became active during the wait");
                return Ok(());
            }
            match self.queue.peek_head(session_id).await {
                Some(current) if current.track == head.track => {}
                Some(_) => {
                    debug!(session = session_id, "queue head changed during the wait; retrying");
                    continue;
                }
                None => return Err(PlaybackError::EmptyQueue),
            }

            if session.connection.is_none() {
                let connection = self.transport.connect(output_channel).await?;
                session.connection = Some(connection);
            }

            let player = self.transport.new_player()?;
            let watcher = self.spawn_watcher(session_id, Arc::clone(&state), Arc::clone(&player));
            session.player = Some(Arc::clone(&player));
            session.watcher = Some(watcher);

            if let Some(connection) = &session.connection {
                if let Err(e) = connection.attach(Arc::clone(&player)).await {
                    discard_player(&mut session);
                    return Err(e.into());
                }
            }

            if let Err(e) = player.play(&path).await {
                discard_player(&mut session);
                return Err(e.into());
            }
            info!(session = session_id, track = head.track.display_name(), "playback started");
            self.events
                .emit(CoreEvent::Playback(PlaybackEvent::Started {
                    session_id: session_id.to_string(),
                    source_link: head.track.source_link().to_string(),
                }))
                .ok();
            return Ok(());
        }
    }

    /// Pause the current track. Returns `false` when nothing was playing.
    pub async fn pause(&self, session_id: &str) -> bool {
        let Some(player) = self.player_of(session_id).await else {
            return false;
        };
        let paused = player.pause().await;
        if paused {
            self.events
                .emit(CoreEvent::Playback(PlaybackEvent::Paused {
                    session_id: session_id.to_string(),
                }))
                .ok();
        }
        paused
    }

    /// Resume a paused track. Returns `false` when nothing was paused.
    pub async fn resume(&self, session_id: &str) -> bool {
        let Some(player) = self.player_of(session_id).await else {
            return false;
        };
        let resumed = player.resume().await;
        if resumed {
            self.events
                .emit(CoreEvent::Playback(PlaybackEvent::Resumed {
                    session_id: session_id.to_string(),
                }))
                .ok();
        }
        resumed
    }

    /// Skip the current track.
    ///
    /// Stops the player; the resulting end-of-track event runs the same
    /// advance handler as a natural track end.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoActivePlayer`] when nothing is loaded.
    pub async fn skip(&self, session_id: &str) -> Result<()> {
        let player = self
            .player_of(session_id)
            .await
            .ok_or(PlaybackError::NoActivePlayer)?;
        debug!(session = session_id, "skip requested");
        player.stop().await;
        Ok(())
    }

    /// Tear the session down: empty its queue, stop the player, disconnect,
    /// and forget the session.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoActivePlayer`] when the session has no playback
    /// state at all; transport failures on disconnect propagate.
    pub async fn stop(&self, session_id: &str) -> Result<()> {
        let state = self
            .sessions
            .lock()
            .await
            .remove(session_id)
            .ok_or(PlaybackError::NoActivePlayer)?;
        let mut session = state.lock().await;

        // The watcher would otherwise observe the stop as an end-of-track
        // and try to advance the queue we are about to clear.
        if let Some(watcher) = session.watcher.take() {
            watcher.abort();
        }
        self.queue.clear_all(session_id).await;
        if let Some(player) = session.player.take() {
            player.stop().await;
        }
        if let Some(connection) = session.connection.take() {
            connection.disconnect().await?;
        }

        info!(session = session_id, "playback stopped and session torn down");
        self.events
            .emit(CoreEvent::Playback(PlaybackEvent::Stopped {
                session_id: session_id.to_string(),
            }))
            .ok();
        Ok(())
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Whether the session's player is paused; `None` without a player.
    pub async fn is_paused(&self, session_id: &str) -> Option<bool> {
        let player = self.player_of(session_id).await?;
        Some(player.status().await == PlayerStatus::Paused)
    }

    /// Coarse state of a session.
    pub async fn session_status(&self, session_id: &str) -> SessionStatus {
        let Some(state) = self.session_of(session_id).await else {
            return SessionStatus::Idle;
        };
        let (connection, player) = {
            let session = state.lock().await;
            (session.connection.is_some(), session.player.clone())
        };
        match player {
            Some(player) => match player.status().await {
                PlayerStatus::Playing => SessionStatus::Playing,
                PlayerStatus::Paused => SessionStatus::Paused,
                PlayerStatus::Idle => SessionStatus::ConnectedIdle,
            },
            None if connection => SessionStatus::ConnectedIdle,
            None => SessionStatus::Idle,
        }
    }

    // ========================================================================
    // Idle sweep
    // ========================================================================

    /// One pass over all connected sessions, enforcing the solo-occupancy
    /// thresholds. Callable directly for deterministic tests.
    ///
    /// Occupancy reads are the only external calls; the sweep never waits
    /// on downloads and holds no lock across a transport call.
    pub async fn sweep_once(&self) {
        let snapshot: Vec<(String, SharedSession)> = self
            .sessions
            .lock()
            .await
            .iter()
            .map(|(id, state)| (id.clone(), Arc::clone(state)))
            .collect();

        for (session_id, state) in snapshot {
            let Some(channel) = ({
                let session = state.lock().await;
                session.connection.is_some().then(|| session.output_channel.clone())
            }) else {
                continue;
            };

            let occupancy = match self.transport.occupancy_of(&channel).await {
                Ok(n) => n,
                Err(e) => {
                    warn!(session = %session_id, error = %e, "occupancy read failed; skipping session");
                    continue;
                }
            };

            if occupancy > 1 {
                state.lock().await.solo_since = None;
                continue;
            }

            let (solo_for, player) = {
                let mut session = state.lock().await;
                let since = *session.solo_since.get_or_insert_with(Instant::now);
                (since.elapsed(), session.player.clone())
            };
            let status = match &player {
                Some(player) => player.status().await,
                None => PlayerStatus::Idle,
            };

            if solo_for >= self.config.stop_threshold && status != PlayerStatus::Playing {
                info!(session = %session_id, "solo past stop threshold; tearing down");
                if let Err(e) = self.stop(&session_id).await {
                    warn!(session = %session_id, error = %e, "idle teardown failed");
                }
            } else if solo_for >= self.config.pause_threshold && status == PlayerStatus::Playing {
                info!(session = %session_id, "solo past pause threshold; pausing");
                self.pause(&session_id).await;
            }
        }
    }

    /// Run [`sweep_once`](Self::sweep_once) on the configured interval.
    pub fn spawn_idle_sweep(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                engine.sweep_once().await;
            }
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn session_entry(&self, session_id: &str, output_channel: &str) -> SharedSession {
        Arc::clone(
            self.sessions
                .lock()
                .await
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(output_channel)))),
        )
    }

    async fn session_of(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    async fn player_of(&self, session_id: &str) -> Option<Arc<dyn AudioPlayer>> {
        let state = self.session_of(session_id).await?;
        let session = state.lock().await;
        session.player.clone()
    }

    fn spawn_watcher(
        &self,
        session_id: &str,
        state: SharedSession,
        player: Arc<dyn AudioPlayer>,
    ) -> JoinHandle<()> {
        let watcher = PlayerWatcher {
            session_id: session_id.to_string(),
            state,
            player: Arc::clone(&player),
            queue: Arc::clone(&self.queue),
            events: Arc::clone(&self.events),
            max_download_wait: self.config.max_download_wait,
        };
        tokio::spawn(watcher.run(player.subscribe()))
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl PlaybackLauncher for PlaybackEngine {
    async fn launch(&self, session_id: &str, output_channel: &str) -> std::result::Result<(), LaunchError> {
        self.start(session_id, output_channel)
            .await
            .map_err(|e| LaunchError(e.to_string()))
    }
}

// ============================================================================
// Player watcher
// ============================================================================

/// Per-player task: consumes the player's event stream and advances the
/// session's queue. Exits when the queue drains or the player goes away.
struct PlayerWatcher {
    session_id: String,
    state: SharedSession,
    player: Arc<dyn AudioPlayer>,
    queue: Arc<QueueService>,
    events: Arc<EventBus>,
    max_download_wait: Duration,
}

impl PlayerWatcher {
    async fn run(self, mut rx: broadcast::Receiver<PlayerEvent>) {
        loop {
            match rx.recv().await {
                Ok(PlayerEvent::Ended) => {
                    debug!(session = %self.session_id, "track ended");
                }
                Ok(PlayerEvent::Errored(message)) => {
                    warn!(session = %self.session_id, %message, "player error; advancing");
                    self.events
                        .emit(CoreEvent::Playback(PlaybackEvent::Error {
                            session_id: self.session_id.clone(),
                            message,
                        }))
                        .ok();
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(session = %self.session_id, missed, "player events lagged");
                    continue;
                }
                Err(RecvError::Closed) => return,
            }
            if !self.advance().await {
                return;
            }
        }
    }

    /// Pop the head and play the next track; `false` when the queue drained.
    async fn advance(&self) -> bool {
        loop {
            // The pop and the terminal player release happen under one
            // session lock acquisition. An enqueue that lands right after
            // the pop empties the queue fires a launch; that launch must
            // not observe the doomed player still installed.
            let next = {
                let mut session = self.state.lock().await;
                match self.queue.advance(&self.session_id).await {
                    Some(next) => next,
                    None => {
                        // Keep the connection so a follow-up enqueue starts
                        // fast; only the player goes away.
                        session.player = None;
                        session.watcher = None;
                        info!(session = %self.session_id, "queue exhausted; releasing player");
                        self.events
                            .emit(CoreEvent::Playback(PlaybackEvent::QueueExhausted {
                                session_id: self.session_id.clone(),
                            }))
                            .ok();
                        return false;
                    }
                }
            };

            let path = match wait_for_payload(&next.track, self.max_download_wait).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(
                        session = %self.session_id,
                        track = next.track.display_name(),
                        error = %e,
                        "next track unplayable; skipping"
                    );
                    continue;
                }
            };
            match self.player.play(&path).await {
                Ok(()) => {
                    info!(session = %self.session_id, track = next.track.display_name(), "advanced");
                    self.events
                        .emit(CoreEvent::Playback(PlaybackEvent::TrackChanged {
                            session_id: self.session_id.clone(),
                            source_link: next.track.source_link().to_string(),
                        }))
                        .ok();
                    return true;
                }
                Err(e) => {
                    warn!(
                        session = %self.session_id,
                        track = next.track.display_name(),
                        error = %e,
                        "play failed; skipping"
                    );
                    continue;
                }
            }
        }
    }
}

/// Back a failed start out of the session so it is not left looking active.
fn discard_player(session: &mut SessionState) {
    if let Some(watcher) = session.watcher.take() {
        watcher.abort();
    }
    session.player = None;
}

/// Bounded wait for a track's payload via its watch cell.
async fn wait_for_payload(track: &TrackHandle, max_wait: Duration) -> Result<PathBuf> {
    let mut rx = track.subscribe_payload();
    let wait = async move {
        loop {
            if let Some(path) = rx.borrow_and_update().clone() {
                return Ok(path);
            }
            if rx.changed().await.is_err() {
                return Err(PlaybackError::PayloadAbandoned);
            }
        }
    };
    tokio::time::timeout(max_wait, wait)
        .await
        .map_err(|_| PlaybackError::DownloadTimeout)?
}
