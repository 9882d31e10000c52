//! Playback state machine.
//!
//! [`PlaybackController`] owns every piece of player state: the playlist
//! cursor, the signal graph, the visualizer and the session status. All
//! mutation goes through its methods on the single UI thread.
//!
//! Track selection hands out a fresh [`Generation`]. Media events carry the
//! generation of the load that produced them, and anything that does not match
//! the current selection is dropped. Only one pending "ready" listener exists
//! at a time; a new selection replaces it.

use serde::Serialize;

use crate::{
    config::{PlayerConfig, StoreKeys},
    graph::{AudioBackend, GraphManager},
    media::{Generation, MediaBackend, MediaEvent, MediaEventKind},
    playlist::{Playlist, TrackRow},
    store::{PreferenceStore, Preferences},
    surface::Surface,
    visualizer::{EffectHost, FrameOutcome, Visualizer},
    PlayerError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackSession {
    pub status: PlaybackStatus,
    pub active_track: Option<usize>,
    pub generation: Generation,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            active_track: None,
            generation: Generation::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingReady {
    generation: Generation,
    autoplay: bool,
}

pub struct PlaybackController<M, A> {
    keys: StoreKeys,
    playlist: Playlist,
    graph: GraphManager<A>,
    media: M,
    store: Box<dyn PreferenceStore>,
    visualizer: Visualizer,
    session: PlaybackSession,
    pending_ready: Option<PendingReady>,
    notice: Option<String>,
}

impl<M: MediaBackend, A: AudioBackend> PlaybackController<M, A> {
    /// Builds a controller in the `Idle` state. Persisted flags are read from
    /// `store` once, here.
    pub fn new(
        config: PlayerConfig,
        media: M,
        audio: A,
        store: Box<dyn PreferenceStore>,
    ) -> Result<Self> {
        config.validate()?;
        let prefs = Preferences::load(&*store, &config.store_keys);
        tracing::debug!(?prefs, tracks = config.tracks.len(), "player configured");

        Ok(Self {
            keys: config.store_keys,
            playlist: Playlist::new(config.tracks, prefs.shuffle),
            graph: GraphManager::new(audio, &config.audio),
            media,
            store,
            visualizer: Visualizer::new(config.visualizer, prefs.continuous_effects),
            session: PlaybackSession::default(),
            pending_ready: None,
            notice: None,
        })
    }

    /// Makes shuffle order reproducible.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.playlist.reseed(seed);
        self
    }

    pub fn session(&self) -> PlaybackSession {
        self.session
    }

    pub fn status(&self) -> PlaybackStatus {
        self.session.status
    }

    pub fn active_index(&self) -> Option<usize> {
        self.session.active_track
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn graph(&self) -> &GraphManager<A> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut GraphManager<A> {
        &mut self.graph
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }

    /// Last user-visible message, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Whether a "ready" listener is currently armed.
    pub fn has_pending_ready(&self) -> bool {
        self.pending_ready.is_some()
    }

    /// Label for the now-playing line.
    pub fn now_playing(&self) -> Result<String> {
        let index = self.playlist.current_index()?;
        let track = self.playlist.current_track()?;
        Ok(format!("Now playing: {}", track.display_title(index)))
    }

    pub fn track_list(&self) -> Vec<TrackRow> {
        self.playlist.rows()
    }

    /// Starts loading track `index`.
    ///
    /// Any pending "ready" listener from an earlier selection is discarded
    /// before the new one is armed. Out-of-range indices leave the controller
    /// untouched.
    pub fn select_track(&mut self, index: usize, autoplay: bool) -> Result<PlaybackStatus> {
        if self.playlist.is_empty() {
            tracing::debug!("selection ignored, playlist is empty");
            return Err(PlayerError::EmptyPlaylist);
        }
        let Some(track) = self.playlist.track(index).cloned() else {
            tracing::debug!(index, len = self.playlist.len(), "selection out of range");
            return Ok(self.session.status);
        };
        self.playlist.select_index(index)?;

        self.pending_ready = None;
        self.media.pause();
        let generation = self.session.generation.next();
        self.session = PlaybackSession {
            status: PlaybackStatus::Loading,
            active_track: Some(index),
            generation,
        };
        self.notice = None;
        tracing::info!(index, title = %track.display_title(index), autoplay, generation = generation.0, "track selected");

        if let Err(err) = self.media.load(&track.source_uri, generation) {
            tracing::warn!(%err, uri = %track.source_uri, "media backend refused the source");
            return Err(self.fail(track.source_uri, 0));
        }
        self.pending_ready = Some(PendingReady {
            generation,
            autoplay,
        });

        match self.graph.ensure_graph(self.media.handle()) {
            // the gain node owns the volume again, so the element must not scale it twice
            Ok(_) => self.media.set_volume(1.0),
            Err(err) => self.notice = Some(err.to_string()),
        }
        self.visualizer.start();

        Ok(PlaybackStatus::Loading)
    }

    /// Feeds a lifecycle signal from the media backend into the state machine.
    /// Events from superseded selections are ignored.
    pub fn handle_media_event(&mut self, event: MediaEvent) -> Result<PlaybackStatus> {
        if event.generation != self.session.generation {
            tracing::debug!(
                stale = event.generation.0,
                current = self.session.generation.0,
                kind = ?event.kind,
                "dropping event from a superseded selection"
            );
            return Ok(self.session.status);
        }

        match event.kind {
            MediaEventKind::Ready => match self.pending_ready.take() {
                Some(pending) if pending.generation == event.generation => {
                    if pending.autoplay {
                        self.start_playback()
                    } else {
                        self.session.status = PlaybackStatus::Paused;
                        Ok(PlaybackStatus::Paused)
                    }
                }
                other => {
                    self.pending_ready = other;
                    tracing::debug!("ready signal without a pending listener");
                    Ok(self.session.status)
                }
            },
            MediaEventKind::Ended => {
                if self.session.status != PlaybackStatus::Playing {
                    tracing::debug!(status = ?self.session.status, "ignoring completion");
                    return Ok(self.session.status);
                }
                self.session.status = PlaybackStatus::Ended;
                let next = self.playlist.next()?;
                tracing::info!(next, "track finished, advancing");
                self.select_track(next, true)
            }
            MediaEventKind::Error { code } => {
                let uri = self.active_uri().unwrap_or_default();
                Err(self.fail(uri, code))
            }
        }
    }

    /// Starts or resumes playback.
    pub fn play(&mut self) -> Result<PlaybackStatus> {
        match self.session.status {
            PlaybackStatus::Idle => {
                let index = self.playlist.current_index()?;
                self.select_track(index, true)
            }
            PlaybackStatus::Paused => self.start_playback(),
            PlaybackStatus::Loading => {
                if let Some(pending) = self.pending_ready.as_mut() {
                    pending.autoplay = true;
                }
                Ok(PlaybackStatus::Loading)
            }
            PlaybackStatus::Ended => match self.session.active_track {
                Some(index) => self.select_track(index, true),
                None => Ok(PlaybackStatus::Ended),
            },
            PlaybackStatus::Playing => Ok(PlaybackStatus::Playing),
            PlaybackStatus::Error => {
                tracing::debug!("play ignored, select a track to recover");
                Ok(PlaybackStatus::Error)
            }
        }
    }

    pub fn pause(&mut self) -> PlaybackStatus {
        match self.session.status {
            PlaybackStatus::Playing => {
                self.media.pause();
                self.session.status = PlaybackStatus::Paused;
            }
            PlaybackStatus::Loading => {
                if let Some(pending) = self.pending_ready.as_mut() {
                    pending.autoplay = false;
                }
            }
            _ => {}
        }
        self.session.status
    }

    /// Play button behaviour.
    pub fn toggle_play(&mut self) -> Result<PlaybackStatus> {
        let autoplay_armed = self.pending_ready.is_some_and(|pending| pending.autoplay);
        match self.session.status {
            PlaybackStatus::Playing => Ok(self.pause()),
            PlaybackStatus::Loading if autoplay_armed => Ok(self.pause()),
            _ => self.play(),
        }
    }

    pub fn next(&mut self) -> Result<PlaybackStatus> {
        let index = self.playlist.next()?;
        self.select_track(index, true)
    }

    pub fn previous(&mut self) -> Result<PlaybackStatus> {
        let index = self.playlist.previous()?;
        self.select_track(index, true)
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.playlist
            .toggle_shuffle(&mut *self.store, &self.keys.shuffle)
    }

    pub fn toggle_continuous_effects(&mut self) -> bool {
        self.visualizer
            .toggle_continuous_effects(&mut *self.store, &self.keys.continuous_effects)
    }

    /// Sets output volume. Uses the gain node when wired, the media element
    /// otherwise.
    pub fn set_volume(&mut self, volume: f32) {
        if self.graph.set_volume(volume) {
            self.media.set_volume(1.0);
        } else {
            self.media.set_volume(self.graph.volume());
        }
    }

    /// Any click or touch on the page. The first one unlocks audio output.
    pub fn on_user_gesture(&mut self) {
        if self.graph.unlock() {
            tracing::debug!("audio unlocked by user gesture");
        }
    }

    /// Runs one visualizer frame.
    pub fn animation_frame(
        &mut self,
        now_ms: u64,
        surface: &mut dyn Surface,
        host: &mut dyn EffectHost,
    ) -> FrameOutcome {
        self.visualizer.tick(now_ms, &mut self.graph, surface, host)
    }

    fn start_playback(&mut self) -> Result<PlaybackStatus> {
        match self.media.play() {
            Ok(()) => {
                self.graph.resume_if_suspended();
                self.session.status = PlaybackStatus::Playing;
                tracing::info!(track = ?self.session.active_track, "playing");
                Ok(PlaybackStatus::Playing)
            }
            Err(err) => {
                tracing::warn!(%err, "play request rejected");
                self.session.status = PlaybackStatus::Paused;
                self.notice = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn fail(&mut self, uri: String, code: u16) -> PlayerError {
        self.pending_ready = None;
        self.session.status = PlaybackStatus::Error;
        let err = PlayerError::MediaLoad { uri, code };
        tracing::warn!(%err, "media failed");
        self.notice = Some(err.to_string());
        err
    }

    fn active_uri(&self) -> Option<String> {
        self.session
            .active_track
            .and_then(|index| self.playlist.track(index))
            .map(|track| track.source_uri.clone())
    }
}

impl<M, A> std::fmt::Debug for PlaybackController<M, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("session", &self.session)
            .field("pending_ready", &self.pending_ready)
            .field("notice", &self.notice)
            .finish()
    }
}
