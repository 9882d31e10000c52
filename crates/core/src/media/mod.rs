use serde::{Deserialize, Serialize};

use crate::Result;

/// Identifies the media element an audio source node is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(pub u32);

/// Monotonic token identifying one track selection. Lifecycle events carry
/// the generation of the load that produced them so late arrivals from a
/// superseded selection can be recognised and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaEventKind {
    /// Enough data is buffered to start playback.
    Ready,
    /// Playback reached the end of the source.
    Ended,
    /// Loading or decoding failed with the backend's error code.
    Error { code: u16 },
}

/// Lifecycle signal emitted by the media backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEvent {
    pub generation: Generation,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    pub fn ready(generation: Generation) -> Self {
        Self {
            generation,
            kind: MediaEventKind::Ready,
        }
    }

    pub fn ended(generation: Generation) -> Self {
        Self {
            generation,
            kind: MediaEventKind::Ended,
        }
    }

    pub fn error(generation: Generation, code: u16) -> Self {
        Self {
            generation,
            kind: MediaEventKind::Error { code },
        }
    }
}

/// The host media element. Decoding and buffering happen behind this trait.
pub trait MediaBackend {
    fn handle(&self) -> MediaHandle;
    /// Points the element at `uri` and starts loading. Events caused by this
    /// load must be tagged with `generation`.
    fn load(&mut self, uri: &str, generation: Generation) -> Result<()>;
    /// Starts playback. Returns [`crate::PlayerError::AutoplayBlocked`] when
    /// the platform refuses without a user gesture.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    /// Element-level volume, used when no gain node is available.
    fn set_volume(&mut self, volume: f32);
}
