//! Playback engine for the portfolio site's in-page audio player.
//!
//! Each module owns one subsystem: the playlist sequencer, the signal graph,
//! the playback state machine and the per-frame visualizer. Host
//! collaborators (media element, audio subsystem, drawing surface, durable
//! store) sit behind traits; [`sim`] provides in-memory versions of all of
//! them for headless runs and tests.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod media;
pub mod playlist;
pub mod sim;
pub mod store;
pub mod surface;
pub mod visualizer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AudioConfig, PlayerConfig, StoreKeys, VisualizerConfig};
pub use controller::{PlaybackController, PlaybackSession, PlaybackStatus};
pub use error::{PlayerError, Result};
pub use graph::{AudioBackend, GraphManager, NodeId, SignalGraph};
pub use media::{Generation, MediaBackend, MediaEvent, MediaEventKind, MediaHandle};
pub use playlist::{Playlist, Track, TrackRow};
pub use store::{JsonFileStore, MemoryStore, PreferenceStore, Preferences};
pub use surface::{LinearGradient, Point, StrokeStyle, Surface};
pub use visualizer::{
    rms_energy, EffectHost, EffectMarker, EffectRing, FrameOutcome, Triggered, Visualizer,
    VisualizerFrame,
};
