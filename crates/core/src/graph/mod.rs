//! Signal path management: `source -> analyser -> gain -> output`.
//!
//! [`GraphManager`] is the only writer of the audio nodes. It builds them the
//! first time they are needed and afterwards only rewires them, so switching
//! tracks never allocates fresh nodes.

use crate::{config::AudioConfig, MediaHandle, PlayerError, Result};

/// Opaque identifier of a node owned by the audio subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Capabilities the host audio subsystem must provide.
pub trait AudioBackend {
    fn create_source(&mut self, media: MediaHandle) -> Result<NodeId>;
    /// Creates an analyser whose time-domain buffer holds `fft_size / 2`
    /// unsigned samples centred on 128.
    fn create_analyser(&mut self, fft_size: usize) -> Result<NodeId>;
    fn create_gain(&mut self) -> Result<NodeId>;
    /// The final destination (speakers).
    fn output(&self) -> NodeId;
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()>;
    /// Severs every outgoing edge of `node`.
    fn disconnect(&mut self, node: NodeId) -> Result<()>;
    fn set_gain(&mut self, gain: NodeId, value: f32) -> Result<()>;
    fn read_time_domain(&mut self, analyser: NodeId, buffer: &mut [u8]) -> Result<()>;
    fn is_suspended(&self) -> bool;
    fn resume(&mut self) -> Result<()>;
}

/// Handles to the three nodes of a fully wired path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalGraph {
    pub media: MediaHandle,
    pub source: NodeId,
    pub analyser: NodeId,
    pub gain: NodeId,
}

#[derive(Debug)]
pub struct GraphManager<A> {
    backend: A,
    fft_size: usize,
    sample_len: usize,
    volume: f32,
    source: Option<(NodeId, MediaHandle)>,
    analyser: Option<NodeId>,
    gain: Option<NodeId>,
    connected: bool,
    samples: Vec<u8>,
    degraded: Option<String>,
    unlocked: bool,
}

impl<A: AudioBackend> GraphManager<A> {
    pub fn new(backend: A, config: &AudioConfig) -> Self {
        Self {
            backend,
            fft_size: config.fft_size,
            sample_len: config.sample_buffer_len(),
            volume: config.default_volume.clamp(0.0, 1.0),
            source: None,
            analyser: None,
            gain: None,
            connected: false,
            samples: Vec::new(),
            degraded: None,
            unlocked: false,
        }
    }

    pub fn backend(&self) -> &A {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut A {
        &mut self.backend
    }

    /// Builds any missing node and (re)wires the path. Safe to call any number
    /// of times: existing edges are severed before the path is laid again, so
    /// exactly one connected path remains.
    ///
    /// A failure leaves the manager degraded. Media playback is unaffected but
    /// visualisation and gain control become unavailable.
    pub fn ensure_graph(&mut self, media: MediaHandle) -> Result<SignalGraph> {
        match self.wire(media) {
            Ok(graph) => {
                if self.degraded.take().is_some() {
                    tracing::info!("audio graph recovered");
                }
                Ok(graph)
            }
            Err(err) => {
                let reason = match err {
                    PlayerError::GraphConstruction(reason) => reason,
                    other => other.to_string(),
                };
                tracing::warn!(%reason, "audio graph unavailable, continuing without it");
                self.connected = false;
                self.degraded = Some(reason.clone());
                Err(PlayerError::GraphConstruction(reason))
            }
        }
    }

    fn wire(&mut self, media: MediaHandle) -> Result<SignalGraph> {
        let current = self.source;
        let source = match current {
            Some((node, bound)) if bound == media => node,
            stale => {
                if let Some((old, _)) = stale {
                    self.sever(old);
                }
                let node = self.backend.create_source(media)?;
                self.source = Some((node, media));
                node
            }
        };
        let analyser = match self.analyser {
            Some(node) => node,
            None => {
                let node = self.backend.create_analyser(self.fft_size)?;
                self.analyser = Some(node);
                node
            }
        };
        let gain = match self.gain {
            Some(node) => node,
            None => {
                let node = self.backend.create_gain()?;
                self.gain = Some(node);
                node
            }
        };
        self.samples.resize(self.sample_len, 128);

        self.connected = false;
        for node in [source, analyser, gain] {
            self.sever(node);
        }

        let output = self.backend.output();
        self.backend.connect(source, analyser)?;
        self.backend.connect(analyser, gain)?;
        self.backend.set_gain(gain, self.volume)?;
        self.backend.connect(gain, output)?;
        self.connected = true;

        Ok(SignalGraph {
            media,
            source,
            analyser,
            gain,
        })
    }

    fn sever(&mut self, node: NodeId) {
        if let Err(err) = self.backend.disconnect(node) {
            tracing::debug!(?node, %err, "disconnect failed");
        }
    }

    /// The wired path, if any.
    pub fn graph(&self) -> Option<SignalGraph> {
        if !self.connected {
            return None;
        }
        match (self.source, self.analyser, self.gain) {
            (Some((source, media)), Some(analyser), Some(gain)) => Some(SignalGraph {
                media,
                source,
                analyser,
                gain,
            }),
            _ => None,
        }
    }

    pub fn analyser_available(&self) -> bool {
        self.connected && self.analyser.is_some()
    }

    /// Reason the graph is unavailable, if it failed to build.
    pub fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    /// Refreshes and returns the analyser's sample buffer. `None` when no
    /// analyser is attached.
    pub fn sample(&mut self) -> Option<&[u8]> {
        let analyser = match self.analyser {
            Some(node) if self.connected => node,
            _ => return None,
        };
        if let Err(err) = self.backend.read_time_domain(analyser, &mut self.samples) {
            tracing::warn!(%err, "analyser read failed, detaching visualisation");
            self.connected = false;
            self.degraded = Some(err.to_string());
            return None;
        }
        Some(&self.samples)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Applies `volume` to the live gain node. Returns `false` when no gain
    /// node is wired and the caller has to fall back to the media element.
    /// Non-finite input keeps the current volume.
    pub fn set_volume(&mut self, volume: f32) -> bool {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        } else {
            tracing::debug!(volume, "ignoring non-finite volume");
        }
        let gain = match self.gain {
            Some(node) if self.connected => node,
            _ => return false,
        };
        match self.backend.set_gain(gain, self.volume) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "gain update failed");
                false
            }
        }
    }

    /// Resumes a suspended backend. Failures are logged and the player keeps
    /// going silently.
    pub fn resume_if_suspended(&mut self) -> bool {
        if !self.backend.is_suspended() {
            return true;
        }
        match self.backend.resume() {
            Ok(()) => {
                tracing::debug!("audio backend resumed");
                true
            }
            Err(err) => {
                tracing::warn!(%err, "audio backend resume failed, output stays silent");
                false
            }
        }
    }

    /// First user gesture unlocks the backend. Later gestures are ignored.
    pub fn unlock(&mut self) -> bool {
        if self.unlocked {
            return false;
        }
        self.unlocked = true;
        self.resume_if_suspended();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedAudio;

    const MEDIA: MediaHandle = MediaHandle(1);

    fn manager() -> GraphManager<SimulatedAudio> {
        GraphManager::new(SimulatedAudio::new(), &AudioConfig::default())
    }

    #[test]
    fn repeated_ensure_keeps_one_path() {
        let mut graph = manager();
        let first = graph.ensure_graph(MEDIA).unwrap();
        for _ in 0..4 {
            assert_eq!(graph.ensure_graph(MEDIA).unwrap(), first);
        }

        let audio = graph.backend();
        assert_eq!(audio.nodes_created(), 3);
        assert_eq!(audio.edge_count(), 3);
        assert!(audio.has_edge(first.source, first.analyser));
        assert!(audio.has_edge(first.analyser, first.gain));
        assert!(audio.has_edge(first.gain, audio.output()));
    }

    #[test]
    fn construction_failure_degrades() {
        let mut graph = manager();
        graph.backend_mut().fail_node_creation(true);

        let err = graph.ensure_graph(MEDIA).unwrap_err();
        assert!(matches!(err, PlayerError::GraphConstruction(_)));
        assert!(!graph.analyser_available());
        assert!(graph.degraded().is_some());
        assert!(graph.sample().is_none());
        assert!(!graph.set_volume(0.3));
        assert_eq!(graph.volume(), 0.3);
    }

    #[test]
    fn recovers_after_failure() {
        let mut graph = manager();
        graph.backend_mut().fail_node_creation(true);
        assert!(graph.ensure_graph(MEDIA).is_err());

        graph.backend_mut().fail_node_creation(false);
        graph.ensure_graph(MEDIA).unwrap();
        assert!(graph.degraded().is_none());
        assert_eq!(graph.backend().edge_count(), 3);
    }

    #[test]
    fn volume_reaches_the_gain_node() {
        let mut graph = manager();
        let wired = graph.ensure_graph(MEDIA).unwrap();
        assert_eq!(graph.backend().gain_value(wired.gain), Some(0.9));

        assert!(graph.set_volume(1.7));
        assert_eq!(graph.backend().gain_value(wired.gain), Some(1.0));
    }

    #[test]
    fn non_finite_volume_keeps_the_last_value() {
        let mut graph = manager();
        let wired = graph.ensure_graph(MEDIA).unwrap();
        graph.set_volume(0.5);

        assert!(graph.set_volume(f32::NAN));
        assert!(graph.set_volume(f32::INFINITY));
        assert_eq!(graph.volume(), 0.5);
        assert_eq!(graph.backend().gain_value(wired.gain), Some(0.5));
    }

    #[test]
    fn samples_have_fixed_length() {
        let mut graph = manager();
        graph.ensure_graph(MEDIA).unwrap();
        graph.backend_mut().set_amplitude(0.5);

        let samples = graph.sample().unwrap();
        assert_eq!(samples.len(), 512);
        assert!(samples.iter().any(|s| *s != 128));
    }

    #[test]
    fn unlock_resumes_only_once() {
        let mut graph = manager();
        assert!(graph.backend().is_suspended());
        assert!(graph.unlock());
        assert!(!graph.backend().is_suspended());
        assert!(!graph.unlock());
        assert_eq!(graph.backend().resume_calls(), 1);
    }

    #[test]
    fn resume_failure_is_tolerated() {
        let mut graph = manager();
        graph.backend_mut().fail_resume(true);
        assert!(!graph.resume_if_suspended());
        assert!(graph.backend().is_suspended());
        graph.ensure_graph(MEDIA).unwrap();
    }
}
