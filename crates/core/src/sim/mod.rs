//! In-memory stand-ins for the host collaborators.
//!
//! These back the headless command line runs and the test suite. They record
//! what the engine asked of them so behaviour can be asserted without a
//! browser, a sound card or a real clock.

use std::f32::consts::TAU;

use crate::{
    graph::{AudioBackend, NodeId},
    media::{Generation, MediaBackend, MediaEvent, MediaHandle},
    surface::{Point, StrokeStyle, Surface},
    visualizer::{EffectHost, EffectMarker},
    PlayerError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum SimNode {
    Output,
    Source(MediaHandle),
    Analyser,
    Gain(f32),
}

/// Audio subsystem that tracks nodes and edges and synthesises a sine wave for
/// analyser reads. Starts suspended, like a browser audio context before the
/// first gesture.
#[derive(Debug)]
pub struct SimulatedAudio {
    nodes: Vec<SimNode>,
    edges: Vec<(NodeId, NodeId)>,
    suspended: bool,
    resume_calls: usize,
    fail_nodes: bool,
    fail_resume: bool,
    amplitude: f32,
    phase: f32,
}

impl Default for SimulatedAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAudio {
    pub fn new() -> Self {
        Self {
            nodes: vec![SimNode::Output],
            edges: Vec::new(),
            suspended: true,
            resume_calls: 0,
            fail_nodes: false,
            fail_resume: false,
            amplitude: 0.0,
            phase: 0.0,
        }
    }

    /// Peak level of the synthesised signal, `0.0..=1.0`.
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude.clamp(0.0, 1.0);
    }

    pub fn fail_node_creation(&mut self, fail: bool) {
        self.fail_nodes = fail;
    }

    pub fn fail_resume(&mut self, fail: bool) {
        self.fail_resume = fail;
    }

    /// Nodes created through the backend, not counting the output.
    pub fn nodes_created(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.contains(&(from, to))
    }

    pub fn gain_value(&self, node: NodeId) -> Option<f32> {
        match self.nodes.get(node.0 as usize) {
            Some(SimNode::Gain(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls
    }

    fn add(&mut self, node: SimNode) -> Result<NodeId> {
        if self.fail_nodes {
            return Err(PlayerError::GraphConstruction(
                "simulated audio context unavailable".to_string(),
            ));
        }
        self.nodes.push(node);
        Ok(NodeId((self.nodes.len() - 1) as u32))
    }

    fn node(&self, id: NodeId) -> Result<SimNode> {
        self.nodes
            .get(id.0 as usize)
            .copied()
            .ok_or_else(|| PlayerError::GraphConstruction(format!("unknown node {}", id.0)))
    }
}

impl AudioBackend for SimulatedAudio {
    fn create_source(&mut self, media: MediaHandle) -> Result<NodeId> {
        let already_bound = self
            .nodes
            .iter()
            .any(|node| *node == SimNode::Source(media));
        if already_bound {
            return Err(PlayerError::GraphConstruction(format!(
                "media element {} already has a source node",
                media.0
            )));
        }
        self.add(SimNode::Source(media))
    }

    fn create_analyser(&mut self, _fft_size: usize) -> Result<NodeId> {
        self.add(SimNode::Analyser)
    }

    fn create_gain(&mut self) -> Result<NodeId> {
        self.add(SimNode::Gain(1.0))
    }

    fn output(&self) -> NodeId {
        NodeId(0)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.node(from)?;
        self.node(to)?;
        self.edges.push((from, to));
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.edges.retain(|(from, _)| *from != node);
        Ok(())
    }

    fn set_gain(&mut self, gain: NodeId, value: f32) -> Result<()> {
        match self.nodes.get_mut(gain.0 as usize) {
            Some(SimNode::Gain(current)) => {
                *current = value;
                Ok(())
            }
            _ => Err(PlayerError::GraphConstruction(format!("node {} is not a gain", gain.0))),
        }
    }

    fn read_time_domain(&mut self, analyser: NodeId, buffer: &mut [u8]) -> Result<()> {
        if self.node(analyser)? != SimNode::Analyser {
            return Err(PlayerError::msg(format!("node {} is not an analyser", analyser.0)));
        }
        let len = buffer.len().max(1) as f32;
        for (i, slot) in buffer.iter_mut().enumerate() {
            let angle = self.phase + TAU * 4.0 * i as f32 / len;
            *slot = (128.0 + self.amplitude * 127.0 * angle.sin()).round() as u8;
        }
        self.phase = (self.phase + 0.3) % TAU;
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<()> {
        self.resume_calls += 1;
        if self.fail_resume {
            return Err(PlayerError::msg("simulated resume rejected"));
        }
        self.suspended = false;
        Ok(())
    }
}

/// Media element that records loads and play requests. Lifecycle events are
/// produced on demand by the caller, tagged with the latest load's generation.
#[derive(Debug)]
pub struct SimulatedMedia {
    handle: MediaHandle,
    loads: Vec<(String, Generation)>,
    playing: bool,
    volume: f32,
    block_autoplay: bool,
    play_calls: usize,
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMedia {
    pub fn new() -> Self {
        Self {
            handle: MediaHandle(1),
            loads: Vec::new(),
            playing: false,
            volume: 1.0,
            block_autoplay: false,
            play_calls: 0,
        }
    }

    /// Rejects `play()` until cleared.
    pub fn block_autoplay(&mut self, block: bool) {
        self.block_autoplay = block;
    }

    pub fn current_source(&self) -> Option<&str> {
        self.loads.last().map(|(uri, _)| uri.as_str())
    }

    pub fn loads(&self) -> &[(String, Generation)] {
        &self.loads
    }

    pub fn last_generation(&self) -> Generation {
        self.loads
            .last()
            .map(|(_, generation)| *generation)
            .unwrap_or_default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play_calls(&self) -> usize {
        self.play_calls
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn ready_event(&self) -> MediaEvent {
        MediaEvent::ready(self.last_generation())
    }

    pub fn ended_event(&self) -> MediaEvent {
        MediaEvent::ended(self.last_generation())
    }

    pub fn error_event(&self, code: u16) -> MediaEvent {
        MediaEvent::error(self.last_generation(), code)
    }
}

impl MediaBackend for SimulatedMedia {
    fn handle(&self) -> MediaHandle {
        self.handle
    }

    fn load(&mut self, uri: &str, generation: Generation) -> Result<()> {
        self.playing = false;
        self.loads.push((uri.to_string(), generation));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.block_autoplay {
            return Err(PlayerError::AutoplayBlocked);
        }
        self.play_calls += 1;
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStroke {
    pub points: Vec<Point>,
    pub style: StrokeStyle,
}

/// Drawing surface that keeps the last stroke and counters.
#[derive(Debug)]
pub struct RecordingSurface {
    layout: (f32, f32),
    dpr: f32,
    pixels: (u32, u32),
    clears: usize,
    strokes: usize,
    resizes: usize,
    last_stroke: Option<RecordedStroke>,
}

impl RecordingSurface {
    pub fn new(css_width: f32, css_height: f32, dpr: f32) -> Self {
        Self {
            layout: (css_width, css_height),
            dpr,
            pixels: (0, 0),
            clears: 0,
            strokes: 0,
            resizes: 0,
            last_stroke: None,
        }
    }

    /// Simulates the container changing size.
    pub fn set_layout_size(&mut self, css_width: f32, css_height: f32) {
        self.layout = (css_width, css_height);
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn strokes(&self) -> usize {
        self.strokes
    }

    pub fn resizes(&self) -> usize {
        self.resizes
    }

    pub fn last_stroke(&self) -> Option<&RecordedStroke> {
        self.last_stroke.as_ref()
    }
}

impl Surface for RecordingSurface {
    fn layout_size(&self) -> (f32, f32) {
        self.layout
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.dpr
    }

    fn pixel_size(&self) -> (u32, u32) {
        self.pixels
    }

    fn set_pixel_size(&mut self, width: u32, height: u32) {
        self.pixels = (width, height);
        self.resizes += 1;
    }

    fn clear(&mut self) {
        self.clears += 1;
    }

    fn stroke_path(&mut self, points: &[Point], style: &StrokeStyle) {
        self.strokes += 1;
        self.last_stroke = Some(RecordedStroke {
            points: points.to_vec(),
            style: style.clone(),
        });
    }
}

/// Effect host that mirrors which markers are currently on the page.
#[derive(Debug, Default)]
pub struct RecordingEffectHost {
    visible: Vec<EffectMarker>,
    shown: Vec<EffectMarker>,
}

impl RecordingEffectHost {
    pub fn visible(&self) -> &[EffectMarker] {
        &self.visible
    }

    pub fn total_shown(&self) -> usize {
        self.shown.len()
    }

    pub fn shown_count(&self, predicate: impl Fn(&EffectMarker) -> bool) -> usize {
        self.shown.iter().filter(|marker| predicate(marker)).count()
    }
}

impl EffectHost for RecordingEffectHost {
    fn show(&mut self, marker: &EffectMarker) {
        self.visible.push(marker.clone());
        self.shown.push(marker.clone());
    }

    fn remove(&mut self, marker: &EffectMarker) {
        if let Some(pos) = self.visible.iter().position(|m| m == marker) {
            self.visible.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_source_for_same_media_is_refused() {
        let mut audio = SimulatedAudio::new();
        audio.create_source(MediaHandle(1)).unwrap();
        assert!(audio.create_source(MediaHandle(1)).is_err());
        assert!(audio.create_source(MediaHandle(2)).is_ok());
    }

    #[test]
    fn silent_signal_sits_at_midpoint() {
        let mut audio = SimulatedAudio::new();
        let analyser = audio.create_analyser(64).unwrap();
        let mut buffer = [0u8; 32];
        audio.read_time_domain(analyser, &mut buffer).unwrap();
        assert!(buffer.iter().all(|s| *s == 128));
    }

    #[test]
    fn media_tags_events_with_latest_generation() {
        let mut media = SimulatedMedia::new();
        media.load("a.mp3", Generation(1)).unwrap();
        media.load("b.mp3", Generation(2)).unwrap();
        assert_eq!(media.ready_event().generation, Generation(2));
        assert_eq!(media.current_source(), Some("b.mp3"));
    }
}
