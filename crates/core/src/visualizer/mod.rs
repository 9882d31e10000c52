//! Per-frame waveform renderer and energy-driven effects.

pub mod effects;

use serde::Serialize;

use crate::{
    config::VisualizerConfig,
    graph::{AudioBackend, GraphManager},
    store::{write_flag, PreferenceStore},
    surface::{fit_to_container, LinearGradient, Point, StrokeStyle, Surface},
};

pub use effects::{EffectHost, EffectMarker, EffectRing, Triggered};

/// Summary of one rendered frame. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizerFrame {
    pub time_ms: u64,
    pub sample_count: usize,
    /// Normalised RMS energy in `[0, 1]`.
    pub rms: f32,
    pub stroke_width: f32,
    pub surface_size: (u32, u32),
    pub effects: Triggered,
    pub continuous_effects: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Drawn(VisualizerFrame),
    /// No analyser was attached; the loop stopped itself.
    Halted,
    /// The loop is not running.
    Idle,
}

/// Root-mean-square of unsigned samples centred on 128, normalised to `[0, 1]`.
pub fn rms_energy(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples
        .iter()
        .map(|&sample| {
            let centred = (f32::from(sample) - 128.0) / 128.0;
            centred * centred
        })
        .sum();
    (sum / samples.len() as f32).sqrt().min(1.0)
}

#[derive(Debug)]
pub struct Visualizer {
    config: VisualizerConfig,
    running: bool,
    continuous_effects: bool,
    effects: EffectRing,
    points: Vec<Point>,
}

impl Visualizer {
    pub fn new(config: VisualizerConfig, continuous_effects: bool) -> Self {
        Self {
            config,
            running: false,
            continuous_effects,
            effects: EffectRing::new(),
            points: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Schedules the loop. Returns `false` if it was already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        tracing::debug!("visualizer loop started");
        self.running = true;
        true
    }

    pub fn effects(&self) -> &EffectRing {
        &self.effects
    }

    pub fn continuous_effects(&self) -> bool {
        self.continuous_effects
    }

    /// Flips "trash mode" and persists it under `key`.
    pub fn toggle_continuous_effects(&mut self, store: &mut dyn PreferenceStore, key: &str) -> bool {
        self.continuous_effects = !self.continuous_effects;
        if let Err(err) = write_flag(store, key, self.continuous_effects) {
            tracing::warn!(%err, "could not persist continuous effects mode");
        }
        tracing::info!(enabled = self.continuous_effects, "continuous effects toggled");
        self.continuous_effects
    }

    /// Stroke width grows linearly with loudness.
    pub fn stroke_width(&self, rms: f32) -> f32 {
        self.config.base_stroke_width + self.config.stroke_width_gain * rms.clamp(0.0, 1.0)
    }

    /// Runs one animation frame.
    pub fn tick<A: AudioBackend>(
        &mut self,
        now_ms: u64,
        graph: &mut GraphManager<A>,
        surface: &mut dyn Surface,
        host: &mut dyn EffectHost,
    ) -> FrameOutcome {
        if !self.running {
            return FrameOutcome::Idle;
        }
        self.effects.sweep(now_ms, host);

        let Some(samples) = graph.sample() else {
            tracing::debug!("no analyser attached, visualizer loop halting");
            self.running = false;
            self.effects.clear(host);
            return FrameOutcome::Halted;
        };

        let rms = rms_energy(samples);
        let (width, height) = fit_to_container(surface);
        let slice = width as f32 / samples.len() as f32;
        let half_height = height as f32 / 2.0;
        self.points.clear();
        self.points.extend(samples.iter().enumerate().map(|(i, &sample)| Point {
            x: i as f32 * slice,
            y: f32::from(sample) / 128.0 * half_height,
        }));
        let sample_count = samples.len();

        let style = StrokeStyle {
            width: self.stroke_width(rms),
            gradient: LinearGradient::horizontal(width as f32, &self.config.gradient),
        };
        surface.clear();
        surface.stroke_path(&self.points, &style);

        let effects = if rms > self.config.energy_threshold || self.continuous_effects {
            self.effects.trigger(now_ms, &self.config, host)
        } else {
            Triggered::default()
        };

        FrameOutcome::Drawn(VisualizerFrame {
            time_ms: now_ms,
            sample_count,
            rms,
            stroke_width: style.width,
            surface_size: (width, height),
            effects,
            continuous_effects: self.continuous_effects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AudioConfig,
        sim::{RecordingEffectHost, RecordingSurface, SimulatedAudio},
        MediaHandle,
    };

    fn small_analyser() -> AudioConfig {
        AudioConfig {
            fft_size: 256,
            default_volume: 1.0,
        }
    }

    fn wired(amplitude: f32) -> GraphManager<SimulatedAudio> {
        let mut graph = GraphManager::new(SimulatedAudio::new(), &small_analyser());
        graph.ensure_graph(MediaHandle(1)).unwrap();
        graph.backend_mut().set_amplitude(amplitude);
        graph
    }

    #[test]
    fn silence_has_zero_energy() {
        assert_eq!(rms_energy(&[128; 64]), 0.0);
        assert_eq!(rms_energy(&[]), 0.0);
        let loud = rms_energy(&[0, 255, 0, 255]);
        assert!(loud > 0.95 && loud <= 1.0);
    }

    #[test]
    fn stroke_width_is_monotonic() {
        let vis = Visualizer::new(VisualizerConfig::default(), false);
        let mut last = vis.stroke_width(0.0);
        for step in 1..=10 {
            let width = vis.stroke_width(step as f32 / 10.0);
            assert!(width > last);
            last = width;
        }
    }

    #[test]
    fn idle_until_started() {
        let mut vis = Visualizer::new(VisualizerConfig::default(), false);
        let mut graph = wired(0.0);
        let mut surface = RecordingSurface::new(300.0, 100.0, 2.0);
        let mut host = RecordingEffectHost::default();

        assert_eq!(vis.tick(0, &mut graph, &mut surface, &mut host), FrameOutcome::Idle);
        assert!(vis.start());
        assert!(!vis.start());
    }

    #[test]
    fn draws_a_full_frame_and_resizes() {
        let mut vis = Visualizer::new(VisualizerConfig::default(), false);
        let mut graph = wired(0.1);
        let mut surface = RecordingSurface::new(300.0, 100.0, 2.0);
        let mut host = RecordingEffectHost::default();
        vis.start();

        let FrameOutcome::Drawn(frame) = vis.tick(16, &mut graph, &mut surface, &mut host) else {
            panic!("expected a drawn frame");
        };
        assert_eq!(frame.surface_size, (600, 200));
        assert_eq!(frame.sample_count, 128);
        assert_eq!(surface.clears(), 1);
        let stroke = surface.last_stroke().unwrap();
        assert_eq!(stroke.points.len(), 128);
        assert_eq!(stroke.style.gradient.stops.len(), 2);
        assert!(!frame.effects.any());
        assert!(host.visible().is_empty());
    }

    #[test]
    fn follows_container_resizes() {
        let mut vis = Visualizer::new(VisualizerConfig::default(), false);
        let mut graph = wired(0.1);
        let mut surface = RecordingSurface::new(300.0, 100.0, 2.0);
        let mut host = RecordingEffectHost::default();
        vis.start();

        vis.tick(0, &mut graph, &mut surface, &mut host);
        assert_eq!(surface.resizes(), 1);

        surface.set_layout_size(150.5, 60.0);
        let FrameOutcome::Drawn(frame) = vis.tick(16, &mut graph, &mut surface, &mut host) else {
            panic!("expected a drawn frame");
        };
        assert_eq!(frame.surface_size, (301, 120));
        assert_eq!(surface.resizes(), 2);
        let stroke = surface.last_stroke().unwrap();
        assert_eq!(stroke.style.gradient.x1, 301.0);
        let last_x = stroke.points.last().unwrap().x;
        assert!(last_x < 301.0 && last_x > 290.0);

        vis.tick(32, &mut graph, &mut surface, &mut host);
        assert_eq!(surface.resizes(), 2);
    }

    #[test]
    fn loud_frames_fire_effects() {
        let mut vis = Visualizer::new(VisualizerConfig::default(), false);
        let mut graph = wired(0.9);
        let mut surface = RecordingSurface::new(100.0, 50.0, 1.0);
        let mut host = RecordingEffectHost::default();
        vis.start();

        let FrameOutcome::Drawn(frame) = vis.tick(0, &mut graph, &mut surface, &mut host) else {
            panic!("expected a drawn frame");
        };
        assert!(frame.rms > 0.25);
        assert!(frame.effects.label_swap);
        assert!(vis.effects().flip_locked());
    }

    #[test]
    fn continuous_mode_forces_effects_on_silence() {
        let mut vis = Visualizer::new(VisualizerConfig::default(), true);
        let mut graph = wired(0.0);
        let mut surface = RecordingSurface::new(100.0, 50.0, 1.0);
        let mut host = RecordingEffectHost::default();
        vis.start();

        let FrameOutcome::Drawn(frame) = vis.tick(0, &mut graph, &mut surface, &mut host) else {
            panic!("expected a drawn frame");
        };
        assert_eq!(frame.rms, 0.0);
        assert!(frame.effects.shake);
    }

    #[test]
    fn halts_without_analyser() {
        let mut vis = Visualizer::new(VisualizerConfig::default(), true);
        let mut graph = GraphManager::new(SimulatedAudio::new(), &small_analyser());
        let mut surface = RecordingSurface::new(100.0, 50.0, 1.0);
        let mut host = RecordingEffectHost::default();
        vis.start();

        assert_eq!(vis.tick(0, &mut graph, &mut surface, &mut host), FrameOutcome::Halted);
        assert!(!vis.is_running());
        assert_eq!(surface.clears(), 0);
        assert!(vis.start());
    }

    #[test]
    fn toggling_continuous_mode_persists() {
        let mut store = crate::store::MemoryStore::new();
        let mut vis = Visualizer::new(VisualizerConfig::default(), false);
        assert!(vis.toggle_continuous_effects(&mut store, "trash-mode"));
        assert!(crate::store::read_flag(&store, "trash-mode", false));
    }
}
