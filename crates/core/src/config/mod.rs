use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PlayerError, Result, Track};

/// Top-level configuration structure for the player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub tracks: Vec<Track>,
    pub audio: AudioConfig,
    pub visualizer: VisualizerConfig,
    pub store_keys: StoreKeys,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tracks: vec![
                Track::new("Мой трек 1", "../assets/music/minipops67.mp3"),
                Track::new("Мой трек 2", "../assets/music/gufymer.mp3"),
            ],
            audio: AudioConfig::default(),
            visualizer: VisualizerConfig::default(),
            store_keys: StoreKeys::default(),
        }
    }
}

impl PlayerConfig {
    /// Reads a JSON configuration file. Missing sections fall back to their
    /// defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.visualizer.validate()
    }
}

/// Configuration specific to the audio graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub fft_size: usize,
    pub default_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            default_volume: 0.9,
        }
    }
}

impl AudioConfig {
    /// Number of time-domain samples the analyser exposes per read.
    pub fn sample_buffer_len(&self) -> usize {
        self.fft_size / 2
    }

    fn validate(&self) -> Result<()> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(PlayerError::msg(format!(
                "fft_size must be a power of two >= 32, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(PlayerError::msg(format!(
                "default_volume must be within [0, 1], got {}",
                self.default_volume
            )));
        }
        Ok(())
    }
}

/// Drawing and reactive-effect tuning for the visualizer loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// RMS level above which the effect bundle fires.
    pub energy_threshold: f32,
    pub base_stroke_width: f32,
    pub stroke_width_gain: f32,
    pub gradient: Vec<String>,
    pub shake_ms: u64,
    pub strobe_ms: u64,
    pub floating_text_ms: u64,
    pub label_swap_ms: u64,
    pub max_floating_texts: usize,
    pub floating_words: Vec<String>,
    pub label_swap_text: String,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.25,
            base_stroke_width: 2.0,
            stroke_width_gain: 10.0,
            gradient: vec!["#ff4d6d".to_string(), "#7b2cbf".to_string()],
            shake_ms: 320,
            strobe_ms: 120,
            floating_text_ms: 900,
            label_swap_ms: 650,
            max_floating_texts: 6,
            floating_words: ["BOOM", "TRASH", "BASS", "LOUD"]
                .into_iter()
                .map(String::from)
                .collect(),
            label_swap_text: "🔥 TRASH BOOST 🔥".to_string(),
        }
    }
}

impl VisualizerConfig {
    fn validate(&self) -> Result<()> {
        if !(self.energy_threshold > 0.0 && self.energy_threshold <= 1.0) {
            return Err(PlayerError::msg(format!(
                "energy_threshold must be within (0, 1], got {}",
                self.energy_threshold
            )));
        }
        if self.gradient.is_empty() {
            return Err(PlayerError::msg("gradient needs at least one colour stop"));
        }
        if self.stroke_width_gain < 0.0 {
            return Err(PlayerError::msg("stroke_width_gain must not be negative"));
        }
        Ok(())
    }
}

/// Names under which persisted flags live in the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreKeys {
    pub shuffle: String,
    pub continuous_effects: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            shuffle: "trash-shuffle".to_string(),
            continuous_effects: "trash-mode".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PlayerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tracks.len(), 2);
        assert_eq!(config.audio.sample_buffer_len(), 512);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PlayerConfig = serde_json::from_str(
            r#"{ "tracks": [{ "title": "Solo", "source_uri": "solo.mp3" }],
                 "visualizer": { "energy_threshold": 0.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.tracks.len(), 1);
        assert_eq!(config.visualizer.energy_threshold, 0.5);
        assert_eq!(config.visualizer.shake_ms, 320);
        assert_eq!(config.store_keys.shuffle, "trash-shuffle");
    }

    #[test]
    fn rejects_odd_fft_sizes() {
        let mut config = PlayerConfig::default();
        config.audio.fft_size = 1000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fft_size"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        std::fs::write(&path, r#"{ "audio": { "default_volume": 0.5 } }"#).unwrap();

        let config = PlayerConfig::load(&path).unwrap();
        assert_eq!(config.audio.default_volume, 0.5);
        assert_eq!(config.audio.fft_size, 1024);
    }
}
