//! Time-boxed reactive effects.
//!
//! Every effect is an entry with an expiry timestamp. The visualizer sweeps
//! the ring once per frame, so effect lifetimes follow the frame clock rather
//! than independent platform timers.

use serde::Serialize;

use crate::config::VisualizerConfig;

/// Visual marker an effect puts on the page while it is alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EffectMarker {
    /// Screen-shake class on the page root.
    Shake,
    /// Full-screen flash overlay.
    Strobe,
    /// Ephemeral floating word.
    FloatingText { id: u64, text: String },
    /// Temporary replacement of the now-playing label.
    LabelSwap { text: String },
}

/// Page-side owner of effect markers.
pub trait EffectHost {
    fn show(&mut self, marker: &EffectMarker);
    fn remove(&mut self, marker: &EffectMarker);
}

/// Which parts of the bundle actually fired on a trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Triggered {
    pub shake: bool,
    pub strobe: bool,
    pub floating_text: bool,
    pub label_swap: bool,
}

impl Triggered {
    pub fn any(&self) -> bool {
        self.shake || self.strobe || self.floating_text || self.label_swap
    }
}

#[derive(Debug, Clone)]
struct ActiveEffect {
    marker: EffectMarker,
    expires_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct EffectRing {
    active: Vec<ActiveEffect>,
    /// Held while a label swap is on screen.
    flip_lock: bool,
    next_id: u64,
    word_cursor: usize,
}

impl EffectRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn floating_count(&self) -> usize {
        self.active
            .iter()
            .filter(|effect| matches!(effect.marker, EffectMarker::FloatingText { .. }))
            .count()
    }

    pub fn is_active(&self, marker: &EffectMarker) -> bool {
        self.active.iter().any(|effect| &effect.marker == marker)
    }

    pub fn flip_locked(&self) -> bool {
        self.flip_lock
    }

    /// Removes every effect whose lifetime ended at or before `now_ms`.
    pub fn sweep(&mut self, now_ms: u64, host: &mut dyn EffectHost) -> usize {
        let before = self.active.len();
        let mut released_lock = false;
        self.active.retain(|effect| {
            if effect.expires_at_ms > now_ms {
                return true;
            }
            if matches!(effect.marker, EffectMarker::LabelSwap { .. }) {
                released_lock = true;
            }
            host.remove(&effect.marker);
            false
        });
        if released_lock {
            self.flip_lock = false;
        }
        before - self.active.len()
    }

    /// Fires the effect bundle.
    ///
    /// Shake and strobe are single markers whose lifetime is extended while
    /// triggers keep arriving. Floating words are capped. The label swap is
    /// skipped entirely while the flip lock is held.
    pub fn trigger(
        &mut self,
        now_ms: u64,
        config: &VisualizerConfig,
        host: &mut dyn EffectHost,
    ) -> Triggered {
        let mut fired = Triggered {
            shake: self.arm_or_extend(EffectMarker::Shake, now_ms + config.shake_ms, host),
            strobe: self.arm_or_extend(EffectMarker::Strobe, now_ms + config.strobe_ms, host),
            ..Triggered::default()
        };

        if self.floating_count() < config.max_floating_texts && !config.floating_words.is_empty() {
            let text = config.floating_words[self.word_cursor % config.floating_words.len()].clone();
            self.word_cursor = self.word_cursor.wrapping_add(1);
            self.next_id += 1;
            let marker = EffectMarker::FloatingText {
                id: self.next_id,
                text,
            };
            host.show(&marker);
            self.active.push(ActiveEffect {
                marker,
                expires_at_ms: now_ms + config.floating_text_ms,
            });
            fired.floating_text = true;
        }

        if !self.flip_lock {
            let marker = EffectMarker::LabelSwap {
                text: config.label_swap_text.clone(),
            };
            host.show(&marker);
            self.active.push(ActiveEffect {
                marker,
                expires_at_ms: now_ms + config.label_swap_ms,
            });
            self.flip_lock = true;
            fired.label_swap = true;
        }

        fired
    }

    /// Removes every marker immediately.
    pub fn clear(&mut self, host: &mut dyn EffectHost) {
        for effect in self.active.drain(..) {
            host.remove(&effect.marker);
        }
        self.flip_lock = false;
    }

    fn arm_or_extend(
        &mut self,
        marker: EffectMarker,
        expires_at_ms: u64,
        host: &mut dyn EffectHost,
    ) -> bool {
        if let Some(existing) = self.active.iter_mut().find(|e| e.marker == marker) {
            existing.expires_at_ms = existing.expires_at_ms.max(expires_at_ms);
            return false;
        }
        host.show(&marker);
        self.active.push(ActiveEffect {
            marker,
            expires_at_ms,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::RecordingEffectHost;

    #[test]
    fn effects_expire_on_sweep() {
        let config = VisualizerConfig::default();
        let mut ring = EffectRing::new();
        let mut host = RecordingEffectHost::default();

        let fired = ring.trigger(0, &config, &mut host);
        assert!(fired.shake && fired.strobe && fired.floating_text && fired.label_swap);
        assert_eq!(host.visible().len(), 4);

        assert_eq!(ring.sweep(config.strobe_ms, &mut host), 1);
        assert!(!ring.is_active(&EffectMarker::Strobe));

        ring.sweep(10_000, &mut host);
        assert_eq!(ring.active_count(), 0);
        assert!(host.visible().is_empty());
        assert!(!ring.flip_locked());
    }

    #[test]
    fn sustained_triggers_stay_bounded() {
        let config = VisualizerConfig::default();
        let mut ring = EffectRing::new();
        let mut host = RecordingEffectHost::default();

        for frame in 0..500u64 {
            let now = frame * 16;
            ring.sweep(now, &mut host);
            ring.trigger(now, &config, &mut host);
            assert!(ring.floating_count() <= config.max_floating_texts);
            assert!(ring.active_count() <= config.max_floating_texts + 3);
        }
        assert_eq!(host.visible().len(), ring.active_count());
    }

    #[test]
    fn flip_lock_blocks_rearming() {
        let config = VisualizerConfig::default();
        let mut ring = EffectRing::new();
        let mut host = RecordingEffectHost::default();

        assert!(ring.trigger(0, &config, &mut host).label_swap);
        assert!(ring.flip_locked());
        assert!(!ring.trigger(100, &config, &mut host).label_swap);

        ring.sweep(config.label_swap_ms, &mut host);
        assert!(!ring.flip_locked());
        assert!(ring.trigger(config.label_swap_ms, &config, &mut host).label_swap);
        assert_eq!(host.shown_count(|m| matches!(m, EffectMarker::LabelSwap { .. })), 2);
    }

    #[test]
    fn shake_is_extended_not_duplicated() {
        let config = VisualizerConfig::default();
        let mut ring = EffectRing::new();
        let mut host = RecordingEffectHost::default();

        ring.trigger(0, &config, &mut host);
        assert!(!ring.trigger(200, &config, &mut host).shake);
        ring.sweep(config.shake_ms, &mut host);
        assert!(ring.is_active(&EffectMarker::Shake));
        ring.sweep(200 + config.shake_ms, &mut host);
        assert!(!ring.is_active(&EffectMarker::Shake));
    }

    #[test]
    fn clear_removes_everything() {
        let config = VisualizerConfig::default();
        let mut ring = EffectRing::new();
        let mut host = RecordingEffectHost::default();
        ring.trigger(0, &config, &mut host);

        ring.clear(&mut host);
        assert_eq!(ring.active_count(), 0);
        assert!(host.visible().is_empty());
        assert!(!ring.flip_locked());
    }
}
