use std::time::Instant;

/// Source of frame timestamps in milliseconds, like the value an animation
/// frame callback receives.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Virtual clock advanced by hand. Used by tests and headless runs so effect
/// lifetimes never depend on wall-clock waits.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_ms: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.now_ms = 0;
    }

    pub fn advance(&mut self, delta_ms: u64) -> u64 {
        self.now_ms = self.now_ms.saturating_add(delta_ms);
        self.now_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
