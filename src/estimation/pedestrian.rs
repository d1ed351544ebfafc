//! Pedestrian-crossing friction during busy hours.

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CROSSING_PROBABILITY: f64 = 0.3;
pub const DEFAULT_PENALTY_SEC: f64 = 15.0;

/// Source of uniform samples in `[0, 1)`.
///
/// Passed into every estimate so tests can pin the outcome and production
/// can plug in a real generator.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

impl RandomSource for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}

/// Always yields the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// Replays samples in order, then repeats the last one. Counts draws.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<f64>,
    draws: usize,
}

impl SequenceRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, draws: 0 }
    }

    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl RandomSource for SequenceRandom {
    fn next_unit(&mut self) -> f64 {
        let value = self
            .values
            .get(self.draws)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(0.0);
        self.draws += 1;
        value
    }
}

/// Inclusive range of local hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl BusyWindow {
    pub const fn new(start_hour: u8, end_hour: u8) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u8) -> bool {
        hour >= self.start_hour && hour <= self.end_hour
    }
}

pub const DEFAULT_BUSY_WINDOWS: [BusyWindow; 2] = [BusyWindow::new(12, 13), BusyWindow::new(17, 19)];

#[derive(Debug, Clone, PartialEq)]
pub struct PedestrianDelayModel {
    busy_windows: Vec<BusyWindow>,
    crossing_probability: f64,
    penalty_sec: f64,
}

impl Default for PedestrianDelayModel {
    fn default() -> Self {
        Self::new(
            DEFAULT_BUSY_WINDOWS.to_vec(),
            DEFAULT_CROSSING_PROBABILITY,
            DEFAULT_PENALTY_SEC,
        )
    }
}

impl PedestrianDelayModel {
    pub fn new(busy_windows: Vec<BusyWindow>, crossing_probability: f64, penalty_sec: f64) -> Self {
        Self {
            busy_windows,
            crossing_probability: crossing_probability.clamp(0.0, 1.0),
            penalty_sec: penalty_sec.max(0.0),
        }
    }

    /// Model that never adds delay.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), 0.0, 0.0)
    }

    pub fn busy_windows(&self) -> &[BusyWindow] {
        &self.busy_windows
    }

    pub fn is_busy_hour(&self, hour: u8) -> bool {
        self.busy_windows.iter().any(|window| window.contains(hour))
    }

    /// Outside busy windows the random source is left untouched.
    pub fn delay(&self, hour: u8, rng: &mut dyn RandomSource) -> f64 {
        if !self.is_busy_hour(hour) {
            return 0.0;
        }
        if rng.next_unit() < self.crossing_probability {
            self.penalty_sec
        } else {
            0.0
        }
    }
}
