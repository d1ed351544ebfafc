use crate::route::GeoPoint;
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod grid;

pub type SignalId = u64;

pub const DEFAULT_CYCLE_LENGTH_SEC: i64 = 90;
pub const DEFAULT_GREEN_DURATION_SEC: i64 = 45;
pub const DEFAULT_OFFSET_SEC: i64 = 0;
/// Roughly 20 meters at mid latitudes.
pub const DEFAULT_MATCH_TOLERANCE_DEG: f64 = 0.0002;

fn default_cycle_length() -> i64 {
    DEFAULT_CYCLE_LENGTH_SEC
}

fn default_green_duration() -> i64 {
    DEFAULT_GREEN_DURATION_SEC
}

/// Fixed-time plan of one signal phase, relative to midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPhase {
    #[serde(default)]
    pub offset_sec: i64,
    #[serde(default = "default_cycle_length")]
    pub cycle_length_sec: i64,
    #[serde(default = "default_green_duration")]
    pub green_duration_sec: i64,
}

impl Default for SignalPhase {
    fn default() -> Self {
        Self {
            offset_sec: DEFAULT_OFFSET_SEC,
            cycle_length_sec: DEFAULT_CYCLE_LENGTH_SEC,
            green_duration_sec: DEFAULT_GREEN_DURATION_SEC,
        }
    }
}

impl SignalPhase {
    /// Builds a phase from optional catalog columns, filling gaps with defaults.
    pub fn from_parts(
        offset_sec: Option<i64>,
        cycle_length_sec: Option<i64>,
        green_duration_sec: Option<i64>,
    ) -> Self {
        Self {
            offset_sec: offset_sec.unwrap_or(DEFAULT_OFFSET_SEC),
            cycle_length_sec: cycle_length_sec.unwrap_or(DEFAULT_CYCLE_LENGTH_SEC),
            green_duration_sec: green_duration_sec.unwrap_or(DEFAULT_GREEN_DURATION_SEC),
        }
        .normalized()
    }

    /// Zero or negative durations carry no timing information and fall back
    /// to the defaults. A cycle length is therefore always positive.
    pub fn normalized(self) -> Self {
        Self {
            offset_sec: self.offset_sec,
            cycle_length_sec: if self.cycle_length_sec > 0 {
                self.cycle_length_sec
            } else {
                DEFAULT_CYCLE_LENGTH_SEC
            },
            green_duration_sec: if self.green_duration_sec > 0 {
                self.green_duration_sec
            } else {
                DEFAULT_GREEN_DURATION_SEC
            },
        }
    }
}

/// A signalized intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub phases: Vec<SignalPhase>,
}

impl Signal {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    /// Only the first phase is modelled; signals without one use the defaults.
    pub fn primary_phase(&self) -> SignalPhase {
        self.phases
            .first()
            .copied()
            .unwrap_or_default()
            .normalized()
    }

    /// Per-axis degree box test, not a great-circle distance.
    pub fn is_near(&self, point: GeoPoint, tolerance_deg: f64) -> bool {
        (self.lat - point.lat).abs() < tolerance_deg && (self.lng - point.lng).abs() < tolerance_deg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    #[default]
    Linear,
    Grid,
}

/// Finds the signal a geometry point passes through.
///
/// Implementations must return the first matching signal in catalog order so
/// that swapping one lookup for another never changes route output.
pub trait SignalLookup: Send + Sync + std::fmt::Debug {
    fn find(&self, point: GeoPoint) -> Option<&Signal>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reference lookup: scans the whole catalog for every point.
#[derive(Debug, Clone, Copy)]
pub struct LinearScan<'a> {
    signals: &'a [Signal],
    tolerance_deg: f64,
}

impl<'a> LinearScan<'a> {
    pub fn new(signals: &'a [Signal], tolerance_deg: f64) -> Self {
        Self {
            signals,
            tolerance_deg: effective_tolerance(tolerance_deg),
        }
    }
}

/// Non-positive or non-finite tolerances fall back to the default. Every
/// lookup goes through this so they all match the same points.
pub fn effective_tolerance(tolerance_deg: f64) -> f64 {
    if tolerance_deg.is_finite() && tolerance_deg > 0.0 {
        tolerance_deg
    } else {
        DEFAULT_MATCH_TOLERANCE_DEG
    }
}

impl SignalLookup for LinearScan<'_> {
    fn find(&self, point: GeoPoint) -> Option<&Signal> {
        self.signals
            .iter()
            .find(|signal| signal.is_near(point, self.tolerance_deg))
    }

    fn len(&self) -> usize {
        self.signals.len()
    }
}

pub fn create_lookup<'a>(
    kind: LookupKind,
    signals: &'a [Signal],
    tolerance_deg: f64,
) -> Box<dyn SignalLookup + 'a> {
    match kind {
        LookupKind::Linear => Box::new(LinearScan::new(signals, tolerance_deg)),
        LookupKind::Grid => Box::new(grid::GridIndex::new(signals, tolerance_deg)),
    }
}
