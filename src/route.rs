use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Parses a `"lng,lat"` pair, the order used by routing query strings.
    pub fn parse_lng_lat(text: &str) -> Result<Self, AppError> {
        let mut parts = text.split(',').map(str::trim);
        let (Some(lng), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AppError::InvalidInput(format!(
                "expected \"lng,lat\", got {text:?}"
            )));
        };
        let lng: f64 = lng
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("invalid longitude: {lng:?}")))?;
        let lat: f64 = lat
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("invalid latitude: {lat:?}")))?;
        Self::new(lat, lng).validated()
    }

    pub fn validated(self) -> Result<Self, AppError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::InvalidInput(format!(
                "latitude out of range: {}",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::InvalidInput(format!(
                "longitude out of range: {}",
                self.lng
            )));
        }
        Ok(self)
    }

    /// `[lat, lng]` pair for map display.
    pub fn lat_lng(self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub maneuver_type: String,
    pub maneuver_modifier: Option<String>,
    pub street_name: String,
    pub distance_meters: f64,
}

impl Step {
    pub fn instruction_text(&self) -> String {
        match self.maneuver_modifier.as_deref() {
            Some(modifier) if !modifier.is_empty() => format!(
                "{} {} on {}",
                self.maneuver_type, modifier, self.street_name
            ),
            _ => format!("{} on {}", self.maneuver_type, self.street_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Leg {
    pub steps: Vec<Step>,
}

/// Driving route as returned by the routing collaborator, before any delay
/// estimation. Geometry is in driving order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRoute {
    pub duration_sec: f64,
    pub distance_meters: f64,
    pub geometry: Vec<GeoPoint>,
    pub legs: Vec<Leg>,
}

impl RawRoute {
    pub fn instructions(&self) -> Vec<Instruction> {
        self.legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(|step| Instruction {
                text: step.instruction_text(),
                distance_meters: step.distance_meters,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub text: String,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayReason {
    #[serde(rename = "Red Light")]
    RedLight,
    Pedestrians,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalHit {
    pub lat: f64,
    pub lng: f64,
    pub wait_sec: f64,
    pub reason: DelayReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    pub geometry: Vec<GeoPoint>,
    /// Raw duration plus every node delay, unrounded.
    pub duration_sec: f64,
    pub distance_meters: f64,
    pub signal_hits: Vec<SignalHit>,
    pub instructions: Vec<Instruction>,
}

impl RouteResult {
    pub fn total_delay_sec(&self) -> f64 {
        self.signal_hits.iter().map(|hit| hit.wait_sec).sum()
    }
}
