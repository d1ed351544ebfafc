use crate::route::{DelayReason, Instruction, RouteResult, SignalHit};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RouteSuccessResponse {
    /// `[lat, lng]` pairs in driving order
    pub geometry: Vec<[f64; 2]>,
    /// Adjusted duration in whole seconds
    pub duration: f64,
    pub distance: f64,
    pub signals_hit: Vec<SignalHitResponse>,
    pub instructions: Vec<InstructionResponse>,
    pub departure: String,
}

impl RouteSuccessResponse {
    pub fn from_result(result: RouteResult, departure: String) -> Self {
        Self {
            geometry: result.geometry.iter().map(|point| point.lat_lng()).collect(),
            duration: result.duration_sec.round(),
            distance: result.distance_meters,
            signals_hit: result.signal_hits.iter().map(SignalHitResponse::from).collect(),
            instructions: result
                .instructions
                .iter()
                .map(InstructionResponse::from)
                .collect(),
            departure,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SignalHitResponse {
    pub lat: f64,
    pub lng: f64,
    /// Seconds
    pub wait: f64,
    pub reason: DelayReason,
}

impl From<&SignalHit> for SignalHitResponse {
    fn from(hit: &SignalHit) -> Self {
        Self {
            lat: hit.lat,
            lng: hit.lng,
            wait: hit.wait_sec,
            reason: hit.reason,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct InstructionResponse {
    pub text: String,
    /// Meters
    pub distance: f64,
}

impl From<&Instruction> for InstructionResponse {
    fn from(instruction: &Instruction) -> Self {
        Self {
            text: instruction.text.clone(),
            distance: instruction.distance_meters,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GeocodeSuccessResponse {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub signal_count: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    UpstreamUnavailable,
    InternalError,
}
