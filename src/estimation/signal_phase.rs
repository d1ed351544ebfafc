//! Fixed-time signal phase arithmetic.
//!
//! A phase repeats every `cycle_length_sec`, starting `offset_sec` after
//! midnight, and is green for the first `green_duration_sec` of each cycle.

use crate::signal::SignalPhase;
use time::Time;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseState {
    Green,
    Red { remaining_sec: f64 },
}

impl PhaseState {
    pub fn wait_sec(self) -> f64 {
        match self {
            PhaseState::Green => 0.0,
            PhaseState::Red { remaining_sec } => remaining_sec,
        }
    }
}

pub fn seconds_since_midnight(time: Time) -> i64 {
    let (hour, minute, second) = time.as_hms();
    i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second)
}

/// Position within the cycle, always in `[0, cycle_length_sec)` even when
/// the arrival precedes the offset.
pub fn cycle_position(phase: SignalPhase, seconds: i64) -> i64 {
    let phase = phase.normalized();
    let cycle = phase.cycle_length_sec;
    // Both operands reduced first so extreme offsets cannot overflow.
    (seconds.rem_euclid(cycle) - phase.offset_sec.rem_euclid(cycle)).rem_euclid(cycle)
}

/// Red once past the green window; landing exactly on its end counts as green.
pub fn phase_state(phase: SignalPhase, arrival: Time) -> PhaseState {
    let phase = phase.normalized();
    let position = cycle_position(phase, seconds_since_midnight(arrival));
    if position > phase.green_duration_sec {
        PhaseState::Red {
            remaining_sec: (phase.cycle_length_sec - position) as f64,
        }
    } else {
        PhaseState::Green
    }
}

pub fn signal_delay(phase: SignalPhase, arrival: Time) -> f64 {
    phase_state(phase, arrival).wait_sec()
}
