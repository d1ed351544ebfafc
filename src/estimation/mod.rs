use crate::route::{DelayReason, RawRoute, RouteResult, SignalHit};
use crate::signal::{DEFAULT_MATCH_TOLERANCE_DEG, LinearScan, Signal, SignalLookup};
use time::{Duration, OffsetDateTime, UtcOffset};
use tracing::debug;

pub mod pedestrian;
pub mod signal_phase;

use pedestrian::{PedestrianDelayModel, RandomSource};
use signal_phase::signal_delay;

/// Elapsed travel time charged per geometry point, whatever its spacing.
pub const SECONDS_PER_GEOMETRY_POINT: i64 = 1;

/// Walks a route's geometry, predicts the delay at every matched signal and
/// builds the adjusted result.
#[derive(Debug, Clone)]
pub struct RouteDelayAggregator {
    pedestrians: PedestrianDelayModel,
    local_offset: UtcOffset,
}

impl Default for RouteDelayAggregator {
    fn default() -> Self {
        Self::new(PedestrianDelayModel::default(), UtcOffset::UTC)
    }
}

impl RouteDelayAggregator {
    /// `local_offset` is the zone signal plans and busy hours are written in.
    pub fn new(pedestrians: PedestrianDelayModel, local_offset: UtcOffset) -> Self {
        Self {
            pedestrians,
            local_offset,
        }
    }

    pub fn pedestrians(&self) -> &PedestrianDelayModel {
        &self.pedestrians
    }

    pub fn local_offset(&self) -> UtcOffset {
        self.local_offset
    }

    pub fn augment(
        &self,
        route: &RawRoute,
        lookup: &dyn SignalLookup,
        departure: OffsetDateTime,
        rng: &mut dyn RandomSource,
    ) -> RouteResult {
        let departure = departure.to_offset(self.local_offset);
        let mut signal_hits = Vec::new();
        let mut total_delay_sec = 0.0;
        let mut elapsed_sec: i64 = 0;

        for point in &route.geometry {
            if let Some(signal) = lookup.find(*point) {
                let arrival = departure.saturating_add(Duration::seconds(elapsed_sec));
                let signal_wait = signal_delay(signal.primary_phase(), arrival.time());
                let pedestrian_wait = self.pedestrians.delay(arrival.hour(), rng);
                let node_delay = signal_wait + pedestrian_wait;

                if node_delay > 0.0 {
                    signal_hits.push(SignalHit {
                        lat: signal.lat,
                        lng: signal.lng,
                        wait_sec: node_delay,
                        reason: if signal_wait > 0.0 {
                            DelayReason::RedLight
                        } else {
                            DelayReason::Pedestrians
                        },
                    });
                    total_delay_sec += node_delay;
                }
            }
            elapsed_sec += SECONDS_PER_GEOMETRY_POINT;
        }

        debug!(
            points = route.geometry.len(),
            signals = lookup.len(),
            hits = signal_hits.len(),
            delay_sec = total_delay_sec,
            "Route delay estimated"
        );

        RouteResult {
            geometry: route.geometry.clone(),
            duration_sec: route.duration_sec + total_delay_sec,
            distance_meters: route.distance_meters,
            signal_hits,
            instructions: route.instructions(),
        }
    }
}

/// Augments `route` against `signals` with the default delay models and a
/// linear scan at the default match tolerance.
pub fn augment_route(
    route: &RawRoute,
    signals: &[Signal],
    departure: OffsetDateTime,
    rng: &mut dyn RandomSource,
) -> RouteResult {
    let lookup = LinearScan::new(signals, DEFAULT_MATCH_TOLERANCE_DEG);
    RouteDelayAggregator::default().augment(route, &lookup, departure, rng)
}
