use crate::error::AppError;
use crate::estimation::RouteDelayAggregator;
use crate::estimation::pedestrian::RandomSource;
use crate::route::{GeoPoint, RawRoute, RouteResult};
use crate::signal::{DEFAULT_MATCH_TOLERANCE_DEG, LookupKind, Signal, create_lookup};
use crate::state::AppState;
use crate::upstream::{Geocoder, RouteProvider};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// One initial call plus a single best-effort retry.
pub const ROUTE_FETCH_ATTEMPTS: usize = 2;

#[derive(Debug)]
pub struct RouteEstimationService {
    routes: Arc<dyn RouteProvider>,
    geocoder: Arc<dyn Geocoder>,
    aggregator: RouteDelayAggregator,
    lookup_kind: LookupKind,
    match_tolerance_deg: f64,
    rng_seed: Option<u64>,
}

impl RouteEstimationService {
    pub fn new(
        routes: Arc<dyn RouteProvider>,
        geocoder: Arc<dyn Geocoder>,
        aggregator: RouteDelayAggregator,
    ) -> Self {
        Self {
            routes,
            geocoder,
            aggregator,
            lookup_kind: LookupKind::default(),
            match_tolerance_deg: DEFAULT_MATCH_TOLERANCE_DEG,
            rng_seed: None,
        }
    }

    pub fn with_lookup(mut self, kind: LookupKind, match_tolerance_deg: f64) -> Self {
        self.lookup_kind = kind;
        self.match_tolerance_deg = match_tolerance_deg;
        self
    }

    /// A fixed seed makes every request draw the same pedestrian samples.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn random_source(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    pub async fn fetch_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<RawRoute, AppError> {
        let mut attempt = 1;
        loop {
            match self.routes.fetch_route(origin, destination).await {
                Ok(route) => return Ok(route),
                Err(err) if err.is_retryable() && attempt < ROUTE_FETCH_ATTEMPTS => {
                    warn!(error = %err, attempt, "Route fetch failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn augment(
        &self,
        route: &RawRoute,
        signals: &[Signal],
        departure: OffsetDateTime,
        rng: &mut dyn RandomSource,
    ) -> RouteResult {
        if signals.is_empty() {
            warn!("Signal catalog empty, estimating without signal delays");
        }
        let lookup = create_lookup(self.lookup_kind, signals, self.match_tolerance_deg);
        self.aggregator
            .augment(route, lookup.as_ref(), departure, rng)
    }

    pub async fn estimate(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        signals: &[Signal],
        departure: OffsetDateTime,
        rng: &mut dyn RandomSource,
    ) -> Result<RouteResult, AppError> {
        let route = self.fetch_route(origin, destination).await?;
        let result = self.augment(&route, signals, departure, rng);
        info!(
            raw_duration_sec = route.duration_sec,
            adjusted_duration_sec = result.duration_sec,
            hits = result.signal_hits.len(),
            "Route estimated"
        );
        Ok(result)
    }

    /// Resolves `query`, answering repeat queries from the shared cache.
    pub async fn geocode(
        &self,
        state: &Arc<RwLock<AppState>>,
        query: &str,
    ) -> Result<GeoPoint, AppError> {
        let key = normalize_query(query);
        if key.is_empty() {
            return Err(AppError::InvalidInput("empty geocode query".to_string()));
        }

        let cached = {
            let mut guard = state.write().map_err(|_| AppError::StateLock)?;
            guard.cached_location(&key)
        };
        if let Some(point) = cached {
            debug!(query = %key, "Geocode cache hit");
            return Ok(point);
        }

        info!(query = %key, "Geocode cache miss, asking upstream");
        let point = self.geocoder.geocode(query.trim()).await?;

        let mut guard = state.write().map_err(|_| AppError::StateLock)?;
        guard.cache_location(key, point);
        Ok(point)
    }
}

/// Cache key for a free-text place query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::pedestrian::{FixedRandom, PedestrianDelayModel};
    use crate::route::DelayReason;
    use crate::signal::SignalPhase;
    use crate::upstream::mock::{MockGeocoder, MockRouteBehavior, MockRouteProvider};
    use std::num::NonZeroUsize;
    use time::UtcOffset;
    use time::macros::datetime;

    fn route() -> RawRoute {
        RawRoute {
            duration_sec: 120.0,
            distance_meters: 900.0,
            geometry: vec![
                GeoPoint::new(30.0, -97.0),
                GeoPoint::new(30.001, -97.0),
            ],
            legs: Vec::new(),
        }
    }

    fn service_with(
        routes: Arc<MockRouteProvider>,
        geocoder: Arc<MockGeocoder>,
    ) -> RouteEstimationService {
        RouteEstimationService::new(
            routes,
            geocoder,
            RouteDelayAggregator::new(PedestrianDelayModel::disabled(), UtcOffset::UTC),
        )
    }

    #[tokio::test]
    async fn retries_once_after_upstream_failure() -> Result<(), AppError> {
        let routes = Arc::new(MockRouteProvider::new(vec![
            MockRouteBehavior::Unavailable,
            MockRouteBehavior::Route(route()),
        ]));
        let service = service_with(Arc::clone(&routes), Arc::new(MockGeocoder::new()));

        let fetched = service
            .fetch_route(GeoPoint::new(30.0, -97.0), GeoPoint::new(30.001, -97.0))
            .await?;

        assert_eq!(fetched, route());
        assert_eq!(routes.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_after_second_upstream_failure() {
        let routes = Arc::new(MockRouteProvider::new(vec![MockRouteBehavior::Unavailable]));
        let service = service_with(Arc::clone(&routes), Arc::new(MockGeocoder::new()));

        let result = service
            .fetch_route(GeoPoint::new(30.0, -97.0), GeoPoint::new(30.001, -97.0))
            .await;

        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
        assert_eq!(routes.calls(), ROUTE_FETCH_ATTEMPTS);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let routes = Arc::new(MockRouteProvider::new(vec![MockRouteBehavior::NotFound]));
        let service = service_with(Arc::clone(&routes), Arc::new(MockGeocoder::new()));

        let result = service
            .fetch_route(GeoPoint::new(30.0, -97.0), GeoPoint::new(30.001, -97.0))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(routes.calls(), 1);
    }

    #[tokio::test]
    async fn estimate_applies_grid_lookup_delays() -> Result<(), AppError> {
        let routes = Arc::new(MockRouteProvider::with_route(route()));
        let service = service_with(routes, Arc::new(MockGeocoder::new()))
            .with_lookup(LookupKind::Grid, DEFAULT_MATCH_TOLERANCE_DEG);
        let signals = vec![Signal {
            id: 9,
            lat: 30.001,
            lng: -97.0,
            phases: vec![SignalPhase {
                offset_sec: 0,
                cycle_length_sec: 90,
                green_duration_sec: 45,
            }],
        }];

        // Index 1 is reached at second 61: red with 29 s left.
        let result = service
            .estimate(
                GeoPoint::new(30.0, -97.0),
                GeoPoint::new(30.001, -97.0),
                &signals,
                datetime!(2026-03-02 00:01:00 UTC),
                &mut FixedRandom(0.0),
            )
            .await?;

        assert_eq!(result.signal_hits.len(), 1);
        assert_eq!(result.signal_hits[0].reason, DelayReason::RedLight);
        assert_eq!(result.duration_sec, 149.0);
        Ok(())
    }

    #[tokio::test]
    async fn geocode_serves_repeat_queries_from_cache() -> Result<(), AppError> {
        let geocoder = Arc::new(
            MockGeocoder::new().with_place("Zilker Park", GeoPoint::new(30.2669, -97.7729)),
        );
        let service = service_with(
            Arc::new(MockRouteProvider::with_route(route())),
            Arc::clone(&geocoder),
        );
        let state = Arc::new(RwLock::new(AppState::new()));

        let first = service.geocode(&state, "  Zilker Park ").await?;
        let second = service.geocode(&state, "zilker park").await?;

        assert_eq!(first, second);
        assert_eq!(geocoder.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn geocode_misses_are_not_cached() -> Result<(), Box<dyn std::error::Error>> {
        let geocoder = Arc::new(MockGeocoder::new());
        let service = service_with(
            Arc::new(MockRouteProvider::with_route(route())),
            Arc::clone(&geocoder),
        );
        let state = Arc::new(RwLock::new(AppState::new()));

        let first = service.geocode(&state, "Atlantis").await;
        let second = service.geocode(&state, "Atlantis").await;

        assert!(matches!(first, Err(AppError::NotFound(_))));
        assert!(matches!(second, Err(AppError::NotFound(_))));
        assert_eq!(geocoder.calls(), 2);
        let guard = state.read().map_err(|_| AppError::StateLock)?;
        assert_eq!(guard.geocode_cache_len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn geocode_cache_stays_within_capacity() -> Result<(), Box<dyn std::error::Error>> {
        let geocoder = Arc::new(MockGeocoder::new().with_fallback(GeoPoint::new(30.0, -97.0)));
        let service = service_with(
            Arc::new(MockRouteProvider::with_route(route())),
            Arc::clone(&geocoder),
        );
        let capacity = NonZeroUsize::new(100).ok_or("zero capacity")?;
        let state = Arc::new(RwLock::new(AppState::with_geocode_capacity(capacity)));

        for i in 0..500 {
            service.geocode(&state, &format!("place {i}")).await?;
        }
        // The oldest query was evicted and goes back upstream.
        service.geocode(&state, "place 0").await?;

        assert_eq!(geocoder.calls(), 501);
        let guard = state.read().map_err(|_| AppError::StateLock)?;
        assert_eq!(guard.geocode_cache_len(), 100);
        Ok(())
    }

    #[tokio::test]
    async fn blank_geocode_query_is_invalid() {
        let geocoder = Arc::new(MockGeocoder::new());
        let service = service_with(
            Arc::new(MockRouteProvider::with_route(route())),
            Arc::clone(&geocoder),
        );
        let state = Arc::new(RwLock::new(AppState::new()));

        let result = service.geocode(&state, "   ").await;

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(geocoder.calls(), 0);
    }

    #[test]
    fn seeded_services_draw_identical_samples() {
        let service = service_with(
            Arc::new(MockRouteProvider::with_route(route())),
            Arc::new(MockGeocoder::new()),
        )
        .with_seed(Some(42));

        let mut first = service.random_source();
        let mut second = service.random_source();

        for _ in 0..10 {
            assert_eq!(first.next_unit(), second.next_unit());
        }
    }

    #[test]
    fn normalize_query_trims_and_lowercases() {
        assert_eq!(normalize_query("  Zilker PARK\t"), "zilker park");
    }
}
