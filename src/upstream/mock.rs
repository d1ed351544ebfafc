use crate::error::AppError;
use crate::route::{GeoPoint, RawRoute};
use crate::upstream::{Geocoder, RouteProvider};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
pub enum MockRouteBehavior {
    Route(RawRoute),
    NotFound,
    Unavailable,
}

impl MockRouteBehavior {
    fn into_result(self) -> Result<RawRoute, AppError> {
        match self {
            MockRouteBehavior::Route(route) => Ok(route),
            MockRouteBehavior::NotFound => Err(AppError::NotFound("mock route not found".to_string())),
            MockRouteBehavior::Unavailable => Err(AppError::UpstreamUnavailable(
                "mock routing service unavailable".to_string(),
            )),
        }
    }
}

/// Plays back scripted behaviors, one per call; the last one repeats.
#[derive(Debug)]
pub struct MockRouteProvider {
    behaviors: Mutex<VecDeque<MockRouteBehavior>>,
    calls: AtomicUsize,
}

impl MockRouteProvider {
    pub fn new(behaviors: Vec<MockRouteBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_route(route: RawRoute) -> Self {
        Self::new(vec![MockRouteBehavior::Route(route)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_behavior(&self) -> Result<MockRouteBehavior, AppError> {
        let mut behaviors = self.behaviors.lock().map_err(|_| AppError::StateLock)?;
        let behavior = if behaviors.len() > 1 {
            behaviors.pop_front()
        } else {
            behaviors.front().cloned()
        };
        Ok(behavior.unwrap_or(MockRouteBehavior::Unavailable))
    }
}

#[async_trait]
impl RouteProvider for MockRouteProvider {
    async fn fetch_route(
        &self,
        _origin: GeoPoint,
        _destination: GeoPoint,
    ) -> Result<RawRoute, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next_behavior()?.into_result()
    }
}

/// Resolves queries from a fixed table keyed by the exact query text,
/// then from the fallback point if one is set.
#[derive(Debug, Default)]
pub struct MockGeocoder {
    places: HashMap<String, GeoPoint>,
    fallback: Option<GeoPoint>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, query: &str, point: GeoPoint) -> Self {
        self.places.insert(query.to_string(), point);
        self
    }

    pub fn with_fallback(mut self, point: GeoPoint) -> Self {
        self.fallback = Some(point);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, query: &str) -> Result<GeoPoint, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.places
            .get(query)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| AppError::NotFound(format!("address not found: {query}")))
    }
}
