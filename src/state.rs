use crate::route::GeoPoint;
use crate::signal::Signal;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;

pub const DEFAULT_GEOCODE_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(1000).unwrap();

/// Snapshot of the signal catalog as last loaded from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    pub signals: Arc<Vec<Signal>>,
    pub loaded_at: Option<SystemTime>,
}

impl CatalogSnapshot {
    fn empty() -> Self {
        Self {
            signals: Arc::new(Vec::new()),
            loaded_at: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }
}

#[derive(Debug)]
pub struct AppState {
    catalog: CatalogSnapshot,
    catalog_tx: watch::Sender<CatalogSnapshot>,
    geocode_cache: LruCache<String, GeoPoint>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_geocode_capacity(DEFAULT_GEOCODE_CACHE_CAPACITY)
    }

    pub fn with_geocode_capacity(capacity: NonZeroUsize) -> Self {
        let (catalog_tx, _catalog_rx) = watch::channel(CatalogSnapshot::empty());
        Self {
            catalog: CatalogSnapshot::empty(),
            catalog_tx,
            geocode_cache: LruCache::new(capacity),
        }
    }

    pub fn catalog(&self) -> &CatalogSnapshot {
        &self.catalog
    }

    /// Cheap handle on the current signals; callers keep it past the lock.
    pub fn signals(&self) -> Arc<Vec<Signal>> {
        Arc::clone(&self.catalog.signals)
    }

    pub fn subscribe_catalog(&self) -> watch::Receiver<CatalogSnapshot> {
        self.catalog_tx.subscribe()
    }

    pub fn set_signals(&mut self, signals: Vec<Signal>, loaded_at: SystemTime) {
        let snapshot = CatalogSnapshot {
            signals: Arc::new(signals),
            loaded_at: Some(loaded_at),
        };
        self.catalog = snapshot.clone();
        self.catalog_tx.send_replace(snapshot);
    }

    /// A hit marks the entry as most recently used.
    pub fn cached_location(&mut self, normalized_query: &str) -> Option<GeoPoint> {
        self.geocode_cache.get(normalized_query).copied()
    }

    /// Evicts the least recently used entry once the cache is full.
    pub fn cache_location(&mut self, normalized_query: String, point: GeoPoint) {
        self.geocode_cache.put(normalized_query, point);
    }

    pub fn geocode_cache_len(&self) -> usize {
        self.geocode_cache.len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
