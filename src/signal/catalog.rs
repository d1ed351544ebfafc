//! Signal catalog store backed by a JSON seed file.
//!
//! The seed keeps intersections and their phases in two flat tables joined
//! by `intersection_id`:
//!
//! ```json
//! {
//!   "intersections": [{ "id": 1, "lat": 30.2672, "lng": -97.7431 }],
//!   "phases": [{ "intersection_id": 1, "offset_sec": 12, "cycle_length_sec": 90, "green_duration_sec": 45 }]
//! }
//! ```

use crate::error::AppError;
use crate::signal::{Signal, SignalId, SignalPhase};
use crate::state::AppState;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read signal catalog: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse signal catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

pub trait SignalCatalog: Send + Sync + fmt::Debug {
    fn list_signals(&self) -> Result<Vec<Signal>, CatalogError>;
}

#[derive(Debug, Clone)]
pub struct JsonSignalCatalog {
    path: PathBuf,
}

impl JsonSignalCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalCatalog for JsonSignalCatalog {
    fn list_signals(&self) -> Result<Vec<Signal>, CatalogError> {
        let contents = std::fs::read_to_string(&self.path)?;
        parse_seed(&contents)
    }
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    intersections: Vec<SeedIntersection>,
    #[serde(default)]
    phases: Vec<SeedPhase>,
}

#[derive(Debug, Deserialize)]
struct SeedIntersection {
    id: SignalId,
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct SeedPhase {
    intersection_id: SignalId,
    offset_sec: Option<i64>,
    cycle_length_sec: Option<i64>,
    green_duration_sec: Option<i64>,
}

/// Joins seed phases onto their intersections, keeping file order for both.
pub fn parse_seed(contents: &str) -> Result<Vec<Signal>, CatalogError> {
    let seed: SeedFile = serde_json::from_str(contents)?;

    let mut signals: Vec<Signal> = seed
        .intersections
        .into_iter()
        .map(|intersection| Signal {
            id: intersection.id,
            lat: intersection.lat,
            lng: intersection.lng,
            phases: Vec::new(),
        })
        .collect();

    let mut positions: HashMap<SignalId, usize> = HashMap::with_capacity(signals.len());
    for (position, signal) in signals.iter().enumerate() {
        positions.entry(signal.id).or_insert(position);
    }

    let mut orphaned = 0usize;
    for phase in seed.phases {
        match positions.get(&phase.intersection_id) {
            Some(&position) => signals[position].phases.push(SignalPhase::from_parts(
                phase.offset_sec,
                phase.cycle_length_sec,
                phase.green_duration_sec,
            )),
            None => orphaned += 1,
        }
    }
    if orphaned > 0 {
        warn!(orphaned, "Skipped signal phases referencing unknown intersections");
    }

    Ok(signals)
}

/// Loads the catalog and swaps it into shared state.
pub fn refresh_catalog(
    catalog: &dyn SignalCatalog,
    state: &Arc<RwLock<AppState>>,
) -> Result<usize, AppError> {
    let signals = catalog
        .list_signals()
        .map_err(|err| AppError::Catalog(err.to_string()))?;
    let count = signals.len();

    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    guard.set_signals(signals, SystemTime::now());

    Ok(count)
}

/// Reloads the catalog every `interval` until `stop` is set. A failed reload
/// keeps the previous snapshot.
pub fn spawn_catalog_refresh(
    catalog: Arc<dyn SignalCatalog>,
    state: Arc<RwLock<AppState>>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        info!(
            interval_secs = interval.as_secs(),
            "Signal catalog refresh thread started"
        );
        while !stop.load(Ordering::Relaxed) {
            sleep_with_stop(interval, &stop, Instant::now());
            if stop.load(Ordering::Relaxed) {
                break;
            }

            match refresh_catalog(catalog.as_ref(), &state) {
                Ok(count) => debug!(count, "Signal catalog reloaded"),
                Err(e) => warn!(error = %e, "Signal catalog reload failed, keeping previous snapshot"),
            }
        }
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step.min(remaining - slept));
        slept += step;
    }
}
