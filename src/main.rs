use greenwave::api::{self, ApiContext};
use greenwave::config;
use greenwave::estimation::RouteDelayAggregator;
use greenwave::service::RouteEstimationService;
use greenwave::signal::catalog::{self, JsonSignalCatalog, SignalCatalog};
use greenwave::state::AppState;
use greenwave::upstream::nominatim::NominatimGeocoder;
use greenwave::upstream::osrm::OsrmRouteProvider;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "greenwave starting"
    );
    let state = Arc::new(RwLock::new(AppState::with_geocode_capacity(
        config.geocode_cache_capacity(),
    )));

    // Load the signal catalog, then keep it fresh in the background
    let stop_flag = Arc::new(AtomicBool::new(false));
    let _refresh_handle = match config.catalog_path() {
        Some(path) => {
            let store: Arc<dyn SignalCatalog> = Arc::new(JsonSignalCatalog::new(path));
            match catalog::refresh_catalog(store.as_ref(), &state) {
                Ok(count) => tracing::info!(path = %path.display(), count, "Signal catalog loaded"),
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to load signal catalog, starting empty")
                }
            }
            Some(catalog::spawn_catalog_refresh(
                store,
                Arc::clone(&state),
                config.catalog_refresh_interval(),
                Arc::clone(&stop_flag),
            ))
        }
        None => {
            tracing::warn!("No catalog path configured in [signals], signal delays disabled");
            None
        }
    };

    let routes = OsrmRouteProvider::new(config.osrm_base_url(), config.routing_timeout())?;
    let geocoder = NominatimGeocoder::new(
        config.nominatim_base_url(),
        config.geocoding_query_suffix(),
        config.user_agent(),
        config.geocoding_timeout(),
    )?;
    let aggregator = RouteDelayAggregator::new(config.pedestrian_model(), config.utc_offset()?);
    let service = RouteEstimationService::new(Arc::new(routes), Arc::new(geocoder), aggregator)
        .with_lookup(config.lookup_kind(), config.match_tolerance_deg())
        .with_seed(config.rng_seed());
    tracing::info!(
        lookup = ?config.lookup_kind(),
        tolerance_deg = config.match_tolerance_deg(),
        seeded = config.rng_seed().is_some(),
        "Route estimation service ready"
    );

    let app = api::router(ApiContext {
        state: Arc::clone(&state),
        service: Arc::new(service),
    });
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    stop_flag.store(true, Ordering::Relaxed);

    Ok(())
}
