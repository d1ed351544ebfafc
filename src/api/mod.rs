use axum::Router;
use axum::routing::get;

pub mod handlers;
pub mod responses;

pub use handlers::ApiContext;

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route("/api/route", get(handlers::get_route))
        .route("/api/geocode", get(handlers::get_geocode))
        .route("/api/health", get(handlers::get_health))
        .with_state(context)
}
