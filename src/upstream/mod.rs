//! Collaborators that supply routes and coordinates over the network.

use crate::error::AppError;
use crate::route::{GeoPoint, RawRoute};
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod nominatim;
pub mod osrm;

#[async_trait]
pub trait RouteProvider: Send + Sync + fmt::Debug {
    /// Driving route from `origin` to `destination`, geometry in driving order.
    async fn fetch_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<RawRoute, AppError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync + fmt::Debug {
    async fn geocode(&self, query: &str) -> Result<GeoPoint, AppError>;
}

pub(crate) fn upstream_error(context: &str, err: impl fmt::Display) -> AppError {
    AppError::UpstreamUnavailable(format!("{context}: {err}"))
}
