//! Nominatim `/search` client.

use crate::error::AppError;
use crate::route::GeoPoint;
use crate::upstream::{Geocoder, upstream_error};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    query_suffix: Option<String>,
}

impl NominatimGeocoder {
    /// Nominatim's usage policy requires an identifying `user_agent`.
    pub fn new(
        base_url: impl Into<String>,
        query_suffix: Option<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|err| upstream_error("failed to build geocoding client", err))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            query_suffix: query_suffix.filter(|suffix| !suffix.trim().is_empty()),
        })
    }

    /// Free text sent upstream, narrowed by the configured locality suffix.
    pub fn search_text(&self, query: &str) -> String {
        match &self.query_suffix {
            Some(suffix) => format!("{query}, {suffix}"),
            None => query.to_string(),
        }
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<GeoPoint, AppError> {
        let text = self.search_text(query);
        debug!(query = %text, "Requesting geocode");

        let places: Vec<NominatimPlace> = self
            .client
            .get(self.search_url())
            .query(&[("format", "json"), ("q", text.as_str())])
            .send()
            .await
            .map_err(|err| upstream_error("geocoding request failed", err))?
            .error_for_status()
            .map_err(|err| upstream_error("geocoding service error", err))?
            .json()
            .await
            .map_err(|err| upstream_error("invalid geocoding response", err))?;

        first_place(&places, query)
    }
}

#[derive(Debug, Deserialize)]
pub struct NominatimPlace {
    lat: String,
    lon: String,
}

/// Nominatim ranks results; the first one is taken.
pub fn first_place(places: &[NominatimPlace], query: &str) -> Result<GeoPoint, AppError> {
    let Some(place) = places.first() else {
        return Err(AppError::NotFound(format!("address not found: {query}")));
    };
    let lat: f64 = place
        .lat
        .parse()
        .map_err(|_| upstream_error("invalid latitude from geocoder", &place.lat))?;
    let lng: f64 = place
        .lon
        .parse()
        .map_err(|_| upstream_error("invalid longitude from geocoder", &place.lon))?;
    GeoPoint::new(lat, lng)
        .validated()
        .map_err(|err| upstream_error("geocoder returned unusable coordinates", err))
}
