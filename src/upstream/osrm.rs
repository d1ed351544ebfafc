//! OSRM `route/v1/driving` client.

use crate::error::AppError;
use crate::route::{GeoPoint, Leg, RawRoute, Step};
use crate::upstream::{RouteProvider, upstream_error};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OsrmRouteProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouteProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| upstream_error("failed to build routing client", err))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn route_url(&self, origin: GeoPoint, destination: GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson&steps=true",
            self.base_url.trim_end_matches('/'),
            origin.lng,
            origin.lat,
            destination.lng,
            destination.lat
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmRouteProvider {
    async fn fetch_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<RawRoute, AppError> {
        let url = self.route_url(origin, destination);
        debug!(%url, "Requesting route");

        // OSRM reports routing failures as JSON bodies on 4xx responses, so
        // the body is decoded regardless of status.
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| upstream_error("routing request failed", err))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(AppError::UpstreamUnavailable(format!(
                "routing service returned {status}"
            )));
        }
        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|err| upstream_error("invalid routing response", err))?;

        decode_route(body)
    }
}

#[derive(Debug, Deserialize)]
pub struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    duration: f64,
    distance: f64,
    geometry: OsrmGeometry,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    maneuver: OsrmManeuver,
    #[serde(default)]
    name: String,
    #[serde(default)]
    distance: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
}

/// Converts the first OSRM route into a [`RawRoute`].
///
/// GeoJSON positions arrive as `[lng, lat]`; this is where they become
/// named [`GeoPoint`] fields.
pub fn decode_route(body: OsrmResponse) -> Result<RawRoute, AppError> {
    if body.code != "Ok" {
        let detail = body.message.unwrap_or_else(|| body.code.clone());
        return Err(match body.code.as_str() {
            "NoRoute" | "NoSegment" | "NoMatch" => AppError::NotFound(detail),
            "InvalidQuery" | "InvalidValue" | "InvalidUrl" => AppError::InvalidInput(detail),
            _ => AppError::UpstreamUnavailable(detail),
        });
    }

    let Some(route) = body.routes.into_iter().next() else {
        return Err(AppError::NotFound("routing service returned no routes".to_string()));
    };

    let geometry = route
        .geometry
        .coordinates
        .iter()
        .enumerate()
        .map(|(index, position)| match position.as_slice() {
            [lng, lat, ..] => Ok(GeoPoint::new(*lat, *lng)),
            _ => Err(AppError::UpstreamUnavailable(format!(
                "routing service returned malformed position {index}: {position:?}"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let legs = route
        .legs
        .into_iter()
        .map(|leg| Leg {
            steps: leg
                .steps
                .into_iter()
                .map(|step| Step {
                    maneuver_type: step.maneuver.kind,
                    maneuver_modifier: step.maneuver.modifier,
                    street_name: step.name,
                    distance_meters: step.distance,
                })
                .collect(),
        })
        .collect();

    Ok(RawRoute {
        duration_sec: route.duration,
        distance_meters: route.distance,
        geometry,
        legs,
    })
}
