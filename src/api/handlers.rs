use crate::api::responses::{
    ErrorCode, ErrorResponse, GeocodeSuccessResponse, HealthStatus, HealthSuccessResponse,
    RouteSuccessResponse,
};
use crate::error::AppError;
use crate::route::GeoPoint;
use crate::service::RouteEstimationService;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

#[derive(Debug, Error)]
enum TimestampError {
    #[error("failed to format timestamp: {0}")]
    Format(#[from] time::error::Format),
}

#[derive(Debug, Clone)]
pub struct ApiContext {
    pub state: Arc<RwLock<AppState>>,
    pub service: Arc<RouteEstimationService>,
}

pub enum ApiResponse<T> {
    Success {
        status: StatusCode,
        body: T,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

impl<T> ApiResponse<T> {
    fn ok(body: T) -> Self {
        ApiResponse::Success {
            status: StatusCode::OK,
            body,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    /// "lng,lat"
    pub start: Option<String>,
    /// "lng,lat"
    pub end: Option<String>,
    /// RFC 3339; defaults to now
    pub departure: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeocodeQuery {
    pub q: Option<String>,
}

pub async fn get_route(
    State(context): State<ApiContext>,
    Query(query): Query<RouteQuery>,
) -> impl IntoResponse {
    build_route_response(context, query, OffsetDateTime::now_utc()).await
}

pub async fn get_geocode(
    State(context): State<ApiContext>,
    Query(query): Query<GeocodeQuery>,
) -> impl IntoResponse {
    build_geocode_response(context, query).await
}

pub async fn get_health(State(context): State<ApiContext>) -> impl IntoResponse {
    build_health_response(context, OffsetDateTime::now_utc())
}

struct RouteRequest {
    origin: GeoPoint,
    destination: GeoPoint,
    departure: OffsetDateTime,
}

fn parse_route_query(query: &RouteQuery, now: OffsetDateTime) -> Result<RouteRequest, AppError> {
    let (Some(start), Some(end)) = (query.start.as_deref(), query.end.as_deref()) else {
        return Err(AppError::InvalidInput("missing start or end coordinates".to_string()));
    };
    let origin = GeoPoint::parse_lng_lat(start)?;
    let destination = GeoPoint::parse_lng_lat(end)?;
    let departure = match query.departure.as_deref() {
        Some(text) => OffsetDateTime::parse(text, &Rfc3339)
            .map_err(|err| AppError::InvalidInput(format!("invalid departure {text:?}: {err}")))?,
        None => now,
    };

    Ok(RouteRequest {
        origin,
        destination,
        departure,
    })
}

async fn build_route_response(
    context: ApiContext,
    query: RouteQuery,
    now: OffsetDateTime,
) -> ApiResponse<RouteSuccessResponse> {
    let request = match parse_route_query(&query, now) {
        Ok(request) => request,
        Err(err) => return error_response("/api/route", err),
    };

    let signals = {
        match context.state.read() {
            Ok(guard) => guard.signals(),
            Err(_) => return error_response("/api/route", AppError::StateLock),
        }
    };

    let mut rng = context.service.random_source();
    let result = match context
        .service
        .estimate(
            request.origin,
            request.destination,
            &signals,
            request.departure,
            &mut rng,
        )
        .await
    {
        Ok(result) => result,
        Err(err) => return error_response("/api/route", err),
    };

    match format_timestamp(request.departure) {
        Ok(departure) => ApiResponse::ok(RouteSuccessResponse::from_result(result, departure)),
        Err(err) => internal_error_response("/api/route", &err),
    }
}

async fn build_geocode_response(
    context: ApiContext,
    query: GeocodeQuery,
) -> ApiResponse<GeocodeSuccessResponse> {
    let Some(text) = query.q else {
        return error_response(
            "/api/geocode",
            AppError::InvalidInput("missing query".to_string()),
        );
    };

    match context.service.geocode(&context.state, &text).await {
        Ok(point) => ApiResponse::ok(GeocodeSuccessResponse {
            lat: point.lat,
            lng: point.lng,
        }),
        Err(err) => error_response("/api/geocode", err),
    }
}

fn build_health_response(
    context: ApiContext,
    now: OffsetDateTime,
) -> ApiResponse<HealthSuccessResponse> {
    let signal_count = match context.state.read() {
        Ok(guard) => guard.signals().len(),
        Err(_) => return error_response("/api/health", AppError::StateLock),
    };

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(err) => return internal_error_response("/api/health", &err),
    };

    let status = if signal_count == 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    };

    ApiResponse::ok(HealthSuccessResponse {
        status,
        signal_count,
        timestamp,
    })
}

fn error_response<T>(endpoint: &str, err: AppError) -> ApiResponse<T> {
    let (status, error_code, error_message) = match &err {
        AppError::InvalidInput(message) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidInput,
            message.clone(),
        ),
        AppError::NotFound(message) => {
            (StatusCode::NOT_FOUND, ErrorCode::NotFound, message.clone())
        }
        AppError::UpstreamUnavailable(message) => (
            StatusCode::BAD_GATEWAY,
            ErrorCode::UpstreamUnavailable,
            message.clone(),
        ),
        AppError::Catalog(_) | AppError::StateLock => {
            return internal_error_response(endpoint, &err);
        }
    };

    warn!(endpoint, error = %err, "Request rejected");
    ApiResponse::Error {
        status,
        body: error_body(error_code, error_message),
    }
}

fn internal_error_response<T>(endpoint: &str, err: &dyn std::error::Error) -> ApiResponse<T> {
    error!(endpoint, error = %err, "Request failed");
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: error_body(ErrorCode::InternalError, INTERNAL_ERROR_MESSAGE.to_string()),
    }
}

fn error_body(error_code: ErrorCode, error_message: String) -> ErrorResponse {
    let timestamp = format_timestamp(OffsetDateTime::now_utc()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format error timestamp");
        EPOCH_TIMESTAMP.to_string()
    });

    ErrorResponse {
        error_code,
        error_message,
        timestamp,
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, TimestampError> {
    Ok(timestamp.format(&Rfc3339)?)
}
