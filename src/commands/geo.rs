//! 地理编码与坐标校验接口

use axum::extract::State;
use axum::http::{Extensions, HeaderMap};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::geo::{validate_coordinates, Coordinates};
use crate::models::{GeocodeRequest, GeocodeResult};
use crate::utils::{client_key, peer_ip};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/geo/geocode", post(geocode))
        .route("/api/geo/validate", post(validate))
}

/// 地址转坐标，按客户端限流
async fn geocode(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(request): Json<GeocodeRequest>,
) -> ApiResult<GeocodeResult> {
    let trust_forwarded = state
        .system
        .get_settings()
        .get()
        .await
        .server
        .trust_forwarded_headers;
    let key = client_key(&headers, peer_ip(&extensions), trust_forwarded);
    let result = state.geo.get_geocoder().geocode(&key, &request).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// 校验坐标是否位于沙特境内
async fn validate(Json(request): Json<ValidateRequest>) -> Json<ValidateResponse> {
    Json(match validate_coordinates(request.lat, request.lng) {
        Ok(coordinates) => ValidateResponse {
            valid: true,
            coordinates: Some(coordinates),
            error: None,
        },
        Err(e) => ValidateResponse {
            valid: false,
            coordinates: None,
            error: Some(e.to_string()),
        },
    })
}
