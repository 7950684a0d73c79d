use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::catalog::{Photo, PhotoCatalog};
use crate::constants::CLOSEST_PHOTOS_LIMIT;
use crate::markers;
use crate::view;

use super::state::AppState;

const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
    pub id: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    fn success(result: Value, id: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn failure(error: RpcError, id: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcErrorObject {
                code: error.code(),
                message: error.to_string(),
            }),
            id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RpcError {
    fn code(&self) -> i64 {
        match self {
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::Internal(_) => -32603,
        }
    }
}

/// Photo metadata submitted through `add_photo` after a direct upload
#[derive(Debug, Deserialize)]
pub struct NewPhotoMetadata {
    pub id: String,
    pub sha256: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Single JSON-RPC endpoint. Requests must carry the CSRF token;
/// handler failures become RPC error objects, never transport errors.
pub async fn rpc_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Result<Json<RpcResponse>, StatusCode> {
    let token = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    if token != Some(state.settings.csrf_token.as_str()) {
        tracing::warn!(method = %request.method, "RPC call with missing or wrong CSRF token");
        return Err(StatusCode::FORBIDDEN);
    }

    let id = request.id;
    match dispatch(&state, &request.method, request.params).await {
        Ok(result) => Ok(Json(RpcResponse::success(result, id))),
        Err(e) => {
            tracing::warn!(method = %request.method, error = %e, "RPC call failed");
            Ok(Json(RpcResponse::failure(e, id)))
        }
    }
}

async fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "photo_exists" => {
            let (sha256,): (String,) = parse_params(params)?;
            Ok(json!(state.catalog.read().unwrap().contains_hash(&sha256)))
        }
        "get_location" => {
            let (latitude, longitude): (f64, f64) = parse_params(params)?;
            // Coordinates seen before resolve from the catalog without
            // touching the remote geocoder
            let cached = state.catalog.read().unwrap().location_for(latitude, longitude);
            if let Some((city, country)) = cached {
                return Ok(json!({ "city": city, "country": country }));
            }
            to_value(state.geocoder.reverse(latitude, longitude).await)
        }
        "create_upload_url" => {
            let ticket = state.image_host.create_upload_url().await?;
            to_value(ticket)
        }
        "add_photo" => {
            let (metadata,): (NewPhotoMetadata,) = parse_params(params)?;
            add_photo(state, metadata)?;
            Ok(Value::Null)
        }
        "get_closest_photos" => {
            let (latitude, longitude): (f64, f64) = parse_params(params)?;
            let closest = state
                .catalog
                .read()
                .unwrap()
                .closest(latitude, longitude, CLOSEST_PHOTOS_LIMIT);
            to_value(closest)
        }
        other => Err(RpcError::MethodNotFound(other.to_string())),
    }
}

fn add_photo(state: &AppState, metadata: NewPhotoMetadata) -> Result<(), RpcError> {
    let photo = Photo {
        urls: state.image_host.urls_for(&metadata.id),
        id: metadata.id,
        sha256: metadata.sha256,
        timestamp: metadata.timestamp,
        latitude: metadata.latitude,
        longitude: metadata.longitude,
        city: metadata.city,
        country: metadata.country,
        randomized: false,
    };

    state
        .catalog
        .write()
        .unwrap()
        .insert(photo.clone())
        .map_err(|e| RpcError::InvalidParams(e.to_string()))?;
    PhotoCatalog::append_to_disk(state.catalog_path.as_ref(), &photo)?;

    // New photos keep their exact coordinates; de-overlap only runs at
    // startup
    let zoom_level = {
        let storage = state.storage.lock().unwrap();
        view::stored_view(&storage, &[]).zoom_level
    };
    let marker = markers::Marker::for_photo(&photo, zoom_level);
    state.markers.write().unwrap().push(marker);

    tracing::info!(sha256 = %photo.sha256, "photo added to catalog");
    Ok(())
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::Internal(e.into()))
}
