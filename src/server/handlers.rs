use axum::{
    body::Bytes,
    extract::{Path as AxumPath, Query, RawQuery, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::catalog::{Photo, Place};
use crate::ingest::{self, ExtractedMetadata};
use crate::markers::{update_radii, Marker, PopupBuilder, PopupContent};
use crate::view::{self, DeepLink, ResolvedView, ViewState};

use super::state::AppState;

/// Catalog as seen this session, post-jitter coordinates included
pub async fn get_photos(State(state): State<AppState>) -> Json<Vec<Photo>> {
    Json(state.catalog.read().unwrap().photos().to_vec())
}

/// Markers sized for the requested zoom level; recomputed on every
/// zoom-end
pub async fn get_markers(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Marker>> {
    let zoom_level = params
        .get("zoomLevel")
        .and_then(|z| z.parse().ok())
        .unwrap_or_else(|| {
            let storage = state.storage.lock().unwrap();
            view::stored_view(&storage, &[]).zoom_level
        });

    let mut markers = state.markers.read().unwrap().clone();
    update_radii(&mut markers, zoom_level);
    Json(markers)
}

/// Popup content built on demand, only when a marker is opened
pub async fn get_popup(
    State(state): State<AppState>,
    AxumPath(sha256): AxumPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PopupContent>, StatusCode> {
    let photo = state
        .catalog
        .read()
        .unwrap()
        .find_by_hash(&sha256)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;

    let zoom_level = params.get("zoomLevel").and_then(|z| z.parse().ok()).unwrap_or_else(|| {
        let storage = state.storage.lock().unwrap();
        view::stored_view(&storage, &[]).zoom_level
    });

    let favorites = state.favorites.lock().unwrap();
    let builder = PopupBuilder::new(&favorites, state.settings.public_url.as_deref());
    Ok(Json(builder.build(&photo, zoom_level)))
}

pub async fn get_places(State(state): State<AppState>) -> Json<Vec<Place>> {
    Json(state.catalog.read().unwrap().places())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialViewResponse {
    #[serde(flatten)]
    pub resolved: ResolvedView,
    /// Query string with the consumed deep-link parameters removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripped_query: Option<String>,
}

/// Runs the view-selection state machine and persists the outcome.
/// Optional query parameters: imageId, zoomLevel (deep link) and
/// lat/lng (the caller's geolocation).
pub async fn get_view(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Json<InitialViewResponse> {
    let query = query.unwrap_or_default();
    let params = view::parse_query(&query);
    let deep_link = DeepLink::from_params(&params);

    let geolocation = match (
        params.get("lat").and_then(|v| v.parse().ok()),
        params.get("lng").and_then(|v| v.parse().ok()),
    ) {
        (Some(lat), Some(lng)) => Some((lat, lng)),
        _ => None,
    };

    let resolved = {
        let storage = state.storage.lock().unwrap();
        let catalog = state.catalog.read().unwrap();
        view::resolve_initial_view(deep_link, geolocation, &storage, catalog.photos())
    };

    let mut storage = state.storage.lock().unwrap();
    if let Err(e) = view::persist_view(&mut storage, &resolved.view) {
        tracing::warn!(error = %e, "failed to persist view state");
    }

    let stripped_query = resolved
        .deep_link_consumed
        .then(|| view::strip_deep_link(&query));

    Json(InitialViewResponse {
        resolved,
        stripped_query,
    })
}

/// Persists a view update from a moveend/zoomend event
pub async fn update_view(
    State(state): State<AppState>,
    Json(new_view): Json<ViewState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut storage = state.storage.lock().unwrap();
    view::persist_view(&mut storage, &new_view).map_err(|e| {
        tracing::error!(error = %e, "failed to persist view state");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(json!({ "status": "success" })))
}

/// Favorite membership plus the empty flag driving the empty-state UI
pub async fn list_favorites(State(state): State<AppState>) -> Json<serde_json::Value> {
    let favorites = state.favorites.lock().unwrap();
    Json(json!({
        "favorites": favorites.to_array(),
        "count": favorites.size(),
        "empty": favorites.size() == 0,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub sha256: String,
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Json(request): Json<FavoriteRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut favorites = state.favorites.lock().unwrap();
    favorites.toggle(&request.sha256);

    // Mutations don't persist themselves
    let mut storage = state.storage.lock().unwrap();
    favorites.write(&mut storage).map_err(|e| {
        tracing::error!(error = %e, "failed to write favorites");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(json!({
        "sha256": request.sha256,
        "favorite": favorites.has(&request.sha256),
    })))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Json(request): Json<FavoriteRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut favorites = state.favorites.lock().unwrap();
    favorites.remove(&request.sha256);

    let mut storage = state.storage.lock().unwrap();
    favorites.write(&mut storage).map_err(|e| {
        tracing::error!(error = %e, "failed to write favorites");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(json!({
        "status": "success",
        "count": favorites.size(),
        "empty": favorites.size() == 0,
    })))
}

/// EXIF and content-hash extraction for an image about to be uploaded
pub async fn extract_metadata(body: Bytes) -> Result<Json<ExtractedMetadata>, StatusCode> {
    match ingest::extract_metadata(&body) {
        Ok(metadata) => Ok(Json(metadata)),
        Err(e) => {
            tracing::warn!(error = %e, "metadata extraction failed");
            Err(StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}
