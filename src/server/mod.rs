use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

pub mod handlers;
pub mod rpc;
pub mod state;

use self::state::AppState;
use handlers::{
    extract_metadata, get_markers, get_photos, get_places, get_popup, get_view, list_favorites,
    remove_favorite, toggle_favorite, update_view,
};
use rpc::rpc_handler;

// Create the main application router
fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/photos", get(get_photos))
        .route("/api/markers", get(get_markers))
        .route("/api/popup/:sha256", get(get_popup))
        .route("/api/places", get(get_places))
        .route("/api/view", get(get_view).post(update_view))
        .route("/api/favorites", get(list_favorites))
        .route("/api/favorites/toggle", post(toggle_favorite))
        .route("/api/favorites/remove", post(remove_favorite))
        .route("/api/extract-metadata", post(extract_metadata))
        .route("/rpc", post(rpc_handler))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_app(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
