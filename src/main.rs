use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tracing_subscriber::EnvFilter;

mod catalog;
mod constants;
mod favorites;
mod geocoding;
mod imagehost;
mod ingest;
mod markers;
mod server;
mod settings;
mod storage;
mod utils;
mod view;

use catalog::PhotoCatalog;
use favorites::FavoriteStore;
use geocoding::Geocoder;
use imagehost::ImageHost;
use server::{start_server, state::AppState};
use settings::Settings;
use storage::KeyValueStorage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load().context("Failed to load settings")?;

    // Seed the config file on first run so operators have something to edit
    let config_path = Settings::config_path();
    if !config_path.exists() {
        if let Err(e) = settings.save() {
            tracing::warn!(path = %config_path.display(), error = %e, "could not write default config file");
        }
    }

    let data_dir = settings
        .data_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(utils::get_app_data_dir);
    utils::ensure_directory_exists(&data_dir).context("Failed to create data directory")?;

    let storage = KeyValueStorage::open(data_dir.join("state.json"));
    let favorites = FavoriteStore::load(&storage);

    let catalog_path = data_dir.join("photos.json");
    let mut catalog = PhotoCatalog::load(&catalog_path);

    // Spread out photos sharing exact coordinates, once per session
    markers::adjust_coordinates(catalog.photos_mut());

    let initial_view = view::stored_view(&storage, catalog.photos());
    let marker_list = markers::build_markers(catalog.photos(), initial_view.zoom_level);

    tracing::info!(
        photos = catalog.len(),
        favorites = favorites.size(),
        zoom = initial_view.zoom_level,
        "catalog loaded"
    );

    let port = settings.port;
    let state = AppState {
        catalog: Arc::new(RwLock::new(catalog)),
        markers: Arc::new(RwLock::new(marker_list)),
        favorites: Arc::new(Mutex::new(favorites)),
        storage: Arc::new(Mutex::new(storage)),
        geocoder: Arc::new(Geocoder::new(&settings)),
        image_host: Arc::new(ImageHost::new(&settings)),
        settings: Arc::new(settings),
        catalog_path: Arc::new(catalog_path),
    };

    start_server(state, port).await
}
