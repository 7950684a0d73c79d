use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use crate::catalog::PhotoCatalog;
use crate::favorites::FavoriteStore;
use crate::geocoding::Geocoder;
use crate::imagehost::ImageHost;
use crate::markers::Marker;
use crate::settings::Settings;
use crate::storage::KeyValueStorage;

/// Application state shared by all handlers; there is no other map or
/// storage handle anywhere.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<PhotoCatalog>>,
    pub markers: Arc<RwLock<Vec<Marker>>>,
    pub favorites: Arc<Mutex<FavoriteStore>>,
    pub storage: Arc<Mutex<KeyValueStorage>>,
    pub settings: Arc<Settings>,
    pub geocoder: Arc<Geocoder>,
    pub image_host: Arc<ImageHost>,
    pub catalog_path: Arc<PathBuf>,
}
