use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalog::Photo;
use crate::constants::{
    DEFAULT_ZOOM, FALLBACK_LATITUDE, FALLBACK_LONGITUDE, MAX_ZOOM, MIN_ZOOM,
};
use crate::storage::KeyValueStorage;

const LATITUDE_KEY: &str = "latitude";
const LONGITUDE_KEY: &str = "longitude";
const ZOOM_KEY: &str = "zoomLevel";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom_level: u8,
}

/// Deep-link parameters restoring a specific photo and zoom on load
#[derive(Debug, Clone, PartialEq)]
pub struct DeepLink {
    pub image_id: String,
    pub zoom_level: Option<u8>,
}

impl DeepLink {
    pub fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        let image_id = params.get("imageId")?.clone();
        if image_id.is_empty() {
            return None;
        }
        let zoom_level = params.get("zoomLevel").and_then(|z| z.parse().ok());
        Some(Self {
            image_id,
            zoom_level,
        })
    }
}

/// Outcome of the view-selection state machine
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedView {
    #[serde(flatten)]
    pub view: ViewState,
    /// Hash of the photo whose popup should open, deep links only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_popup: Option<String>,
    /// Set when deep-link parameters were consumed and should be
    /// stripped from the visible URL
    pub deep_link_consumed: bool,
}

/// Picks the initial view: deep link, then caller-supplied
/// geolocation, then the stored view, then the first photo or the
/// hard-coded fallback point.
pub fn resolve_initial_view(
    deep_link: Option<DeepLink>,
    geolocation: Option<(f64, f64)>,
    storage: &KeyValueStorage,
    photos: &[Photo],
) -> ResolvedView {
    let stored = stored_view(storage, photos);

    if let Some(link) = deep_link {
        if let Some(photo) = photos.iter().find(|p| p.sha256 == link.image_id) {
            let zoom_level = link
                .zoom_level
                .filter(|z| (MIN_ZOOM..=MAX_ZOOM).contains(z))
                .unwrap_or(stored.zoom_level);
            return ResolvedView {
                view: ViewState {
                    latitude: photo.latitude,
                    longitude: photo.longitude,
                    zoom_level,
                },
                open_popup: Some(photo.sha256.clone()),
                deep_link_consumed: true,
            };
        }
        tracing::warn!(image_id = %link.image_id, "deep link names an unknown photo");
    }

    if let Some((latitude, longitude)) = geolocation {
        return ResolvedView {
            view: ViewState {
                latitude,
                longitude,
                zoom_level: stored.zoom_level,
            },
            open_popup: None,
            deep_link_consumed: false,
        };
    }

    ResolvedView {
        view: stored,
        open_popup: None,
        deep_link_consumed: false,
    }
}

/// Last persisted view, falling back to the first photo's coordinates
/// or the hard-coded default point.
pub fn stored_view(storage: &KeyValueStorage, photos: &[Photo]) -> ViewState {
    let (start_latitude, start_longitude) = photos
        .first()
        .map(|p| (p.latitude, p.longitude))
        .unwrap_or((FALLBACK_LATITUDE, FALLBACK_LONGITUDE));

    // Values are persisted as plain strings; a missing key, parse
    // failure, or the 0.0 sentinel all mean "nothing stored".
    let latitude = read_coordinate(storage, LATITUDE_KEY).unwrap_or(start_latitude);
    let longitude = read_coordinate(storage, LONGITUDE_KEY).unwrap_or(start_longitude);
    let zoom_level = storage
        .get::<String>(ZOOM_KEY)
        .and_then(|z| z.parse().ok())
        .unwrap_or(DEFAULT_ZOOM);

    ViewState {
        latitude,
        longitude,
        zoom_level,
    }
}

fn read_coordinate(storage: &KeyValueStorage, key: &str) -> Option<f64> {
    storage
        .get::<String>(key)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| !v.is_nan() && *v != 0.0)
}

/// Persists the view for the next session, called on every view change
pub fn persist_view(storage: &mut KeyValueStorage, view: &ViewState) -> Result<()> {
    storage.set(LATITUDE_KEY, view.latitude.to_string());
    storage.set(LONGITUDE_KEY, view.longitude.to_string());
    storage.set(ZOOM_KEY, view.zoom_level.to_string());
    storage.flush()
}

pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.trim_start_matches('?').split('&') {
        if pair.is_empty() {
            continue;
        }
        let mut kv = pair.splitn(2, '=');
        let key = kv.next().unwrap_or("");
        let value = kv.next().unwrap_or("");
        params.insert(key.to_string(), value.to_string());
    }
    params
}

/// Removes the consumed deep-link parameters from a query string,
/// keeping everything else intact.
pub fn strip_deep_link(query: &str) -> String {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| {
            let key = pair.splitn(2, '=').next().unwrap_or("");
            !pair.is_empty() && key != "imageId" && key != "zoomLevel"
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_photo;

    fn empty_storage(dir: &tempfile::TempDir) -> KeyValueStorage {
        KeyValueStorage::open(dir.path().join("state.json"))
    }

    #[test]
    fn deep_link_with_valid_zoom_centers_on_photo() {
        let dir = tempfile::tempdir().unwrap();
        let photos = vec![test_photo("aaa", 18.79, 98.98), test_photo("bbb", 13.75, 100.5)];
        let params = parse_query("?imageId=bbb&zoomLevel=15");
        let link = DeepLink::from_params(&params);

        let resolved = resolve_initial_view(link, None, &empty_storage(&dir), &photos);
        assert_eq!(resolved.view.latitude, 13.75);
        assert_eq!(resolved.view.longitude, 100.5);
        assert_eq!(resolved.view.zoom_level, 15);
        assert_eq!(resolved.open_popup.as_deref(), Some("bbb"));
        assert!(resolved.deep_link_consumed);

        let stripped = strip_deep_link("?imageId=bbb&zoomLevel=15");
        assert!(!stripped.contains("imageId"));
        assert!(!stripped.contains("zoomLevel"));
    }

    #[test]
    fn deep_link_zoom_out_of_range_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let photos = vec![test_photo("aaa", 18.79, 98.98)];
        let params = parse_query("imageId=aaa&zoomLevel=50");

        let resolved =
            resolve_initial_view(DeepLink::from_params(&params), None, &empty_storage(&dir), &photos);
        assert_eq!(resolved.view.zoom_level, DEFAULT_ZOOM);
        assert!(resolved.deep_link_consumed);
    }

    #[test]
    fn unknown_deep_link_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let photos = vec![test_photo("aaa", 18.79, 98.98)];
        let params = parse_query("imageId=zzz");

        let resolved =
            resolve_initial_view(DeepLink::from_params(&params), None, &empty_storage(&dir), &photos);
        assert!(!resolved.deep_link_consumed);
        assert!(resolved.open_popup.is_none());
        assert_eq!(resolved.view.latitude, 18.79);
    }

    #[test]
    fn geolocation_beats_stored_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = empty_storage(&dir);
        persist_view(
            &mut storage,
            &ViewState {
                latitude: 52.52,
                longitude: 13.40,
                zoom_level: 9,
            },
        )
        .unwrap();

        let resolved = resolve_initial_view(None, Some((1.35, 103.82)), &storage, &[]);
        assert_eq!(resolved.view.latitude, 1.35);
        assert_eq!(resolved.view.longitude, 103.82);
        // Zoom still comes from the stored view
        assert_eq!(resolved.view.zoom_level, 9);
    }

    #[test]
    fn stored_view_round_trips_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = empty_storage(&dir);
        persist_view(
            &mut storage,
            &ViewState {
                latitude: 18.80,
                longitude: 98.99,
                zoom_level: 17,
            },
        )
        .unwrap();

        assert_eq!(storage.get::<String>("latitude").as_deref(), Some("18.8"));
        let view = stored_view(&storage, &[]);
        assert_eq!(view.latitude, 18.80);
        assert_eq!(view.zoom_level, 17);
    }

    #[test]
    fn zero_coordinates_in_storage_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = empty_storage(&dir);
        storage.set("latitude", "0".to_string());
        storage.set("longitude", "garbage".to_string());

        let photos = vec![test_photo("aaa", 18.79, 98.98)];
        let view = stored_view(&storage, &photos);
        assert_eq!(view.latitude, 18.79);
        assert_eq!(view.longitude, 98.98);
    }

    #[test]
    fn empty_catalog_falls_back_to_default_point() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_initial_view(None, None, &empty_storage(&dir), &[]);
        assert_eq!(resolved.view.latitude, FALLBACK_LATITUDE);
        assert_eq!(resolved.view.longitude, FALLBACK_LONGITUDE);
        assert_eq!(resolved.view.zoom_level, DEFAULT_ZOOM);
    }

    #[test]
    fn strip_deep_link_keeps_other_params() {
        assert_eq!(
            strip_deep_link("?imageId=aaa&theme=dark&zoomLevel=15"),
            "theme=dark"
        );
        assert_eq!(strip_deep_link("imageId=aaa"), "");
        assert_eq!(strip_deep_link(""), "");
    }
}
