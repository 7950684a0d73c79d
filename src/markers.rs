use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

use crate::catalog::Photo;
use crate::constants::{DEFAULT_RADIUS, MIN_RADIUS, RADIUS_SHRINK_ZOOM};
use crate::favorites::FavoriteStore;

/// Blue marks a jittered position, red an exact one, so the user can
/// tell when a pin does not sit on the true capture location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Red,
    Blue,
}

/// One map marker per photo. The popup is not part of the marker; it
/// is built on demand through the popup URL.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub sha256: String,
    pub latitude: f64,
    pub longitude: f64,
    pub color: MarkerColor,
    pub radius: u32,
    pub popup_url: String,
}

/// Spreads out photos sharing exact coordinates so their markers won't
/// overlap completely. Every member of a group of two or more gets an
/// independent random offset per axis and is marked randomized;
/// singletons are left untouched. Applied once at initialization.
pub fn adjust_coordinates(photos: &mut [Photo]) {
    let mut rng = rand::rng();
    adjust_coordinates_with(photos, &mut rng);
}

pub fn adjust_coordinates_with<R: Rng>(photos: &mut [Photo], rng: &mut R) {
    let mut by_coords: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for (i, photo) in photos.iter_mut().enumerate() {
        photo.randomized = false;
        by_coords
            .entry((photo.latitude.to_bits(), photo.longitude.to_bits()))
            .or_default()
            .push(i);
    }

    for indices in by_coords.values() {
        if indices.len() < 2 {
            continue;
        }
        for &i in indices {
            photos[i].latitude = randomize_coordinate(photos[i].latitude, rng);
            photos[i].longitude = randomize_coordinate(photos[i].longitude, rng);
            photos[i].randomized = true;
        }
    }
}

/// Offset in [-0.0005, +0.0005] degrees, sign by independent coin flip
fn randomize_coordinate<R: Rng>(coord: f64, rng: &mut R) -> f64 {
    let delta = rng.random::<f64>() / 2000.0;
    if rng.random_bool(0.5) {
        coord + delta
    } else {
        coord - delta
    }
}

pub fn calculate_radius(zoom_level: u8) -> u32 {
    calculate_radius_from(DEFAULT_RADIUS, zoom_level)
}

/// Markers keep the default radius until street-level zoom, then
/// shrink, floored at MIN_RADIUS.
pub fn calculate_radius_from(default_radius: u32, zoom_level: u8) -> u32 {
    let mut radius = default_radius as i64;
    if zoom_level >= RADIUS_SHRINK_ZOOM {
        radius -= (zoom_level % 16) as i64 * 2;
    }
    radius.max(MIN_RADIUS as i64) as u32
}

impl Marker {
    /// Marker for a single photo at the given zoom level
    pub fn for_photo(photo: &Photo, zoom_level: u8) -> Self {
        Self {
            sha256: photo.sha256.clone(),
            latitude: photo.latitude,
            longitude: photo.longitude,
            color: if photo.randomized {
                MarkerColor::Blue
            } else {
                MarkerColor::Red
            },
            radius: calculate_radius(zoom_level),
            popup_url: format!("/api/popup/{}", photo.sha256),
        }
    }
}

/// One marker per photo at the given zoom level
pub fn build_markers(photos: &[Photo], zoom_level: u8) -> Vec<Marker> {
    photos
        .iter()
        .map(|photo| Marker::for_photo(photo, zoom_level))
        .collect()
}

/// Recomputes every marker's radius, called on zoom changes
pub fn update_radii(markers: &mut [Marker], zoom_level: u8) {
    let radius = calculate_radius(zoom_level);
    for marker in markers {
        marker.radius = radius;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PopupContent {
    pub photo_url: String,
    pub thumbnail_url: String,
    pub caption: String,
    pub favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
}

/// Produces popup content on demand, so nothing is built for markers
/// never opened.
pub struct PopupBuilder<'a> {
    favorites: &'a FavoriteStore,
    /// Share links are only offered when a public site URL is known
    share_base: Option<&'a str>,
}

impl<'a> PopupBuilder<'a> {
    pub fn new(favorites: &'a FavoriteStore, share_base: Option<&'a str>) -> Self {
        Self {
            favorites,
            share_base,
        }
    }

    pub fn build(&self, photo: &Photo, zoom_level: u8) -> PopupContent {
        let date = photo.timestamp.format("%a %b %d %Y");
        PopupContent {
            photo_url: photo.urls.desktop.clone(),
            thumbnail_url: photo.urls.smol.clone(),
            caption: format!("Taken on {} in {}", date, photo.location_label()),
            favorite: self.favorites.has(&photo.sha256),
            share_url: self.share_base.map(|base| {
                format!(
                    "{}/?imageId={}&zoomLevel={}",
                    base.trim_end_matches('/'),
                    photo.sha256,
                    zoom_level
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_photo;
    use crate::constants::MAX_ZOOM;
    use crate::storage::KeyValueStorage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn coincident_photos_are_all_jittered_and_flagged() {
        let mut photos = vec![
            test_photo("aaa", 18.79, 98.98),
            test_photo("bbb", 18.79, 98.98),
            test_photo("ccc", 18.79, 98.98),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        adjust_coordinates_with(&mut photos, &mut rng);

        for photo in &photos {
            assert!(photo.randomized);
            assert!(photo.latitude != 18.79 || photo.longitude != 98.98);
            assert!((photo.latitude - 18.79).abs() <= 0.0005);
            assert!((photo.longitude - 98.98).abs() <= 0.0005);
        }
        // Pairwise distinct with overwhelming probability
        assert!(
            photos[0].latitude != photos[1].latitude
                || photos[0].longitude != photos[1].longitude
        );
        assert!(
            photos[1].latitude != photos[2].latitude
                || photos[1].longitude != photos[2].longitude
        );
    }

    #[test]
    fn singleton_photos_are_untouched() {
        let mut photos = vec![
            test_photo("aaa", 18.79, 98.98),
            test_photo("bbb", 13.75, 100.50),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        adjust_coordinates_with(&mut photos, &mut rng);

        assert!(!photos[0].randomized);
        assert_eq!(photos[0].latitude, 18.79);
        assert_eq!(photos[0].longitude, 98.98);
        assert!(!photos[1].randomized);
    }

    #[test]
    fn radius_matches_worked_examples() {
        // Default radius 10: 10 - (17 % 16) * 2 = 8, 10 - (30 % 16) * 2 = 2,
        // zoom 40 would go negative and clamps to 1
        assert_eq!(calculate_radius_from(10, 17), 8);
        assert_eq!(calculate_radius_from(10, 30), 2);
        assert_eq!(calculate_radius_from(10, 40), 1);
        // Below the shrink threshold the default is untouched
        assert_eq!(calculate_radius_from(10, 16), 10);
        assert_eq!(calculate_radius(5), DEFAULT_RADIUS);
    }

    #[test]
    fn radius_is_non_increasing_over_supported_zooms() {
        let mut previous = calculate_radius(RADIUS_SHRINK_ZOOM);
        for zoom in RADIUS_SHRINK_ZOOM..=MAX_ZOOM {
            let radius = calculate_radius(zoom);
            assert!(radius <= previous, "radius grew at zoom {}", zoom);
            assert!(radius >= MIN_RADIUS);
            previous = radius;
        }
    }

    #[test]
    fn markers_color_by_jitter_status() {
        let mut photos = vec![
            test_photo("aaa", 18.79, 98.98),
            test_photo("bbb", 18.79, 98.98),
            test_photo("ccc", 13.75, 100.50),
        ];
        let mut rng = StdRng::seed_from_u64(42);
        adjust_coordinates_with(&mut photos, &mut rng);

        let markers = build_markers(&photos, 10);
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].color, MarkerColor::Blue);
        assert_eq!(markers[1].color, MarkerColor::Blue);
        assert_eq!(markers[2].color, MarkerColor::Red);
        assert_eq!(markers[2].popup_url, "/api/popup/ccc");
    }

    #[test]
    fn single_photo_marker_matches_batch_output() {
        let photo = test_photo("aaa", 18.79, 98.98);
        let marker = Marker::for_photo(&photo, 18);

        assert_eq!(marker.sha256, "aaa");
        assert_eq!(marker.color, MarkerColor::Red);
        assert_eq!(marker.radius, calculate_radius(18));
        assert_eq!(marker.popup_url, "/api/popup/aaa");
    }

    #[test]
    fn update_radii_applies_zoom_to_every_marker() {
        let photos = vec![test_photo("aaa", 1.0, 2.0), test_photo("bbb", 3.0, 4.0)];
        let mut markers = build_markers(&photos, 10);
        assert!(markers.iter().all(|m| m.radius == DEFAULT_RADIUS));

        update_radii(&mut markers, 18);
        let expected = calculate_radius(18);
        assert!(markers.iter().all(|m| m.radius == expected));
    }

    #[test]
    fn popup_reflects_favorite_state_and_share_base() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = KeyValueStorage::open(dir.path().join("state.json"));
        let mut favorites = FavoriteStore::load(&storage);
        favorites.toggle("aaa");
        favorites.write(&mut storage).unwrap();

        let photo = test_photo("aaa", 18.79, 98.98);
        let builder = PopupBuilder::new(&favorites, Some("https://cats.example/"));
        let popup = builder.build(&photo, 15);

        assert!(popup.favorite);
        assert_eq!(popup.caption, "Taken on Fri May 26 2023 in Chiang Mai, Thailand");
        assert_eq!(
            popup.share_url.as_deref(),
            Some("https://cats.example/?imageId=aaa&zoomLevel=15")
        );

        let no_share = PopupBuilder::new(&favorites, None).build(&photo, 15);
        assert!(no_share.share_url.is_none());
    }
}
