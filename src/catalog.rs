use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Display URLs served by the image CDN
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoUrls {
    pub desktop: String,
    pub smol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    /// Asset id assigned by the image host
    pub id: String,
    /// Content hash, the canonical photo identifier
    pub sha256: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub urls: PhotoUrls,
    /// Set when the coordinates were jittered to de-overlap markers.
    /// Session-only, never persisted.
    #[serde(skip)]
    pub randomized: bool,
}

impl Photo {
    /// "City, Country", country alone if no city
    pub fn location_label(&self) -> String {
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => format!("{}, {}", city, country),
            (None, Some(country)) => country.clone(),
            _ => "an undisclosed location".to_string(),
        }
    }
}

/// One entry of the sorted place index
#[derive(Debug, Clone, Serialize)]
pub struct Place {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// In-memory photo list, loaded once from a JSON file at startup.
pub struct PhotoCatalog {
    photos: Vec<Photo>,
}

impl PhotoCatalog {
    /// Loads the catalog file. Missing or corrupt data yields an empty
    /// catalog.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let photos = match std::fs::read(path.as_ref()) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(photos) => photos,
                Err(e) => {
                    tracing::warn!(path = %path.as_ref().display(), error = %e, "corrupt catalog file, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { photos }
    }

    pub fn from_photos(photos: Vec<Photo>) -> Self {
        Self { photos }
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn photos_mut(&mut self) -> &mut [Photo] {
        &mut self.photos
    }

    pub fn find_by_hash(&self, sha256: &str) -> Option<&Photo> {
        self.photos.iter().find(|p| p.sha256 == sha256)
    }

    pub fn contains_hash(&self, sha256: &str) -> bool {
        self.find_by_hash(sha256).is_some()
    }

    /// Inserts a photo, rejecting duplicate content hashes.
    pub fn insert(&mut self, photo: Photo) -> Result<()> {
        if self.contains_hash(&photo.sha256) {
            anyhow::bail!("photo {} already in catalog", photo.sha256);
        }
        self.photos.push(photo);
        Ok(())
    }

    /// City/country previously resolved for these exact coordinates
    pub fn location_for(&self, latitude: f64, longitude: f64) -> Option<(Option<String>, Option<String>)> {
        self.photos
            .iter()
            .find(|p| p.latitude == latitude && p.longitude == longitude)
            .map(|p| (p.city.clone(), p.country.clone()))
    }

    /// Photos ordered by distance from the given point
    pub fn closest(&self, latitude: f64, longitude: f64, limit: usize) -> Vec<Photo> {
        let mut with_distance: Vec<(f64, &Photo)> = self
            .photos
            .iter()
            .map(|p| (haversine_meters(latitude, longitude, p.latitude, p.longitude), p))
            .collect();
        with_distance.sort_by(|a, b| a.0.total_cmp(&b.0));
        with_distance
            .into_iter()
            .take(limit)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Distinct location labels with representative coordinates, sorted
    /// alphabetically. When several photos share a label the last one
    /// wins.
    pub fn places(&self) -> Vec<Place> {
        let mut by_label: std::collections::BTreeMap<String, (f64, f64)> =
            std::collections::BTreeMap::new();
        for photo in &self.photos {
            by_label.insert(photo.location_label(), (photo.latitude, photo.longitude));
        }
        by_label
            .into_iter()
            .map(|(label, (latitude, longitude))| Place {
                label,
                latitude,
                longitude,
            })
            .collect()
    }

    /// Appends a photo to the on-disk catalog.
    ///
    /// Reads the file fresh so that session-local coordinate jitter in
    /// the in-memory catalog never leaks into the stored data.
    pub fn append_to_disk<P: AsRef<Path>>(path: P, photo: &Photo) -> Result<()> {
        let mut on_disk: Vec<Photo> = match std::fs::read(path.as_ref()) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        on_disk.push(photo.clone());

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&on_disk)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

const EARTH_RADIUS: f64 = 6378137.0;

/// Haversine great-circle distance in meters
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS * c
}

#[cfg(test)]
pub(crate) fn test_photo(sha256: &str, latitude: f64, longitude: f64) -> Photo {
    Photo {
        id: format!("asset-{}", sha256),
        sha256: sha256.to_string(),
        timestamp: "2023-05-26T05:00:00Z".parse().unwrap(),
        latitude,
        longitude,
        city: Some("Chiang Mai".to_string()),
        country: Some("Thailand".to_string()),
        urls: PhotoUrls {
            desktop: format!("https://cdn.example/{}/desktop", sha256),
            smol: format!("https://cdn.example/{}/smol", sha256),
        },
        randomized: false,
    }
}
