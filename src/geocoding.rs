use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Candidate component types a geocoder result may label a "city" with
const CITY_CANDIDATE_TYPES: &[&str] = &[
    "locality",
    "colloquial_area",
    "administrative_area_level_1",
    "administrative_area_level_2",
    "administrative_area_level_3",
    "administrative_area_level_4",
    "administrative_area_level_5",
];

#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct GeocodeResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "cityCandidates", skip_serializing_if = "Vec::is_empty")]
    pub city_candidates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocoderResponse {
    #[serde(default)]
    results: Vec<GeocoderEntry>,
}

#[derive(Debug, Deserialize)]
struct GeocoderEntry {
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Resolves coordinates to a city/country via a remote geocoding API.
/// Failures degrade to an empty result; nothing here is fatal.
pub struct Geocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl Geocoder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: settings.geocoder_endpoint.clone(),
            api_key: settings.geocoder_api_key.clone(),
        }
    }

    pub async fn reverse(&self, latitude: f64, longitude: f64) -> GeocodeResult {
        let Some(ref api_key) = self.api_key else {
            tracing::warn!("no geocoder API key configured, returning empty location");
            return GeocodeResult::default();
        };

        match self.request(latitude, longitude, api_key).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(latitude, longitude, error = %e, "reverse geocoding failed");
                GeocodeResult::default()
            }
        }
    }

    async fn request(&self, latitude: f64, longitude: f64, api_key: &str) -> Result<GeocodeResult> {
        let latlng = format!("{},{}", latitude, longitude);
        let result_types = format!("country|{}", CITY_CANDIDATE_TYPES.join("|"));
        let response: GeocoderResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("language", "en"),
                ("latlng", latlng.as_str()),
                ("key", api_key),
                ("result_type", result_types.as_str()),
            ])
            .send()
            .await
            .context("geocoder request failed")?
            .json()
            .await
            .context("geocoder returned malformed JSON")?;

        let components: Vec<AddressComponent> = response
            .results
            .into_iter()
            .flat_map(|r| r.address_components)
            .collect();

        Ok(extract_location(&components))
    }
}

/// Collects city candidates and the country from address components; a
/// single candidate is promoted to the city.
pub fn extract_location(components: &[AddressComponent]) -> GeocodeResult {
    let mut candidates: Vec<String> = Vec::new();
    let mut country = None;

    for component in components {
        let is_city_candidate = component
            .types
            .iter()
            .any(|t| CITY_CANDIDATE_TYPES.contains(&t.as_str()));
        if is_city_candidate && !candidates.contains(&component.long_name) {
            candidates.push(component.long_name.clone());
        }
        if country.is_none() && component.types.iter().any(|t| t == "country") {
            country = Some(component.long_name.clone());
        }
    }

    candidates.sort();
    let city = if candidates.len() == 1 {
        Some(candidates[0].clone())
    } else {
        None
    };

    GeocodeResult {
        city,
        city_candidates: candidates,
        country,
    }
}
