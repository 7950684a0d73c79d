use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Reader, Tag, Value};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// Metadata extracted from an uploaded image before it is added to the
/// catalog
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedMetadata {
    pub sha256: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Reads GPS coordinates and the capture timestamp from the EXIF data
/// of an image. A photo without GPS data cannot be placed on the map
/// and is an error; a missing timestamp falls back to now.
pub fn extract_metadata(bytes: &[u8]) -> Result<ExtractedMetadata> {
    let mut cursor = Cursor::new(bytes);
    let exif = Reader::new()
        .read_from_container(&mut cursor)
        .context("no EXIF data found")?;

    let latitude = get_gps_coord(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef);
    let longitude = get_gps_coord(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef);

    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        anyhow::bail!("no GPS coordinates in EXIF data");
    };

    Ok(ExtractedMetadata {
        sha256: sha256_hex(bytes),
        latitude,
        longitude,
        timestamp: get_datetime(&exif).unwrap_or_else(Utc::now),
    })
}

/// Degrees/minutes/seconds rationals to a signed decimal coordinate
fn get_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let coord_field = exif.get_field(coord_tag, In::PRIMARY)?;
    let ref_field = exif.get_field(ref_tag, In::PRIMARY)?;

    let Value::Rational(ref vec) = coord_field.value else {
        return None;
    };
    if vec.len() != 3 {
        return None;
    }

    let mut decimal = vec[0].to_f64() + vec[1].to_f64() / 60.0 + vec[2].to_f64() / 3600.0;

    // S and W hemispheres are negative
    if let Some(reference) = ref_field.display_value().to_string().chars().next() {
        if reference == 'S' || reference == 'W' {
            decimal *= -1.0;
        }
    }
    Some(decimal)
}

fn get_datetime(exif: &exif::Exif) -> Option<DateTime<Utc>> {
    let try_tags = [Tag::DateTimeOriginal, Tag::DateTime];

    for &tag in &try_tags {
        let Some(field) = exif.get_field(tag, In::PRIMARY) else {
            continue;
        };
        let Value::Ascii(ref vec) = field.value else {
            continue;
        };
        let Some(raw) = vec.first() else {
            continue;
        };
        // EXIF format: "YYYY:MM:DD HH:MM:SS"
        if let Ok(s) = std::str::from_utf8(raw) {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s.trim(), "%Y:%m:%d %H:%M:%S") {
                return Some(naive.and_utc());
            }
        }
    }
    None
}

/// Content hash used as the canonical photo identifier
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_matches_known_vector() {
        // sha256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        assert!(extract_metadata(b"definitely not a JPEG").is_err());
    }
}
