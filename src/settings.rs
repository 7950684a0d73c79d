use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::constants::DEFAULT_PORT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub port: u16,
    /// Overrides the platform application data directory when set
    pub data_dir: Option<String>,
    /// Public base URL of the site, used for share links
    pub public_url: Option<String>,
    /// Token expected in the X-CSRFToken header on RPC calls
    pub csrf_token: String,
    pub geocoder_endpoint: String,
    pub geocoder_api_key: Option<String>,
    /// Direct-upload endpoint of the image host
    pub imagehost_endpoint: Option<String>,
    pub imagehost_api_key: Option<String>,
    /// CDN base used to build display URLs for newly added photos
    pub cdn_base: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: None,
            public_url: None,
            csrf_token: "dev-token".to_string(),
            geocoder_endpoint: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            geocoder_api_key: None,
            imagehost_endpoint: None,
            imagehost_api_key: None,
            cdn_base: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    fn load_from(config_path: &PathBuf) -> Result<Self> {
        let mut settings = Settings::default();
        if !config_path.exists() {
            return Ok(settings);
        }

        let file = File::open(config_path).context("Failed to open config file")?;
        let reader = BufReader::new(file);
        let mut config_map = HashMap::new();

        for line in reader.lines() {
            let line = line.context("Failed to read line from config")?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config_map.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        if let Some(port_str) = config_map.get("port") {
            if let Ok(port) = port_str.parse::<u16>() {
                settings.port = port;
            }
        }
        if let Some(data_dir) = config_map.get("data_dir") {
            settings.data_dir = Some(data_dir.trim_matches('"').to_string());
        }
        if let Some(public_url) = config_map.get("public_url") {
            settings.public_url = Some(public_url.trim_matches('"').to_string());
        }
        if let Some(token) = config_map.get("csrf_token") {
            settings.csrf_token = token.trim_matches('"').to_string();
        }
        if let Some(endpoint) = config_map.get("geocoder_endpoint") {
            settings.geocoder_endpoint = endpoint.trim_matches('"').to_string();
        }
        if let Some(key) = config_map.get("geocoder_api_key") {
            settings.geocoder_api_key = Some(key.trim_matches('"').to_string());
        }
        if let Some(endpoint) = config_map.get("imagehost_endpoint") {
            settings.imagehost_endpoint = Some(endpoint.trim_matches('"').to_string());
        }
        if let Some(key) = config_map.get("imagehost_api_key") {
            settings.imagehost_api_key = Some(key.trim_matches('"').to_string());
        }
        if let Some(base) = config_map.get("cdn_base") {
            settings.cdn_base = Some(base.trim_matches('"').to_string());
        }

        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    fn save_to(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Creating config directory")?;
        }

        let mut content = String::new();
        content.push_str("# CatMap Configuration File\n");
        content.push_str(&format!("port = {}\n", self.port));
        if let Some(ref data_dir) = self.data_dir {
            content.push_str(&format!("data_dir = \"{}\"\n", data_dir));
        }
        if let Some(ref public_url) = self.public_url {
            content.push_str(&format!("public_url = \"{}\"\n", public_url));
        }
        content.push_str(&format!("csrf_token = \"{}\"\n", self.csrf_token));
        content.push_str(&format!("geocoder_endpoint = \"{}\"\n", self.geocoder_endpoint));
        if let Some(ref key) = self.geocoder_api_key {
            content.push_str(&format!("geocoder_api_key = \"{}\"\n", key));
        }
        if let Some(ref endpoint) = self.imagehost_endpoint {
            content.push_str(&format!("imagehost_endpoint = \"{}\"\n", endpoint));
        }
        if let Some(ref key) = self.imagehost_api_key {
            content.push_str(&format!("imagehost_api_key = \"{}\"\n", key));
        }
        if let Some(ref base) = self.cdn_base {
            content.push_str(&format!("cdn_base = \"{}\"\n", base));
        }

        std::fs::write(config_path, content).context("Failed to write to config file")?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let mut path = std::env::current_exe()
            .unwrap_or_default()
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .to_path_buf();

        if path.ends_with("target/debug") || path.ends_with("target/release") {
            path.pop();
            path.pop();
        }
        path.push("catmap.ini");
        path
    }
}
