use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::PhotoUrls;
use crate::settings::Settings;

/// One-time direct-upload grant from the image host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTicket {
    pub id: String,
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
}

#[derive(Debug, Deserialize)]
struct DirectUploadResponse {
    result: UploadTicket,
}

/// Client for the image host's direct-upload API and CDN URL scheme
pub struct ImageHost {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    cdn_base: Option<String>,
}

impl ImageHost {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: settings.imagehost_endpoint.clone(),
            api_key: settings.imagehost_api_key.clone(),
            cdn_base: settings.cdn_base.clone(),
        }
    }

    /// Requests a fresh upload URL. The caller uploads the file there
    /// directly; the returned id becomes the photo's asset id.
    pub async fn create_upload_url(&self) -> Result<UploadTicket> {
        let endpoint = self
            .endpoint
            .as_ref()
            .context("no image host endpoint configured")?;
        let api_key = self
            .api_key
            .as_ref()
            .context("no image host API key configured")?;

        let response: DirectUploadResponse = self
            .client
            .post(endpoint)
            .bearer_auth(api_key)
            .send()
            .await
            .context("direct upload request failed")?
            .json()
            .await
            .context("image host returned malformed JSON")?;

        Ok(response.result)
    }

    /// Display URLs for an asset id on the CDN
    pub fn urls_for(&self, asset_id: &str) -> PhotoUrls {
        let base = self
            .cdn_base
            .as_deref()
            .unwrap_or("https://imagedelivery.example")
            .trim_end_matches('/')
            .to_string();
        PhotoUrls {
            desktop: format!("{}/{}/desktop", base, asset_id),
            smol: format!("{}/{}/smol", base, asset_id),
        }
    }
}
