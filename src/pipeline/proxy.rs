//! Remote image → base64 data URL.
//!
//! Generated image URLs are short-lived and usually served from another
//! origin. Export fetches them through an [`ImageFetcher`] and works only
//! with the returned bytes. `data:` URLs are decoded locally without a
//! network round trip.

use crate::error::ProxyError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("pitchforge/", env!("CARGO_PKG_VERSION"));

/// Raw image bytes plus their declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// `data:<type>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.bytes))
    }
}

/// Wire shape of a re-encoding reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expired: bool,
}

impl ProxyResponse {
    pub fn from_result(result: &Result<EncodedImage, ProxyError>) -> Self {
        match result {
            Ok(img) => Self {
                success: true,
                data_url: Some(img.data_url()),
                content_type: Some(img.content_type.clone()),
                size: Some(img.bytes.len()),
                error: None,
                expired: false,
            },
            Err(e) => Self {
                success: false,
                data_url: None,
                content_type: None,
                size: None,
                error: Some(e.detail.clone()),
                expired: e.expired,
            },
        }
    }
}

/// Something that can turn an image URL into bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<EncodedImage, ProxyError>;
}

/// Decode a `data:<type>;base64,<payload>` URL.
pub fn decode_data_url(url: &str) -> Result<EncodedImage, ProxyError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ProxyError::other("not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ProxyError::other("data URL has no payload"))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ProxyError::other("data URL is not base64-encoded"))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ProxyError::other(format!("invalid base64: {e}")))?;
    Ok(EncodedImage {
        content_type: if content_type.is_empty() {
            "image/jpeg".to_string()
        } else {
            content_type.to_string()
        },
        bytes,
    })
}

/// Fetches images over HTTP(S); `data:` URLs are decoded in place.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProxyError::other(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<EncodedImage, ProxyError> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        debug!("Fetching image: {}", url.chars().take(100).collect::<String>());

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "image/*")
            .send()
            .await
            .map_err(|e| ProxyError::other(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let err = ProxyError::from_status(status.as_u16());
            warn!("Failed to fetch image: {} (expired: {})", status, err.expired);
            return Err(err);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "image/jpeg".to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::other(e.to_string()))?;

        info!("Fetched image: {} bytes, type {}", bytes.len(), content_type);
        Ok(EncodedImage {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

/// Fetch an image and report it in the re-encoding wire shape.
pub async fn proxy_image(fetcher: &dyn ImageFetcher, url: &str) -> ProxyResponse {
    ProxyResponse::from_result(&fetcher.fetch(url).await)
}
