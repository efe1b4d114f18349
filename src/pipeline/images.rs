//! Image enhancement: one illustration per section, best effort.
//!
//! The bulk pass runs after a document is assembled and never fails. A
//! per-run [`CircuitBreaker`] stops calling the image API once it has
//! failed `breaker_threshold` times in a row, so a dead endpoint costs at
//! most a few timeouts instead of one per section.

use crate::config::ImageConfig;
use crate::document::Document;
use crate::error::{ImageError, PitchforgeError};
use crate::prompts::image_prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// An image-generation collaborator. Returns the URL of the generated image.
#[async_trait]
pub trait ImageClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ImageError>;
}

// ── HTTP client ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ImageRequestBody<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Deserialize)]
struct ImageResponseBody {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

/// Client for `POST {base}/images/generations`.
#[derive(Debug, Clone)]
pub struct HttpImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    size: String,
    quality: String,
}

impl HttpImageClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let defaults = ImageConfig::default();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: defaults.model,
            size: defaults.size,
            quality: defaults.quality,
        }
    }

    /// Build from config, reading `AIML_API_KEY` when no key is set.
    pub fn from_config(config: &ImageConfig) -> Result<Self, PitchforgeError> {
        let key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("AIML_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PitchforgeError::ImageProviderNotConfigured {
                hint: "Set AIML_API_KEY or pass --image-api-key.".into(),
            })?;
        Ok(Self {
            model: config.model.clone(),
            size: config.size.clone(),
            quality: config.quality.clone(),
            ..Self::new(config.api_base.clone(), key)
        })
    }
}

#[async_trait]
impl ImageClient for HttpImageClient {
    async fn generate(&self, prompt: &str) -> Result<String, ImageError> {
        let url = format!("{}/images/generations", self.base_url);
        let body = ImageRequestBody {
            model: &self.model,
            prompt,
            size: &self.size,
            quality: &self.quality,
            n: 1,
        };
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ImageError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ImageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ImageResponseBody = resp
            .json()
            .await
            .map_err(|e| ImageError::Transport(format!("invalid response body: {e}")))?;
        parsed
            .data
            .into_iter()
            .find_map(|d| d.url.filter(|u| !u.is_empty()))
            .ok_or(ImageError::EmptyResponse)
    }
}

// ── Circuit breaker ──────────────────────────────────────────────────────

/// Consecutive-failure breaker, scoped to one image pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitBreaker {
    pub consecutive_failures: u32,
    pub open: bool,
}

impl CircuitBreaker {
    pub fn record_success(self) -> Self {
        Self {
            consecutive_failures: 0,
            open: self.open,
        }
    }

    pub fn record_failure(self, threshold: u32) -> Self {
        let consecutive_failures = self.consecutive_failures + 1;
        Self {
            consecutive_failures,
            open: self.open || consecutive_failures >= threshold,
        }
    }
}

// ── Bulk pass ────────────────────────────────────────────────────────────

/// Counts from one image pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImagePassReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sections never attempted because the breaker opened.
    pub skipped: usize,
    pub breaker_opened: bool,
}

/// A single generated image, not yet attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    pub section_index: usize,
    pub url: String,
    pub prompt: String,
}

async fn attempt(
    client: &dyn ImageClient,
    prompt: &str,
    timeout_secs: u64,
) -> Result<String, ImageError> {
    match timeout(Duration::from_secs(timeout_secs), client.generate(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(ImageError::Timeout { secs: timeout_secs }),
    }
}

/// Attach an image to every section of `doc`, best effort.
pub async fn enhance_images(
    doc: &mut Document,
    client: &dyn ImageClient,
    config: &ImageConfig,
) -> ImagePassReport {
    let total = doc.sections.len();
    let mut breaker = CircuitBreaker::default();
    let mut report = ImagePassReport::default();
    info!("Generating images for {} sections of '{}'", total, doc.title);

    for i in 0..total {
        if breaker.open {
            report.skipped = total - i;
            report.breaker_opened = true;
            warn!(
                "Circuit breaker open, skipping image generation for sections {}-{}",
                i + 1,
                total
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_image_skipped(report.skipped);
            }
            break;
        }

        if i > 0 {
            sleep(Duration::from_millis(config.image_delay_ms)).await;
        }

        let prompt = image_prompt(doc.sections[i].section_kind, &doc.company_name);
        report.attempted += 1;
        let success = match attempt(client, &prompt, config.image_timeout_secs).await {
            Ok(url) => {
                debug!("Section {}: image ready", i + 1);
                let section = &mut doc.sections[i];
                section.image_url = Some(url);
                section.image_prompt = Some(prompt);
                breaker = breaker.record_success();
                report.succeeded += 1;
                true
            }
            Err(e) => {
                breaker = breaker.record_failure(config.breaker_threshold);
                report.failed += 1;
                warn!(
                    "Section {}: image generation failed ({}/{}): {}",
                    i + 1,
                    breaker.consecutive_failures,
                    config.breaker_threshold,
                    e
                );
                false
            }
        };
        if let Some(ref cb) = config.progress_callback {
            cb.on_image_complete(i + 1, total, success);
        }
    }

    info!(
        "Image generation complete: {}/{} sections have images",
        doc.image_count(),
        total
    );
    report
}

/// Generate one image for the section at `index` (0-based).
///
/// No breaker, no delay; errors are surfaced to the caller.
pub async fn generate_section_image(
    doc: &Document,
    index: usize,
    client: &dyn ImageClient,
    config: &ImageConfig,
) -> Result<GeneratedImage, PitchforgeError> {
    let section = doc
        .sections
        .get(index)
        .ok_or(PitchforgeError::InvalidSectionIndex {
            index,
            total: doc.sections.len(),
        })?;
    let prompt = image_prompt(section.section_kind, &doc.company_name);
    let url = attempt(client, &prompt, config.image_timeout_secs)
        .await
        .map_err(|source| PitchforgeError::ImageGenerationFailed {
            section: index + 1,
            source,
        })?;
    Ok(GeneratedImage {
        section_index: index,
        url,
        prompt,
    })
}
