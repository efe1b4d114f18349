//! Configuration types for document generation and image enhancement.
//!
//! Text generation is controlled through [`GenerationConfig`], built via its
//! [`GenerationConfigBuilder`]. The image pass has its own smaller
//! [`ImageConfig`] because it runs as a separate phase, often much later
//! than generation (e.g. from the CLI `images` command).

use crate::document::DocumentKind;
use crate::error::PitchforgeError;
use crate::pipeline::llm::CompletionClient;
use crate::progress::GenerationProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default OpenAI-compatible endpoint used by the raw HTTP clients.
pub const DEFAULT_API_BASE: &str = "https://api.aimlapi.com/v1";

/// Default chat model for the raw HTTP client.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for a generation run.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use pitchforge::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .temperature(0.5)
///     .max_retries(2)
///     .section_delay_ms(0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// LLM model identifier, e.g. "gpt-4o". If None, uses provider default.
    pub model: Option<String>,

    /// `edgequake_llm` provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed completion client. Takes precedence over everything else.
    pub client: Option<Arc<dyn CompletionClient>>,

    /// Base URL for the raw OpenAI-compatible client. Default: [`DEFAULT_API_BASE`].
    pub api_base: String,

    /// API key for the raw client. Falls back to `AIML_API_KEY` when None.
    pub api_key: Option<String>,

    /// Sampling temperature. Range 0.0–2.0. Default: 0.7.
    pub temperature: f32,

    /// Maximum completion tokens per section. None = 2000 (deck) / 1500 (plan).
    pub max_tokens: Option<usize>,

    /// Retries after a failed completion call. Default: 1.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Pause between sections. None = 300 ms (deck) / 500 ms (plan).
    ///
    /// Not applied after the final section.
    pub section_delay_ms: Option<u64>,

    /// Thresholds for deriving key points from prose.
    pub key_point_rules: KeyPointRules,

    /// Optional per-section progress callback.
    pub progress_callback: Option<Arc<dyn GenerationProgressCallback>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            client: None,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: None,
            max_retries: 1,
            retry_backoff_ms: 500,
            section_delay_ms: None,
            key_point_rules: KeyPointRules::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|_| "<dyn CompletionClient>"))
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("section_delay_ms", &self.section_delay_ms)
            .field("key_point_rules", &self.key_point_rules)
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Effective completion budget for a document kind.
    pub fn max_tokens_for(&self, kind: DocumentKind) -> usize {
        self.max_tokens.unwrap_or(match kind {
            DocumentKind::PitchDeck => 2000,
            DocumentKind::BusinessPlan => 1500,
        })
    }

    /// Effective inter-section delay for a document kind.
    pub fn section_delay_for(&self, kind: DocumentKind) -> u64 {
        self.section_delay_ms.unwrap_or(match kind {
            DocumentKind::PitchDeck => 300,
            DocumentKind::BusinessPlan => 500,
        })
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl fmt::Debug for GenerationConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl GenerationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(10);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn section_delay_ms(mut self, ms: u64) -> Self {
        self.config.section_delay_ms = Some(ms);
        self
    }

    pub fn key_point_rules(mut self, rules: KeyPointRules) -> Self {
        self.config.key_point_rules = rules;
        self
    }

    /// Register a callback that receives per-section events.
    pub fn progress_callback(mut self, cb: Arc<dyn GenerationProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, PitchforgeError> {
        let c = &self.config;
        if c.max_tokens == Some(0) {
            return Err(PitchforgeError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_base.is_empty() {
            return Err(PitchforgeError::InvalidConfig(
                "api_base must not be empty".into(),
            ));
        }
        c.key_point_rules.validate()?;
        Ok(self.config)
    }
}

// ── Key points ───────────────────────────────────────────────────────────

/// Thresholds used when key points are derived from section prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPointRules {
    /// Hard cap on key points per section. Default: 5.
    pub max_points: usize,
    /// Paragraphs inspected when no list lines exist. Default: 4.
    pub max_paragraphs: usize,
    /// A first sentence must be longer than this to count. Default: 20.
    pub min_sentence_chars: usize,
}

impl Default for KeyPointRules {
    fn default() -> Self {
        Self {
            max_points: 5,
            max_paragraphs: 4,
            min_sentence_chars: 20,
        }
    }
}

impl KeyPointRules {
    fn validate(&self) -> Result<(), PitchforgeError> {
        if self.max_points == 0 {
            return Err(PitchforgeError::InvalidConfig(
                "key_point_rules.max_points must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

// ── Images ───────────────────────────────────────────────────────────────

/// Configuration for the image-enhancement pass.
#[derive(Clone)]
pub struct ImageConfig {
    /// Base URL of the image API. Default: [`DEFAULT_API_BASE`].
    pub api_base: String,
    /// API key. Falls back to `AIML_API_KEY` when None.
    pub api_key: Option<String>,
    /// Default: "dall-e-3".
    pub model: String,
    /// Default: "1024x1024".
    pub size: String,
    /// Default: "hd".
    pub quality: String,
    /// Per-call timeout. Default: 300 s.
    pub image_timeout_secs: u64,
    /// Pause between calls, independent of outcome. Default: 1000 ms.
    pub image_delay_ms: u64,
    /// Consecutive failures that open the breaker. Default: 3.
    pub breaker_threshold: u32,
    pub progress_callback: Option<Arc<dyn GenerationProgressCallback>>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            quality: "hd".to_string(),
            image_timeout_secs: 300,
            image_delay_ms: 1000,
            breaker_threshold: 3,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ImageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("size", &self.size)
            .field("quality", &self.quality)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("image_delay_ms", &self.image_delay_ms)
            .field("breaker_threshold", &self.breaker_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_document_kind() {
        let c = GenerationConfig::default();
        assert_eq!(c.max_tokens_for(DocumentKind::PitchDeck), 2000);
        assert_eq!(c.max_tokens_for(DocumentKind::BusinessPlan), 1500);
        assert_eq!(c.section_delay_for(DocumentKind::PitchDeck), 300);
        assert_eq!(c.section_delay_for(DocumentKind::BusinessPlan), 500);
        assert_eq!(c.max_retries, 1);
        assert!((c.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn overrides_win_over_kind_defaults() {
        let c = GenerationConfig::builder()
            .max_tokens(800)
            .section_delay_ms(0)
            .build()
            .unwrap();
        assert_eq!(c.max_tokens_for(DocumentKind::BusinessPlan), 800);
        assert_eq!(c.section_delay_for(DocumentKind::PitchDeck), 0);
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = GenerationConfig::builder()
            .temperature(9.0)
            .api_base("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.api_base, "http://localhost:8080/v1");

        let err = GenerationConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, PitchforgeError::InvalidConfig(_)));

        let err = GenerationConfig::builder()
            .key_point_rules(KeyPointRules {
                max_points: 0,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_points"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = GenerationConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(format!("{:?}", ImageConfig::default()).contains("dall-e-3"));
    }
}
