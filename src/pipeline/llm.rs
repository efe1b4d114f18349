//! Text completion: the collaborator seam plus retry/backoff.
//!
//! The pipeline talks to a [`CompletionClient`], never to a provider SDK
//! directly. Two implementations ship with the crate:
//!
//! * [`EdgequakeCompletionClient`] wraps any `edgequake_llm` provider
//!   (OpenAI, Anthropic, Ollama, … resolved from the environment).
//! * [`HttpCompletionClient`] speaks the bare OpenAI-compatible
//!   `/chat/completions` wire format through reqwest, for gateways that are
//!   not covered by a provider.
//!
//! ## Retry Strategy
//!
//! Calls are retried `max_retries` times with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`). Sections are generated one at a
//! time, so retries never overlap.

use crate::config::{GenerationConfig, DEFAULT_MODEL};
use crate::error::{CompletionError, PitchforgeError, SectionError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// One completion request: a system message plus a single user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// The model's reply and token accounting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A text-completion collaborator.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, CompletionError>;
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// Adapter over an `edgequake_llm` provider.
pub struct EdgequakeCompletionClient {
    provider: Arc<dyn LLMProvider>,
}

impl EdgequakeCompletionClient {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CompletionClient for EdgequakeCompletionClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let messages = vec![
            ChatMessage::system(request.system.as_str()),
            ChatMessage::user(request.user.as_str()),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CompletionError::Provider(format!("{e}")))?;
        Ok(CompletionResponse {
            content: response.content,
            prompt_tokens: response.prompt_tokens as usize,
            completion_tokens: response.completion_tokens as usize,
        })
    }
}

// ── Raw OpenAI-compatible HTTP client ────────────────────────────────────

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Client for `POST {base}/chat/completions`.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpCompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequestBody {
            model: &self.model,
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponseBody = resp
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| CompletionError::Malformed("no choices[0].message.content".into()))?;

        let (prompt_tokens, completion_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(CompletionResponse {
            content,
            prompt_tokens,
            completion_tokens,
        })
    }
}

// ── Retry loop ───────────────────────────────────────────────────────────

/// Successful completion plus the number of retries it took.
#[derive(Debug, Clone)]
pub struct CompletionAttempt {
    pub response: CompletionResponse,
    pub retries: u32,
    pub duration_ms: u64,
}

/// Call the client, retrying failures with exponential backoff.
///
/// Returns [`SectionError::Transport`] once all attempts are exhausted.
pub async fn complete_with_retry(
    client: &dyn CompletionClient,
    request: &CompletionRequest,
    section: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
) -> Result<CompletionAttempt, SectionError> {
    let start = Instant::now();
    let mut last_err: Option<CompletionError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = retry_backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Section {}: retry {}/{} after {}ms",
                section, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match client.complete(request).await {
            Ok(response) => {
                let duration = start.elapsed();
                debug!(
                    "Section {}: {} input tokens, {} output tokens, {:?}",
                    section, response.prompt_tokens, response.completion_tokens, duration
                );
                return Ok(CompletionAttempt {
                    response,
                    retries: attempt,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Err(e) => {
                warn!("Section {}: attempt {} failed: {}", section, attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    Err(SectionError::Transport {
        section,
        retries: max_retries,
        detail: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string()),
    })
}

// ── Client resolution ────────────────────────────────────────────────────

/// Resolve the completion client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`), used as-is.
/// 2. **Named provider** (`config.provider_name`) via
///    [`ProviderFactory::create_llm_provider`].
/// 3. **Environment pair** `PITCHFORGE_LLM_PROVIDER` + `PITCHFORGE_MODEL`.
/// 4. **Raw gateway key** (`config.api_key` or `AIML_API_KEY`): the bare
///    HTTP client against `config.api_base`.
/// 5. **`OPENAI_API_KEY`** through the OpenAI provider.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_completion_client(
    config: &GenerationConfig,
) -> Result<Arc<dyn CompletionClient>, PitchforgeError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return named_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("PITCHFORGE_LLM_PROVIDER"),
        std::env::var("PITCHFORGE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return named_provider(&prov, &env_model);
        }
    }

    let gateway_key = config
        .api_key
        .clone()
        .or_else(|| std::env::var("AIML_API_KEY").ok())
        .filter(|k| !k.is_empty());
    if let Some(key) = gateway_key {
        info!("Using OpenAI-compatible endpoint {} ({})", config.api_base, model);
        return Ok(Arc::new(HttpCompletionClient::new(
            config.api_base.clone(),
            key,
            model,
        )));
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return named_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PitchforgeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set AIML_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(EdgequakeCompletionClient::new(llm_provider)))
}

fn named_provider(name: &str, model: &str) -> Result<Arc<dyn CompletionClient>, PitchforgeError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        PitchforgeError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(EdgequakeCompletionClient::new(provider)))
}
