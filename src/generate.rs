//! Eager (whole-document) generation entry points.
//!
//! Sections are generated strictly in template order because each prompt
//! quotes the sections before it. Every failure below the document level is
//! absorbed: a section that cannot be generated gets fallback content, and a
//! run that breaks entirely (invalid template table, panic in a
//! collaborator) yields a document made only of fallback sections. The
//! caller always receives a complete [`Document`].
//!
//! Use [`crate::stream::generate_stream`] to observe the run as a sequence
//! of [`crate::state::GenerationState`] values instead.

use crate::config::GenerationConfig;
use crate::document::{Document, DocumentRequest, GeneratedSection};
use crate::error::{PitchforgeError, SectionError};
use crate::pipeline::llm::{complete_with_retry, resolve_completion_client, CompletionClient, CompletionRequest};
use crate::pipeline::parse::{fallback_section, parse_or_fallback};
use crate::prompts::{build_section_prompt, system_prompt};
use crate::state::GenerationEvent;
use crate::templates::{templates_for, validate_templates, GenerationTemplate};
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// How a section slot was filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum SectionOutcome {
    /// The model's reply was used.
    Generated,
    /// Placeholder content was used; the error says why.
    Fallback(SectionError),
}

impl SectionOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, SectionOutcome::Fallback(_))
    }

    pub fn error(&self) -> Option<&SectionError> {
        match self {
            SectionOutcome::Generated => None,
            SectionOutcome::Fallback(e) => Some(e),
        }
    }
}

/// Aggregate numbers for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total_sections: usize,
    pub generated_sections: usize,
    pub fallback_sections: usize,
    pub total_retries: u32,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_duration_ms: u64,
    /// The run broke as a whole and every section holds fallback content.
    pub whole_fallback: bool,
}

/// Result of a generation run: the document plus per-section detail.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub document: Document,
    /// One entry per section, in document order.
    pub outcomes: Vec<SectionOutcome>,
    pub stats: GenerationStats,
}

/// Resolve the completion client from `config` and generate a document
/// from the built-in template table for `request.kind`.
///
/// # Errors
/// Only when no completion client can be resolved. Generation itself never
/// fails.
pub async fn generate(
    request: &DocumentRequest,
    extracted_text: Option<&str>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, PitchforgeError> {
    let client = resolve_completion_client(config)?;
    Ok(generate_document(
        request,
        templates_for(request.kind),
        client.as_ref(),
        extracted_text,
        config,
    )
    .await)
}

/// Generate a full document, one section per template.
pub async fn generate_document(
    request: &DocumentRequest,
    templates: &[GenerationTemplate],
    client: &dyn CompletionClient,
    extracted_text: Option<&str>,
    config: &GenerationConfig,
) -> GenerationOutput {
    run_with_events(request, templates, client, extracted_text, config, None).await
}

/// Generate (or regenerate) a single section. Never fails.
pub async fn generate_section(
    template: &GenerationTemplate,
    request: &DocumentRequest,
    previous: &[GeneratedSection],
    extracted_text: Option<&str>,
    client: &dyn CompletionClient,
    config: &GenerationConfig,
) -> (GeneratedSection, SectionOutcome) {
    let run = run_section(template, request, previous, extracted_text, client, config).await;
    (run.section, run.outcome)
}

/// Document made entirely of fallback sections.
///
/// Uses `templates` when the table is valid, otherwise the built-in table
/// for the request's kind.
pub fn fallback_document(
    request: &DocumentRequest,
    templates: &[GenerationTemplate],
    reason: &str,
) -> GenerationOutput {
    let table = if validate_templates(templates).is_ok() {
        templates
    } else {
        templates_for(request.kind)
    };
    let now = Utc::now();
    let sections: Vec<GeneratedSection> = table.iter().map(fallback_section).collect();
    let outcomes = table
        .iter()
        .map(|t| {
            SectionOutcome::Fallback(SectionError::PipelineAborted {
                section: t.order,
                detail: reason.to_string(),
            })
        })
        .collect();
    let total = sections.len();
    GenerationOutput {
        document: Document::assemble(request, sections, now, now),
        outcomes,
        stats: GenerationStats {
            total_sections: total,
            fallback_sections: total,
            whole_fallback: true,
            ..Default::default()
        },
    }
}

struct SectionRun {
    section: GeneratedSection,
    outcome: SectionOutcome,
    retries: u32,
    prompt_tokens: u64,
    completion_tokens: u64,
}

async fn run_section(
    template: &GenerationTemplate,
    request: &DocumentRequest,
    previous: &[GeneratedSection],
    extracted_text: Option<&str>,
    client: &dyn CompletionClient,
    config: &GenerationConfig,
) -> SectionRun {
    let completion = CompletionRequest {
        system: system_prompt(request.kind).to_string(),
        user: build_section_prompt(template, request, previous, extracted_text),
        max_tokens: config.max_tokens_for(request.kind),
        temperature: config.temperature,
    };

    match complete_with_retry(
        client,
        &completion,
        template.order,
        config.max_retries,
        config.retry_backoff_ms,
    )
    .await
    {
        Ok(attempt) => {
            let (section, outcome) =
                parse_or_fallback(&attempt.response.content, template, &config.key_point_rules);
            SectionRun {
                section,
                outcome,
                retries: attempt.retries,
                prompt_tokens: attempt.response.prompt_tokens as u64,
                completion_tokens: attempt.response.completion_tokens as u64,
            }
        }
        Err(e) => {
            warn!("{}; using fallback content", e);
            SectionRun {
                section: fallback_section(template),
                outcome: SectionOutcome::Fallback(e),
                retries: config.max_retries,
                prompt_tokens: 0,
                completion_tokens: 0,
            }
        }
    }
}

/// Shared driver for [`generate_document`] and the streaming API.
pub(crate) async fn run_with_events(
    request: &DocumentRequest,
    templates: &[GenerationTemplate],
    client: &dyn CompletionClient,
    extracted_text: Option<&str>,
    config: &GenerationConfig,
    events: Option<&UnboundedSender<GenerationEvent>>,
) -> GenerationOutput {
    let emit = |event: GenerationEvent| {
        if let Some(tx) = events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    };

    if let Err(e) = validate_templates(templates) {
        error!("{}; returning fallback document", e);
        let output = fallback_document(request, templates, &e.to_string());
        emit(GenerationEvent::Finished {
            document: Box::new(output.document.clone()),
            whole_fallback: true,
        });
        return output;
    }

    let run = AssertUnwindSafe(run_sections(
        request,
        templates,
        client,
        extracted_text,
        config,
        &emit,
    ))
    .catch_unwind()
    .await;

    let output = match run {
        Ok(output) => output,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!("Generation aborted ({}); returning fallback document", reason);
            fallback_document(request, templates, &reason)
        }
    };

    emit(GenerationEvent::Finished {
        document: Box::new(output.document.clone()),
        whole_fallback: output.stats.whole_fallback,
    });
    output
}

async fn run_sections(
    request: &DocumentRequest,
    templates: &[GenerationTemplate],
    client: &dyn CompletionClient,
    extracted_text: Option<&str>,
    config: &GenerationConfig,
    emit: &(dyn Fn(GenerationEvent) + Sync),
) -> GenerationOutput {
    let total_start = Instant::now();
    let created_at = Utc::now();
    let total = templates.len();
    let delay_ms = config.section_delay_for(request.kind);
    info!(
        "Generating {} for '{}' ({} sections)",
        request.kind, request.company_name, total
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(total);
    }
    emit(GenerationEvent::Started { total });

    let mut sections: Vec<GeneratedSection> = Vec::with_capacity(total);
    let mut outcomes = Vec::with_capacity(total);
    let mut stats = GenerationStats {
        total_sections: total,
        ..Default::default()
    };

    for (i, template) in templates.iter().enumerate() {
        // ── Step 1: Announce ──
        debug!("Generating section {}/{}: {}", i + 1, total, template.title);
        if let Some(ref cb) = config.progress_callback {
            cb.on_section_start(template.order, total, template.title);
        }
        emit(GenerationEvent::SectionStarted {
            section_number: template.order,
            title: template.title.to_string(),
        });

        // ── Step 2: Prompt, call, parse ──
        let run = run_section(template, request, &sections, extracted_text, client, config).await;

        // ── Step 3: Record ──
        stats.total_retries += run.retries;
        stats.total_prompt_tokens += run.prompt_tokens;
        stats.total_completion_tokens += run.completion_tokens;
        if run.outcome.is_fallback() {
            stats.fallback_sections += 1;
        } else {
            stats.generated_sections += 1;
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_section_complete(i + 1, total, &run.outcome);
        }
        emit(GenerationEvent::SectionResolved {
            completed: i + 1,
            total,
            fallback: run.outcome.is_fallback(),
        });

        sections.push(run.section);
        outcomes.push(run.outcome);

        // ── Step 4: Pace ──
        if i + 1 < total && delay_ms > 0 {
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Generation complete: {}/{} sections from the model, {} fallback, {}ms",
        stats.generated_sections, total, stats.fallback_sections, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(total, stats.fallback_sections);
    }

    GenerationOutput {
        document: Document::assemble(request, sections, created_at, Utc::now()),
        outcomes,
        stats,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::sample_request;
    use crate::document::SectionKind;
    use crate::error::CompletionError;
    use crate::pipeline::llm::CompletionResponse;
    use crate::templates::PITCH_DECK_TEMPLATES;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl CompletionClient for Fixed {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
                prompt_tokens: 10,
                completion_tokens: 5,
            })
        }
    }

    fn fast_config() -> GenerationConfig {
        GenerationConfig::builder()
            .section_delay_ms(0)
            .retry_backoff_ms(0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn single_section_uses_model_reply() {
        let (section, outcome) = generate_section(
            &PITCH_DECK_TEMPLATES[2],
            &sample_request(),
            &[],
            None,
            &Fixed(r#"{"content":"• A\n• B"}"#),
            &fast_config(),
        )
        .await;
        assert_eq!(outcome, SectionOutcome::Generated);
        assert_eq!(section.section_kind, SectionKind::Solution);
        assert_eq!(section.key_points, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn stats_count_tokens() {
        let out = generate_document(
            &sample_request(),
            &PITCH_DECK_TEMPLATES[..2],
            &Fixed(r#"{"content":"x"}"#),
            None,
            &fast_config(),
        )
        .await;
        assert_eq!(out.stats.generated_sections, 2);
        assert_eq!(out.stats.total_prompt_tokens, 20);
        assert_eq!(out.stats.total_completion_tokens, 10);
        assert!(!out.stats.whole_fallback);
    }

    #[test]
    fn fallback_document_replaces_invalid_table() {
        let mut bad = PITCH_DECK_TEMPLATES[..2].to_vec();
        bad[1].order = 7;
        let out = fallback_document(&sample_request(), &bad, "broken");
        assert_eq!(out.document.total_sections, 10);
        assert!(out.stats.whole_fallback);
        assert!(out.outcomes.iter().all(|o| o.is_fallback()));
    }

    #[test]
    fn outcome_serialises_tagged() {
        let json = serde_json::to_value(SectionOutcome::Generated).unwrap();
        assert_eq!(json["status"], "generated");
    }
}
