//! Error types for the pitchforge library.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! * [`PitchforgeError`] — **Fatal** for the operation that raised it.
//!   Returned from explicit operations (store access, export, single-shot
//!   image generation, provider resolution).
//!
//! * [`SectionError`] — **Non-fatal**: one section could not be generated
//!   and was filled with fallback content. Recorded in
//!   [`crate::generate::SectionOutcome`] so callers can see which slots
//!   hold placeholder text; never propagated out of the pipeline.
//!
//! * [`CompletionError`], [`ImageError`], [`ProxyError`] — failures reported
//!   by the external collaborators. The pipelines translate them into
//!   fallbacks or skipped images.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pitchforge library.
#[derive(Debug, Error)]
pub enum PitchforgeError {
    // ── Provider / config errors ─────────────────────────────────────────
    /// The completion provider could not be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The image provider could not be initialised.
    #[error("Image provider is not configured.\n{hint}")]
    ImageProviderNotConfigured { hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A template table violates the contiguous-order invariant.
    #[error("Invalid template table: {0}")]
    InvalidTemplates(String),

    // ── Document errors ──────────────────────────────────────────────────
    /// Section index outside `0..total`.
    #[error("Section {index} is out of range (document has {total} sections)")]
    InvalidSectionIndex { index: usize, total: usize },

    /// No document with this id exists in the store.
    #[error("Document '{id}' not found")]
    DocumentNotFound { id: String },

    /// No investor with this id exists in the store.
    #[error("Investor '{id}' not found")]
    InvestorNotFound { id: String },

    /// An explicitly requested image generation failed.
    #[error("Image generation failed for section {section}: {source}")]
    ImageGenerationFailed {
        section: usize,
        #[source]
        source: ImageError,
    },

    // ── Store errors ─────────────────────────────────────────────────────
    /// A store file exists but could not be read.
    #[error("Failed to read store '{path}': {source}")]
    StoreReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A store file is not a valid JSON collection.
    #[error("Store '{path}' is corrupt: {detail}\nRefusing to overwrite it.")]
    StoreCorrupt { path: PathBuf, detail: String },

    /// A store file could not be written.
    #[error("Failed to write store '{path}': {source}")]
    StoreWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Export errors ────────────────────────────────────────────────────
    /// The PDF object graph could not be serialised.
    #[error("PDF assembly failed: {0}")]
    PdfAssembly(String),

    /// A string could not be encoded for a PDF text operator.
    #[error("Text cannot be placed in PDF: unsupported character {ch:?}")]
    TextEncoding { ch: char },

    /// Could not create or write an export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single section.
///
/// The section slot is still filled (with fallback content); this records why.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SectionError {
    /// The completion call failed after all retries.
    #[error("Section {section}: completion failed after {retries} retries: {detail}")]
    Transport {
        section: usize,
        retries: u32,
        detail: String,
    },

    /// The reply contained no parseable JSON object.
    #[error("Section {section}: malformed response: {detail}")]
    MalformedResponse { section: usize, detail: String },

    /// A JSON object was found but a required field was missing or empty.
    #[error("Section {section}: response is missing required field '{field}'")]
    MissingField { section: usize, field: String },

    /// The whole run was abandoned before this section resolved.
    #[error("Section {section}: generation aborted: {detail}")]
    PipelineAborted { section: usize, detail: String },
}

/// Failure reported by a text-completion collaborator.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// Non-2xx HTTP status.
    #[error("completion API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, DNS, TLS or timeout failure.
    #[error("completion transport error: {0}")]
    Transport(String),

    /// 2xx response whose body did not match the expected shape.
    #[error("completion response malformed: {0}")]
    Malformed(String),

    /// Error surfaced by an `edgequake_llm` provider.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Failure of one image-generation attempt.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// Non-2xx HTTP status.
    #[error("image API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, DNS or TLS failure.
    #[error("image transport error: {0}")]
    Transport(String),

    /// The call exceeded the configured timeout.
    #[error("image generation timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response carried no image URL.
    #[error("image API returned no image")]
    EmptyResponse,
}

/// Failure while fetching and re-encoding a remote image.
#[derive(Debug, Clone, Error)]
#[error("image fetch failed ({status:?}): {detail}")]
pub struct ProxyError {
    /// Upstream HTTP status, if a response was received.
    pub status: Option<u16>,
    /// `true` when the upstream image is gone (403 / 404).
    pub expired: bool,
    pub detail: String,
}

impl ProxyError {
    pub(crate) fn from_status(status: u16) -> Self {
        Self {
            status: Some(status),
            expired: status == 403 || status == 404,
            detail: format!("HTTP {status}"),
        }
    }

    pub(crate) fn other(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            expired: false,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_index_display() {
        let e = PitchforgeError::InvalidSectionIndex { index: 12, total: 10 };
        let msg = e.to_string();
        assert!(msg.contains("12"), "got: {msg}");
        assert!(msg.contains("10 sections"), "got: {msg}");
    }

    #[test]
    fn section_error_display() {
        let e = SectionError::MissingField {
            section: 4,
            field: "content".into(),
        };
        assert!(e.to_string().contains("Section 4"));
        assert!(e.to_string().contains("content"));
    }

    #[test]
    fn proxy_error_expired_on_gone_statuses() {
        assert!(ProxyError::from_status(403).expired);
        assert!(ProxyError::from_status(404).expired);
        assert!(!ProxyError::from_status(500).expired);
        assert!(!ProxyError::other("dns").expired);
    }

    #[test]
    fn image_failure_carries_source() {
        let e = PitchforgeError::ImageGenerationFailed {
            section: 3,
            source: ImageError::Timeout { secs: 300 },
        };
        assert!(e.to_string().contains("300s"));
    }
}
