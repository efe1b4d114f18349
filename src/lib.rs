//! # pitchforge
//!
//! Generate investor pitch decks and business plans section by section with
//! a text-completion model, optionally illustrate them with generated
//! images, and export them as plain text or PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! DocumentRequest
//!  │
//!  ├─ 1. Templates  ordered section table (10 slides / 9 plan sections)
//!  ├─ 2. Prompt     company context + earlier sections + extracted text
//!  ├─ 3. Complete   one chat completion per section, retried with backoff
//!  ├─ 4. Parse      last JSON object in the reply, or fallback content
//!  ├─ 5. Assemble   Document with every slot filled
//!  ├─ 6. Images     optional pass guarded by a circuit breaker
//!  └─ 7. Export     text, speaker/investor PDF, one-page summary PDF
//! ```
//!
//! Generation never fails once a completion client exists: a section whose
//! call or parse fails is filled with fallback text, and
//! [`SectionOutcome`] records why.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pitchforge::{generate, DocumentRequest, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from AIML_API_KEY / OPENAI_API_KEY / …
//!     let request = DocumentRequest {
//!         company_name: "Acme".into(),
//!         prompt: "A marketplace for refurbished lab equipment".into(),
//!         target_funding: "$2M".into(),
//!         team_size: 4,
//!         ..Default::default()
//!     };
//!     let output = generate(&request, None, &GenerationConfig::default()).await?;
//!     println!("{}", pitchforge::export_text(&output.document));
//!     eprintln!("{} of {} sections used fallback content",
//!         output.stats.fallback_sections,
//!         output.stats.total_sections);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pitchforge` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pitchforge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod generate;
pub mod investor;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod state;
pub mod store;
pub mod stream;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder, ImageConfig, KeyPointRules};
pub use document::{
    Document, DocumentKind, DocumentRequest, ExtractedDocument, FundingStage, GeneratedSection, Industry,
    SectionKind,
};
pub use error::{CompletionError, ImageError, PitchforgeError, ProxyError, SectionError};
pub use export::{export_pdf, export_text, render_pdf, sanitize_for_pdf, PdfVariant, ResolvedImages};
pub use generate::{
    fallback_document, generate, generate_document, generate_section, GenerationOutput, GenerationStats,
    SectionOutcome,
};
pub use pipeline::images::{enhance_images, generate_section_image, CircuitBreaker, ImagePassReport};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use state::{GenerationEvent, GenerationPhase, GenerationProgress, GenerationState};
pub use investor::{Investor, InvestorStatus};
pub use store::{DocumentStore, InvestorStore};
pub use stream::{generate_stream, StateStream};
pub use templates::{templates_for, GenerationTemplate};
