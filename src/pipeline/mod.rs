//! Pipeline stages and external collaborators.
//!
//! ## Data Flow
//!
//! ```text
//! prompt ──▶ llm ──▶ parse ──▶ (document) ──▶ images ──▶ proxy ──▶ export
//!           (text)  (JSON or             (URLs)     (bytes)
//!                    fallback)
//! ```
//!
//! 1. [`llm`]    — completion client seam, retry/backoff, client resolution
//! 2. [`parse`]  — last-JSON-object extraction, key points, fallback sections
//! 3. [`images`] — image client seam, circuit breaker, bulk and single-shot passes
//! 4. [`proxy`]  — fetch a remote image and hand back bytes / a data URL

pub mod images;
pub mod llm;
pub mod parse;
pub mod proxy;
