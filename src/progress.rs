//! Progress-callback trait for per-section generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] (or
//! [`crate::config::ImageConfig::progress_callback`] for the image pass) to
//! receive events as the pipeline fills each section.
//!
//! # Example
//!
//! ```rust
//! use pitchforge::{GenerationProgressCallback, GenerationConfig, SectionOutcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FallbackCounter {
//!     fallbacks: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for FallbackCounter {
//!     fn on_section_complete(&self, completed: usize, total: usize, outcome: &SectionOutcome) {
//!         if outcome.is_fallback() {
//!             self.fallbacks.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("{completed}/{total}");
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(FallbackCounter { fallbacks: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::generate::SectionOutcome;
use std::sync::Arc;

/// Called by the generation and image pipelines as they make progress.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Sections are generated sequentially, so events for
/// one run never overlap.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once before the first section is requested.
    fn on_generation_start(&self, total_sections: usize) {
        let _ = total_sections;
    }

    /// Called just before the completion request for a section.
    ///
    /// # Arguments
    /// * `section_number` — 1-indexed section number
    /// * `title`          — template title
    fn on_section_start(&self, section_number: usize, total_sections: usize, title: &str) {
        let _ = (section_number, total_sections, title);
    }

    /// Called after every section, whether generated or filled with fallback.
    ///
    /// # Arguments
    /// * `completed` — sections resolved so far (1..=total)
    /// * `total`     — sections in the document
    /// * `outcome`   — how the slot was filled
    fn on_section_complete(&self, completed: usize, total: usize, outcome: &SectionOutcome) {
        let _ = (completed, total, outcome);
    }

    /// Called once after all sections have been resolved.
    ///
    /// # Arguments
    /// * `total_sections` — sections in the document
    /// * `fallback_count` — sections holding placeholder content
    fn on_generation_complete(&self, total_sections: usize, fallback_count: usize) {
        let _ = (total_sections, fallback_count);
    }

    /// Called after each image attempt during the image pass.
    fn on_image_complete(&self, section_number: usize, total_sections: usize, success: bool) {
        let _ = (section_number, total_sections, success);
    }

    /// Called once when the breaker opens, with the number of sections skipped.
    fn on_image_skipped(&self, skipped: usize) {
        let _ = skipped;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SectionError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        fallbacks: AtomicUsize,
        images: AtomicUsize,
        skipped: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_section_start(&self, _n: usize, _total: usize, _title: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_complete(&self, _completed: usize, _total: usize, outcome: &SectionOutcome) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            if outcome.is_fallback() {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_image_complete(&self, _n: usize, _total: usize, _success: bool) {
            self.images.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_skipped(&self, skipped: usize) {
            self.skipped.store(skipped, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_generation_start(10);
        cb.on_section_start(1, 10, "Title");
        cb.on_section_complete(1, 10, &SectionOutcome::Generated);
        cb.on_generation_complete(10, 0);
        cb.on_image_complete(1, 10, false);
        cb.on_image_skipped(7);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_section_start(1, 2, "Problem");
        tracker.on_section_complete(1, 2, &SectionOutcome::Generated);
        tracker.on_section_start(2, 2, "Solution");
        tracker.on_section_complete(
            2,
            2,
            &SectionOutcome::Fallback(SectionError::MalformedResponse {
                section: 2,
                detail: "no JSON object".into(),
            }),
        );
        tracker.on_image_complete(1, 2, true);
        tracker.on_image_skipped(1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.images.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_generation_start(9);
        cb.on_section_complete(1, 9, &SectionOutcome::Generated);
    }
}
