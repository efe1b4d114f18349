//! Generation state machine.
//!
//! ```text
//! Idle ──Started──▶ Generating(progress) ──Finished──▶ Completed(document)
//!   │                                        │
//!   └──────────────Finished(whole fallback)──┴──────▶ FailedFallback(document)
//! ```
//!
//! [`GenerationState::apply`] is a pure reducer: callers hold the current
//! state and fold [`GenerationEvent`]s into it. Terminal states ignore
//! further events.

use crate::document::Document;
use serde::Serialize;

/// Coarse phase of a run, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Preparing,
    GeneratingSections,
    Completed,
    Error,
}

/// Progress snapshot while sections are being generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    /// Sections resolved so far.
    pub completed: usize,
    pub total: usize,
    /// 1-indexed section currently in flight, if any.
    pub current_section: Option<usize>,
    pub current_title: Option<String>,
    /// Sections filled with fallback content so far.
    pub fallbacks: usize,
    pub phase: GenerationPhase,
}

impl GenerationProgress {
    fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            current_section: None,
            current_title: None,
            fallbacks: 0,
            phase: GenerationPhase::Preparing,
        }
    }

    /// Completion ratio in percent (0–100).
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed * 100) / self.total).min(100) as u8
    }
}

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Started { total: usize },
    SectionStarted { section_number: usize, title: String },
    SectionResolved { completed: usize, total: usize, fallback: bool },
    Finished { document: Box<Document>, whole_fallback: bool },
}

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Generating(GenerationProgress),
    Completed(Box<Document>),
    /// The run broke as a whole; the document holds only fallback content.
    FailedFallback(Box<Document>),
}

impl GenerationState {
    /// Fold one event into the state.
    pub fn apply(self, event: GenerationEvent) -> Self {
        use GenerationEvent as E;
        use GenerationState as S;

        match (self, event) {
            (s @ (S::Completed(_) | S::FailedFallback(_)), _) => s,

            (_, E::Finished { document, whole_fallback }) => {
                if whole_fallback {
                    S::FailedFallback(document)
                } else {
                    S::Completed(document)
                }
            }

            (S::Idle, E::Started { total }) => S::Generating(GenerationProgress::new(total)),

            (S::Generating(mut p), E::SectionStarted { section_number, title }) => {
                p.current_section = Some(section_number);
                p.current_title = Some(title);
                p.phase = GenerationPhase::GeneratingSections;
                S::Generating(p)
            }

            (S::Generating(mut p), E::SectionResolved { completed, total, fallback }) => {
                p.completed = completed;
                p.total = total;
                if fallback {
                    p.fallbacks += 1;
                }
                S::Generating(p)
            }

            // Out-of-order events leave the state untouched.
            (s, _) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Completed(_) | GenerationState::FailedFallback(_))
    }

    /// The finished document, if the run is over.
    pub fn document(&self) -> Option<&Document> {
        match self {
            GenerationState::Completed(d) | GenerationState::FailedFallback(d) => Some(d),
            _ => None,
        }
    }

    pub fn phase(&self) -> GenerationPhase {
        match self {
            GenerationState::Idle => GenerationPhase::Preparing,
            GenerationState::Generating(p) => p.phase,
            GenerationState::Completed(_) => GenerationPhase::Completed,
            GenerationState::FailedFallback(_) => GenerationPhase::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{sample_request, section};
    use crate::document::SectionKind;
    use chrono::Utc;

    fn doc() -> Box<Document> {
        Box::new(Document::assemble(
            &sample_request(),
            vec![section(1, SectionKind::Title, "x")],
            Utc::now(),
            Utc::now(),
        ))
    }

    #[test]
    fn happy_path_transitions() {
        let s = GenerationState::default().apply(GenerationEvent::Started { total: 2 });
        assert_eq!(s.phase(), GenerationPhase::Preparing);

        let s = s.apply(GenerationEvent::SectionStarted {
            section_number: 1,
            title: "Company Introduction".into(),
        });
        let s = s.apply(GenerationEvent::SectionResolved {
            completed: 1,
            total: 2,
            fallback: true,
        });
        match &s {
            GenerationState::Generating(p) => {
                assert_eq!(p.completed, 1);
                assert_eq!(p.fallbacks, 1);
                assert_eq!(p.percent(), 50);
                assert_eq!(p.current_section, Some(1));
                assert_eq!(p.phase, GenerationPhase::GeneratingSections);
            }
            other => panic!("unexpected state {other:?}"),
        }

        let s = s.apply(GenerationEvent::Finished {
            document: doc(),
            whole_fallback: false,
        });
        assert!(s.is_terminal());
        assert_eq!(s.phase(), GenerationPhase::Completed);
        assert!(s.document().is_some());
    }

    #[test]
    fn whole_fallback_is_distinct_terminal() {
        let s = GenerationState::Idle.apply(GenerationEvent::Finished {
            document: doc(),
            whole_fallback: true,
        });
        assert!(matches!(s, GenerationState::FailedFallback(_)));
        assert_eq!(s.phase(), GenerationPhase::Error);
    }

    #[test]
    fn terminal_states_ignore_events() {
        let s = GenerationState::Completed(doc());
        let after = s.clone().apply(GenerationEvent::Started { total: 9 });
        assert_eq!(after, s);
    }

    #[test]
    fn idle_ignores_section_events() {
        let s = GenerationState::Idle.apply(GenerationEvent::SectionResolved {
            completed: 1,
            total: 1,
            fallback: false,
        });
        assert_eq!(s, GenerationState::Idle);
    }
}
