//! Streaming generation API: observe a run as a sequence of states.
//!
//! [`generate_stream`] spawns the run on the Tokio runtime and yields every
//! [`GenerationState`] the reducer passes through, ending with exactly one
//! terminal state (`Completed` or `FailedFallback`).
//!
//! Dropping the stream stops state delivery but does not abort a completion
//! request that is already in flight; the task finishes its current section
//! and the remaining sections quietly.

use crate::config::GenerationConfig;
use crate::document::DocumentRequest;
use crate::generate::run_with_events;
use crate::pipeline::llm::CompletionClient;
use crate::state::GenerationState;
use crate::templates::GenerationTemplate;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of generation states.
pub type StateStream = Pin<Box<dyn Stream<Item = GenerationState> + Send>>;

/// Generate a document in the background, streaming state transitions.
///
/// # Example
/// ```rust,no_run
/// use pitchforge::{generate_stream, templates_for, DocumentRequest, GenerationConfig};
/// use pitchforge::pipeline::llm::HttpCompletionClient;
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let request = DocumentRequest { company_name: "Acme".into(), ..Default::default() };
/// let client = Arc::new(HttpCompletionClient::new("https://api.aimlapi.com/v1", "key", "gpt-4o"));
/// let mut states = generate_stream(
///     request.clone(),
///     templates_for(request.kind).to_vec(),
///     client,
///     None,
///     GenerationConfig::default(),
/// );
/// while let Some(state) = states.next().await {
///     if let Some(doc) = state.document() {
///         println!("{} sections", doc.total_sections);
///     }
/// }
/// # }
/// ```
pub fn generate_stream(
    request: DocumentRequest,
    templates: Vec<GenerationTemplate>,
    client: Arc<dyn CompletionClient>,
    extracted_text: Option<String>,
    config: GenerationConfig,
) -> StateStream {
    let (state_tx, state_rx) = mpsc::channel::<GenerationState>(16);

    tokio::spawn(async move {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let pipeline = async {
            run_with_events(
                &request,
                &templates,
                client.as_ref(),
                extracted_text.as_deref(),
                &config,
                Some(&event_tx),
            )
            .await;
            drop(event_tx);
        };

        let forward = async {
            let mut state = GenerationState::Idle;
            while let Some(event) = event_rx.recv().await {
                state = state.apply(event);
                if state_tx.send(state.clone()).await.is_err() {
                    debug!("State stream dropped; continuing without observers");
                    break;
                }
            }
        };

        tokio::join!(pipeline, forward);
    });

    Box::pin(ReceiverStream::new(state_rx))
}
