use std::sync::Arc;

use crate::config::Config;
use crate::counseling::repository::CounselingRepository;
use crate::llm_client::Completion;
use crate::planning::inflight::InFlight;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub repo: CounselingRepository,
    /// `LlmClient` in production; scripted doubles in tests.
    pub llm: Arc<dyn Completion>,
    pub config: Config,
    /// Sessions with a generate/review call outstanding.
    pub in_flight: InFlight,
}
