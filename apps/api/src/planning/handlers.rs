//! Axum route handlers for the AI endpoints.
//!
//! LLM trouble never surfaces as an HTTP error here: the body is always a
//! well-formed result and `source` says where it came from.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::session::StaffPrescription;
use crate::planning::generator::generate_plan;
use crate::planning::inflight::InFlightGuard;
use crate::planning::plan::TreatmentPlan;
use crate::planning::prompts::StyleProfile;
use crate::planning::review::{review_prescription, ReviewResult};
use crate::planning::suggestion::{suggest_style, SuggestionResult};
use crate::planning::AiSource;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub session_id: String,
    pub plan: TreatmentPlan,
    pub source: AiSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub session_id: String,
    pub review: ReviewResult,
    pub source: AiSource,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    #[serde(flatten)]
    pub result: SuggestionResult,
    pub source: AiSource,
}

fn claim(state: &AppState, session_id: &str) -> Result<InFlightGuard, AppError> {
    state.in_flight.try_begin(session_id).ok_or_else(|| {
        AppError::Conflict(format!(
            "An AI request for session {session_id} is already in progress"
        ))
    })
}

/// POST /api/v1/sessions/:session_id/generate-plan
pub async fn handle_generate_plan(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<PlanResponse>, AppError> {
    let _guard = claim(&state, &session_id)?;

    let plan = generate_plan(
        &state.repo,
        state.llm.as_ref(),
        &state.config.knowledge_category_prefix,
        &session_id,
        Utc::now(),
    )
    .await?;

    Ok(Json(PlanResponse {
        session_id,
        plan: plan.value,
        source: plan.source,
    }))
}

/// POST /api/v1/sessions/:session_id/review-plan
///
/// Body is the stylist's prescription.
pub async fn handle_review_plan(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(prescription): Json<StaffPrescription>,
) -> Result<Json<ReviewResponse>, AppError> {
    if let Some(level) = prescription.power_level {
        if level > 10 {
            return Err(AppError::Validation(format!(
                "powerLevel must be between 0 and 10, got {level}"
            )));
        }
    }
    let _guard = claim(&state, &session_id)?;

    let review = review_prescription(
        &state.repo,
        state.llm.as_ref(),
        &session_id,
        prescription,
        Utc::now(),
    )
    .await?;

    Ok(Json(ReviewResponse {
        session_id,
        review: review.value,
        source: review.source,
    }))
}

/// POST /api/v1/ai-suggestion
pub async fn handle_ai_suggestion(
    State(state): State<AppState>,
    Json(profile): Json<StyleProfile>,
) -> Json<SuggestionResponse> {
    let suggestion = suggest_style(state.llm.as_ref(), &profile).await;
    Json(SuggestionResponse {
        result: suggestion.value,
        source: suggestion.source,
    })
}
