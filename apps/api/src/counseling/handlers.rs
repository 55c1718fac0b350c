//! Axum route handlers for the counseling records API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::counseling::repository::{KnowledgeEntry, NewCustomer};
use crate::errors::AppError;
use crate::models::customer::Customer;
use crate::models::hair::{
    DamageLevel, HairCondition, HairConditionRecord, Texture, Timing, TreatmentHistory, Zone,
};
use crate::models::session::{CounselingSession, SessionStatus, StaffAssessment};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub customer_id: String,
    #[serde(alias = "stylistId")]
    pub staff_id: Option<String>,
    pub store_id: Option<String>,
}

/// One row of a customer's visit history.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub session_date: NaiveDate,
    pub status: SessionStatus,
    pub hair_condition_summary: Option<String>,
    pub treatment_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimingQuery {
    #[serde(default)]
    pub timing: Timing,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HairConditionInput {
    #[serde(default)]
    pub timing: Timing,
    pub condition: HairCondition,
    #[serde(default)]
    pub history: TreatmentHistory,
    #[serde(default)]
    pub shine_level: Option<DamageLevel>,
    #[serde(default)]
    pub texture: Option<Texture>,
    #[serde(default)]
    pub manageability: Option<DamageLevel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentInput {
    #[serde(default)]
    pub assessment_notes: String,
    #[serde(default)]
    pub concerns: String,
    #[serde(default)]
    pub customer_requests: String,
}

fn hair_summary(record: &HairConditionRecord) -> String {
    Zone::ALL
        .iter()
        .map(|z| format!("{}Lv.{}", z.label(), record.condition.zone(*z).damage.value()))
        .collect::<Vec<_>>()
        .join(" / ")
}

fn treatment_summary(session: &CounselingSession) -> Option<String> {
    session
        .ai_suggestion
        .as_ref()
        .map(|plan| plan.recommended_menu.clone())
        .filter(|menu| !menu.is_empty())
        .or_else(|| session.assessment_summary())
}

async fn require_session(state: &AppState, session_id: &str) -> Result<CounselingSession, AppError> {
    state
        .repo
        .get_session(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Customers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/customers?search=
pub async fn handle_list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let customers = state.repo.list_customers(query.search.as_deref()).await?;
    Ok(Json(customers))
}

/// POST /api/v1/customers
pub async fn handle_create_customer(
    State(state): State<AppState>,
    Json(input): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    let customer = state.repo.create_customer(input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /api/v1/customers/:customer_id/sessions
pub async fn handle_customer_sessions(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    let sessions = state.repo.sessions_for_customer(&customer_id).await?;

    let mut summaries = Vec::with_capacity(sessions.len());
    for session in sessions {
        let hair = state
            .repo
            .get_hair_condition(&session.id, Timing::Before)
            .await?;
        summaries.push(SessionSummary {
            hair_condition_summary: hair.as_ref().map(hair_summary),
            treatment_summary: treatment_summary(&session),
            id: session.id,
            session_date: session.session_date,
            status: session.status,
        });
    }
    Ok(Json(summaries))
}

// ────────────────────────────────────────────────────────────────────────────
// Sessions
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
///
/// Stylist and store come from the request; config defaults fill the gaps.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CounselingSession>), AppError> {
    if request.customer_id.trim().is_empty() {
        return Err(AppError::Validation("customerId cannot be empty".to_string()));
    }
    state
        .repo
        .get_customer(&request.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", request.customer_id)))?;

    let stylist_id = request
        .staff_id
        .or_else(|| state.config.default_stylist_id.clone());
    let store_id = request
        .store_id
        .or_else(|| state.config.default_store_id.clone());

    let session = state
        .repo
        .create_session(&request.customer_id, stylist_id, store_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions/:session_id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<CounselingSession>, AppError> {
    Ok(Json(require_session(&state, &session_id).await?))
}

/// POST /api/v1/sessions/:session_id/complete
pub async fn handle_complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<CounselingSession>, AppError> {
    let session = state
        .repo
        .complete_session(&session_id, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
    Ok(Json(session))
}

// ────────────────────────────────────────────────────────────────────────────
// Hair condition
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/sessions/:session_id/hair-condition?timing=before|after
pub async fn handle_get_hair_condition(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<TimingQuery>,
) -> Result<Json<HairConditionRecord>, AppError> {
    let record = state
        .repo
        .get_hair_condition(&session_id, query.timing)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No {} hair condition for session {session_id}",
                query.timing.as_str()
            ))
        })?;
    Ok(Json(record))
}

/// POST /api/v1/sessions/:session_id/hair-condition
///
/// Replaces the record for the body's timing. Damage levels outside 1–5 are a 400.
pub async fn handle_save_hair_condition(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<HairConditionRecord>, AppError> {
    let input: HairConditionInput =
        serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))?;
    require_session(&state, &session_id).await?;

    let record = HairConditionRecord {
        session_id,
        timing: input.timing,
        condition: input.condition,
        history: input.history,
        shine_level: input.shine_level,
        texture: input.texture,
        manageability: input.manageability,
        recorded_at: Utc::now(),
    };
    state.repo.save_hair_condition(&record).await?;
    Ok(Json(record))
}

// ────────────────────────────────────────────────────────────────────────────
// Staff assessment
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/sessions/:session_id/assessment
pub async fn handle_get_assessment(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StaffAssessment>, AppError> {
    require_session(&state, &session_id)
        .await?
        .staff_assessment
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No assessment for session {session_id}")))
}

/// POST /api/v1/sessions/:session_id/assessment
pub async fn handle_save_assessment(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(input): Json<AssessmentInput>,
) -> Result<Json<StaffAssessment>, AppError> {
    let mut session = require_session(&state, &session_id).await?;
    let now = Utc::now();
    let assessment = StaffAssessment {
        assessment_notes: input.assessment_notes,
        concerns: input.concerns,
        customer_requests: input.customer_requests,
        updated_at: Some(now),
    };
    session.staff_assessment = Some(assessment.clone());
    session.updated_at = now;
    state.repo.save_session(&session).await?;
    Ok(Json(assessment))
}

// ────────────────────────────────────────────────────────────────────────────
// Knowledge base
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/knowledge?prefix=
///
/// Without `prefix`, lists the entries the plan generator would use.
pub async fn handle_list_knowledge(
    State(state): State<AppState>,
    Query(query): Query<KnowledgeQuery>,
) -> Result<Json<Vec<KnowledgeEntry>>, AppError> {
    let prefix = query
        .prefix
        .unwrap_or_else(|| state.config.knowledge_category_prefix.clone());
    Ok(Json(state.repo.knowledge(&prefix).await?))
}

/// POST /api/v1/knowledge
///
/// Inserts or replaces the entry with the body's id.
pub async fn handle_save_knowledge(
    State(state): State<AppState>,
    Json(entry): Json<KnowledgeEntry>,
) -> Result<Json<KnowledgeEntry>, AppError> {
    if entry.id.trim().is_empty() || entry.title.trim().is_empty() {
        return Err(AppError::Validation(
            "knowledge entries need an id and a title".to_string(),
        ));
    }
    state.repo.save_knowledge(&entry).await?;
    Ok(Json(entry))
}
