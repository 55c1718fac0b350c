//! Treatment plan generation pipeline.
//!
//! session → "before" hair condition + assessment + customer → knowledge
//! → prompt → LLM → parse → persist onto the session.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::counseling::repository::{CounselingRepository, KnowledgeEntry};
use crate::errors::AppError;
use crate::llm_client::{Completion, CompletionOptions};
use crate::models::hair::Timing;
use crate::models::session::SessionStatus;
use crate::planning::plan::TreatmentPlan;
use crate::planning::prompts::{
    build_plan_prompt, PlanProfile, PLAN_MAX_TOKENS, PLAN_MODEL, PLAN_SYSTEM,
};
use crate::planning::{request, Generated};

const KNOWLEDGE_SEPARATOR: &str = "\n\n---\n\n";

/// Concatenates entries in the given order as `## title\n\ncontent` blocks.
pub fn join_knowledge(entries: &[KnowledgeEntry]) -> String {
    entries
        .iter()
        .map(|k| format!("## {}\n\n{}", k.title, k.content))
        .collect::<Vec<_>>()
        .join(KNOWLEDGE_SEPARATOR)
}

pub async fn generate_plan(
    repo: &CounselingRepository,
    llm: &dyn Completion,
    knowledge_prefix: &str,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<Generated<TreatmentPlan>, AppError> {
    let mut session = repo
        .get_session(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

    let hair = repo.get_hair_condition(session_id, Timing::Before).await?;
    if hair.is_none() {
        warn!("Session {session_id} has no 'before' hair condition; planning without it");
    }
    let customer = repo.get_customer(&session.customer_id).await?;

    let knowledge = match repo.knowledge(knowledge_prefix).await {
        Ok(entries) => {
            info!(
                "Loaded {} knowledge entries with prefix '{knowledge_prefix}'",
                entries.len()
            );
            join_knowledge(&entries)
        }
        Err(e) => {
            warn!("Knowledge base unavailable, planning without it: {e}");
            String::new()
        }
    };

    let prompt = build_plan_prompt(
        &PlanProfile {
            customer_name: customer.as_ref().map(|c| c.name.as_str()),
            hair: hair.as_ref(),
            assessment: session.staff_assessment.as_ref(),
        },
        &knowledge,
    );
    let options = CompletionOptions::new(PLAN_MODEL, PLAN_MAX_TOKENS).with_system(PLAN_SYSTEM);
    let plan: Generated<TreatmentPlan> = request(llm, &prompt, &options).await;

    info!(
        "Plan for session {session_id}: menu='{}', source={:?}",
        plan.value.recommended_menu, plan.source
    );

    session.ai_suggestion = Some(plan.value.clone());
    session.status = SessionStatus::PlanGenerated;
    session.updated_at = now;
    if let Err(e) = repo.save_session(&session).await {
        error!("Failed to persist plan for session {session_id}: {e}");
    }

    Ok(plan)
}
