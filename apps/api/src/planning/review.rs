//! Second-opinion review of a stylist's prescription.
//!
//! Any reply that is valid JSON is kept as the model wrote it: verdicts are
//! read case-insensitively, an unrecognised verdict counts as `warning`, and
//! list fields accept a bare string. Only text with no parseable JSON fails
//! OPEN to the neutral "nothing detected" review, and every fail-open is
//! logged at `warn` with the session id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::counseling::repository::CounselingRepository;
use crate::errors::AppError;
use crate::llm_client::parser::de;
use crate::llm_client::{Completion, CompletionOptions};
use crate::models::hair::{Timing, Zone};
use crate::models::session::{SessionStatus, StaffPrescription};
use crate::planning::prompts::{
    build_review_system_prompt, REVIEW_MAX_TOKENS, REVIEW_MODEL, REVIEW_REQUEST,
};
use crate::planning::{request, AiOutput, AiSource, Generated};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Ok,
    Caution,
    Warning,
}

impl Verdict {
    fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "ok" | "good" | "safe" | "問題なし" | "良好" => Verdict::Ok,
            "caution" | "注意" => Verdict::Caution,
            "warning" | "warn" => Verdict::Warning,
            other => {
                warn!("Unrecognised review verdict {other:?}; treating as warning");
                Verdict::Warning
            }
        }
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Verdict::Ok,
            Value::String(s) => Verdict::from_label(&s),
            other => Verdict::from_label(&other.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionReview {
    pub status: Verdict,
    #[serde(deserialize_with = "de::text")]
    pub message: String,
}

/// Per-zone verdicts. Zones the model did not mention are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionReviews {
    #[serde(deserialize_with = "de::or_default", skip_serializing_if = "Option::is_none")]
    pub root: Option<SectionReview>,
    #[serde(deserialize_with = "de::or_default", skip_serializing_if = "Option::is_none")]
    pub middle: Option<SectionReview>,
    #[serde(deserialize_with = "de::or_default", skip_serializing_if = "Option::is_none")]
    pub ends: Option<SectionReview>,
}

impl SectionReviews {
    pub fn get(&self, zone: Zone) -> Option<&SectionReview> {
        match zone {
            Zone::Root => self.root.as_ref(),
            Zone::Middle => self.middle.as_ref(),
            Zone::Ends => self.ends.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewResult {
    pub overall: Verdict,
    #[serde(deserialize_with = "de::or_default")]
    pub sections: SectionReviews,
    #[serde(deserialize_with = "de::text_list")]
    pub suggestions: Vec<String>,
    #[serde(alias = "precautions", deserialize_with = "de::text_list")]
    pub warnings: Vec<String>,
}

impl ReviewResult {
    /// `{overall: "ok", sections: {}, suggestions: [], warnings: []}`.
    pub fn fail_open() -> Self {
        Self::default()
    }

    /// Worst of the overall verdict and every section verdict.
    pub fn most_severe(&self) -> Verdict {
        Zone::ALL
            .iter()
            .filter_map(|z| self.sections.get(*z).map(|s| s.status))
            .fold(self.overall, |worst, v| severity_max(worst, v))
    }
}

fn severity_max(a: Verdict, b: Verdict) -> Verdict {
    fn rank(v: Verdict) -> u8 {
        match v {
            Verdict::Ok => 0,
            Verdict::Caution => 1,
            Verdict::Warning => 2,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

impl AiOutput for ReviewResult {
    const LABEL: &'static str = "prescription review";

    fn parse_fallback() -> Self {
        Self::fail_open()
    }

    fn provider_fallback(error_summary: &str) -> Self {
        Self {
            warnings: vec![format!(
                "AIレビューを実行できませんでした（エラー詳細: {error_summary}）。処方を手動で確認してください。"
            )],
            ..Self::fail_open()
        }
    }

    fn demo() -> Self {
        Self {
            suggestions: vec![
                "デモ表示: APIキーが設定されていないためAIレビューは行われていません。".to_string(),
            ],
            ..Self::fail_open()
        }
    }
}

/// Reviews `prescription` against the session's "before" hair condition and
/// stores both on the session (status `in_progress`).
pub async fn review_prescription(
    repo: &CounselingRepository,
    llm: &dyn Completion,
    session_id: &str,
    prescription: StaffPrescription,
    now: DateTime<Utc>,
) -> Result<Generated<ReviewResult>, AppError> {
    let mut session = repo
        .get_session(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
    let hair = repo.get_hair_condition(session_id, Timing::Before).await?;

    let system = build_review_system_prompt(hair.as_ref(), &prescription);
    let options = CompletionOptions::new(REVIEW_MODEL, REVIEW_MAX_TOKENS).with_system(system);
    let review: Generated<ReviewResult> = request(llm, REVIEW_REQUEST, &options).await;

    if review.source == AiSource::Fallback {
        warn!("Review for session {session_id} was unparseable; failing open to overall=ok");
    }
    info!(
        "Review for session {session_id}: overall={:?}, most severe={:?}, source={:?}",
        review.value.overall,
        review.value.most_severe(),
        review.source
    );

    session.staff_prescription = Some(prescription);
    session.ai_review = Some(review.value.clone());
    session.status = SessionStatus::InProgress;
    session.updated_at = now;
    if let Err(e) = repo.save_session(&session).await {
        error!("Failed to persist review for session {session_id}: {e}");
    }

    Ok(review)
}
