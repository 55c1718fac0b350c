use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::hair::Zone;
use crate::planning::plan::TreatmentPlan;
use crate::planning::review::ReviewResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Draft,
    PlanGenerated,
    InProgress,
    Completed,
}

/// Free-text intake notes. Entered once per session, optionally revised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaffAssessment {
    pub assessment_notes: String,
    pub concerns: String,
    pub customer_requests: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionPrescription {
    pub product: String,
    /// Grams of cream.
    pub amount: f64,
    pub incline: f64,
    pub ritpino_h: f64,
}

/// What the stylist intends to apply, submitted for an AI second opinion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaffPrescription {
    pub power_level: Option<u8>,
    pub root: SectionPrescription,
    pub middle: SectionPrescription,
    pub ends: SectionPrescription,
    pub iron_temperature: Option<u16>,
    pub notes: String,
}

impl StaffPrescription {
    pub fn section(&self, zone: Zone) -> &SectionPrescription {
        match zone {
            Zone::Root => &self.root,
            Zone::Middle => &self.middle,
            Zone::Ends => &self.ends,
        }
    }
}

/// One counseling visit. AI outputs are stored whole and replaced on regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselingSession {
    pub id: String,
    pub customer_id: String,
    pub stylist_id: Option<String>,
    pub store_id: Option<String>,
    pub session_date: NaiveDate,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub staff_assessment: Option<StaffAssessment>,
    #[serde(default)]
    pub staff_prescription: Option<StaffPrescription>,
    #[serde(default)]
    pub ai_suggestion: Option<TreatmentPlan>,
    #[serde(default)]
    pub ai_review: Option<ReviewResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CounselingSession {
    pub fn new(
        id: String,
        customer_id: String,
        stylist_id: Option<String>,
        store_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            stylist_id,
            store_id,
            session_date: now.date_naive(),
            status: SessionStatus::Draft,
            staff_assessment: None,
            staff_prescription: None,
            ai_suggestion: None,
            ai_review: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// One-line history summary: first two concern items, else the notes.
    pub fn assessment_summary(&self) -> Option<String> {
        let assessment = self.staff_assessment.as_ref()?;
        let concerns: Vec<&str> = assessment
            .concerns
            .split(['、', ',', '\n'])
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .take(2)
            .collect();
        if !concerns.is_empty() {
            return Some(concerns.join("・"));
        }
        let notes = assessment.assessment_notes.trim();
        Some(if notes.is_empty() {
            "記録あり".to_string()
        } else {
            notes.chars().take(40).collect()
        })
    }
}
