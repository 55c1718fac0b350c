// All LLM prompt constants and builders for the planning module.
// Reuses cross-cutting fragments from llm_client::prompts.
//
// Builders are pure: same inputs, same prompt.

use crate::llm_client::prompts::{or_placeholder, render, request_directive, JSON_ONLY_INSTRUCTION};
use crate::models::hair::{HairConditionRecord, Zone};
use crate::models::session::{StaffAssessment, StaffPrescription};

pub const PLAN_MODEL: &str = "claude-haiku-4-5";
pub const PLAN_MAX_TOKENS: u32 = 4000;
pub const REVIEW_MODEL: &str = "claude-sonnet-4-5";
pub const REVIEW_MAX_TOKENS: u32 = 1024;
pub const SUGGESTION_MODEL: &str = "claude-sonnet-4-5";
pub const SUGGESTION_MAX_TOKENS: u32 = 3000;

/// Matching guide for face shape and personal color, injected into suggestion prompts.
pub const MATCHING_KNOWLEDGE: &str = include_str!("../../knowledge/matching.md");

/// Shown in place of the knowledge block when the store holds no entries.
pub const NO_KNOWLEDGE: &str = "（ナレッジデータなし）";

pub const PLAN_SYSTEM: &str = "あなたは「HAIR&MAKE peace」の髪質改善スペシャリストです。\
    METEOストレート・カラー技術のマニュアルに沿って、安全で具体的な施術プランを提案します。\
    回答は必ず指定スキーマのJSONオブジェクトのみとし、それ以外の文章は出力しません。";

/// Treatment plan prompt.
/// Replace: {knowledge}, {customer}, {hair}, {assessment}, {request}, {schema}, {json_only}
pub const PLAN_PROMPT_TEMPLATE: &str = r#"以下のMETEO施術マニュアルと顧客の髪の状態をもとに、本日の施術プランを作成してください。

【作成ルール】
- 本日の要望の扱い: {request}
- ナレッジの配合レシピ早見表を参照し、具体的な薬剤名と配合量を示すこと
- 根元・中間・毛先の部位ごとに薬剤を塗り分けること
- 中間処理の工程を必ず含めること
- アイロン温度は髪の状態に応じて具体的な数値で指定すること
- 体力レベルはダメージレベルから換算すること（ダメージ5→体力0〜2、ダメージ1→体力8〜10）

=== METEOナレッジベース ===

{knowledge}

=== 顧客情報 ===

{customer}

{hair}

{assessment}

=== 出力形式 ===

{schema}

{json_only}"#;

pub const PLAN_SCHEMA: &str = r#"次のキーを持つJSONオブジェクト:
{
  "recommendedMenu": string,              // メニュー名
  "recommendedPrice": integer,            // 税込価格（円）
  "durationMinutes": integer,             // 所要時間（分）
  "hairAnalysis": {
    "powerLevel": integer,                // 体力レベル 0〜10
    "curlLevel": string,
    "zone": string,                       // "アルカリゾーン" | "酸性ゾーン" など
    "riskFactors": [string]
  },
  "productSelection": {
    "root":   { "product": string, "amount": string, "incline": string, "ritpinoH": string, "reason": string },
    "middle": { "product": string, "amount": string, "incline": string, "ritpinoH": string, "reason": string },
    "ends":   { "product": string, "amount": string, "incline": string, "ritpinoH": string, "reason": string }
  },
  "treatmentProcess": [
    { "step": integer, "action": string, "timeMinutes": integer, "details": string, "temperature": string (アイロン工程のみ), "notes": string }
  ],
  "risksAndPrecautions": [string],
  "expectedResults": { "shine": string, "texture": string, "duration": string },
  "afterCare": { "immediate": string, "homeCare": string },
  "nextVisitRecommendation": string
}"#;

pub const REVIEW_SYSTEM_TEMPLATE: &str = r#"あなたはMETEO髪質改善の専門家です。スタッフが選んだ薬剤処方を、髪の状態と照らし合わせてレビューしてください。

髪の状態:
{hair}

スタッフの処方:
{prescription}

以下のJSON形式で回答してください:
{
  "overall": "ok" | "caution" | "warning",
  "sections": {
    "root":   { "status": "ok" | "caution" | "warning", "message": string },
    "middle": { "status": "ok" | "caution" | "warning", "message": string },
    "ends":   { "status": "ok" | "caution" | "warning", "message": string }
  },
  "suggestions": [string],
  "warnings": [string]
}

{json_only}"#;

/// User turn for review calls; the material lives in the system prompt.
pub const REVIEW_REQUEST: &str = "スタッフの処方をレビューしてください。";

/// Style suggestion prompt.
/// Replace: {knowledge}, {face_shape}, {personal_color}, {personal_color_base}, {concerns}, {request}, {json_only}
pub const SUGGESTION_PROMPT_TEMPLATE: &str = r##"You are a professional hair stylist.
Based on the customer profile and the Matching Knowledge below, suggest suitable hair colors and styles.

# Matching Knowledge
{knowledge}

# Customer Profile
- Face Shape: {face_shape} (map this to one of: 面長, 丸顔, ベース型, 逆三角形; for 卵型 or anything else, suggest generally balanced styles)
- Personal Color: {personal_color}
- Personal Color Base: {personal_color_base}
- Concerns: {concerns}

# Today's Request
{request}

# Instructions
1. Analyze the face shape using the Matching Knowledge.
2. Suggest "Out Form", "In Form" and "Bang" adjustments based on the knowledge.
3. Recommend 3 specific hair colors and 3 styles.
4. Provide concrete styling advice.

Output a JSON object with exactly this structure:
{
  "summary": {
    "faceShape": string (Japanese),
    "personalColor": string (Japanese),
    "matchRate": integer 80-100
  },
  "colors": [ { "name": string, "code": "#RRGGBB", "desc": string } ],
  "styles": [ { "id": integer, "title": string, "desc": string } ],
  "advice": [string, string, string],
  "aiAnalysis": string (Japanese; must mention Out Form, In Form and Bang adjustments)
}

{json_only}"##;

/// Inputs to the treatment-plan prompt. Any field may be missing.
#[derive(Debug, Default)]
pub struct PlanProfile<'a> {
    pub customer_name: Option<&'a str>,
    pub hair: Option<&'a HairConditionRecord>,
    pub assessment: Option<&'a StaffAssessment>,
}

pub fn build_plan_prompt(profile: &PlanProfile<'_>, knowledge: &str) -> String {
    let customer = format!("顧客名: {}", or_placeholder(profile.customer_name));
    let hair = profile
        .hair
        .map(describe_hair)
        .unwrap_or_else(|| "## 現在の髪の状態\n\n髪の状態データなし（未入力）".to_string());
    let assessment = describe_assessment(profile.assessment);
    let request = request_directive(profile.assessment.map(|a| a.customer_requests.as_str()));
    let knowledge = if knowledge.trim().is_empty() {
        NO_KNOWLEDGE
    } else {
        knowledge
    };

    render(
        PLAN_PROMPT_TEMPLATE,
        &[
            ("knowledge", knowledge),
            ("customer", &customer),
            ("hair", &hair),
            ("assessment", &assessment),
            ("request", &request),
            ("schema", PLAN_SCHEMA),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

pub fn build_review_system_prompt(
    hair: Option<&HairConditionRecord>,
    prescription: &StaffPrescription,
) -> String {
    let hair = hair
        .map(describe_zones_and_history)
        .unwrap_or_else(|| "髪の状態データなし（未入力）".to_string());
    let prescription = describe_prescription(prescription);
    render(
        REVIEW_SYSTEM_TEMPLATE,
        &[
            ("hair", &hair),
            ("prescription", &prescription),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

/// Face-shape / personal-color profile sent from the intake form.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleProfile {
    pub face_shape: Option<String>,
    pub personal_color: Option<String>,
    pub personal_color_base: Option<String>,
    pub concerns: Vec<String>,
    #[serde(alias = "customerRequest")]
    pub request: Option<String>,
}

pub fn build_suggestion_prompt(profile: &StyleProfile, knowledge: &str) -> String {
    let concerns: Vec<&str> = profile
        .concerns
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    let concerns = if concerns.is_empty() {
        or_placeholder(None).to_string()
    } else {
        concerns.join(", ")
    };
    let request = request_directive(profile.request.as_deref());

    render(
        SUGGESTION_PROMPT_TEMPLATE,
        &[
            ("knowledge", knowledge),
            ("face_shape", or_placeholder(profile.face_shape.as_deref())),
            ("personal_color", or_placeholder(profile.personal_color.as_deref())),
            (
                "personal_color_base",
                or_placeholder(profile.personal_color_base.as_deref()),
            ),
            ("concerns", &concerns),
            ("request", &request),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

fn describe_hair(record: &HairConditionRecord) -> String {
    let mut out = String::from("## 現在の髪の状態\n\n");
    out.push_str(&describe_zones_and_history(record));

    let shine = record
        .shine_level
        .map(|l| format!("{}/5", l.value()));
    let manageability = record
        .manageability
        .map(|l| format!("{}/5", l.value()));
    out.push_str("\n\n**質感**\n");
    out.push_str(&format!("- ツヤレベル: {}\n", or_placeholder(shine.as_deref())));
    out.push_str(&format!(
        "- 質感: {}\n",
        or_placeholder(record.texture.map(|t| t.label()))
    ));
    out.push_str(&format!(
        "- まとまり: {}",
        or_placeholder(manageability.as_deref())
    ));
    out
}

fn describe_zones_and_history(record: &HairConditionRecord) -> String {
    let mut out = String::from("**部位別（ダメージ 1=健康〜5=ハイダメージ）**\n");
    for zone in Zone::ALL {
        let z = record.condition.zone(zone);
        let (low, high) = z.damage.stamina_range();
        out.push_str(&format!(
            "- {}: ダメージLv.{}（体力目安 {low}〜{high}）、くせ: {}\n",
            zone.label(),
            z.damage.value(),
            z.curl.label()
        ));
    }

    out.push_str(&format!(
        "- 最大ダメージ: Lv.{}\n",
        record.condition.worst_damage().value()
    ));

    let h = &record.history;
    out.push_str("\n**施術履歴**\n");
    out.push_str(&format!(
        "- 直近カラー: {}\n",
        or_placeholder(h.last_color.map(|c| c.label()))
    ));
    out.push_str(&format!(
        "- ブリーチ回数: {}",
        or_placeholder(h.bleach_count.map(|b| b.label()))
    ));
    if let Some(last) = h.bleach_last_date {
        out.push_str(&format!("（最終: {}）", last.label()));
    }
    out.push_str(&format!(
        "\n- 縮毛矯正履歴: {}",
        if h.has_straightening { "あり" } else { "なし" }
    ));
    if let Some(last) = h.straightening_last_date {
        out.push_str(&format!("（最終: {}）", last.label()));
    }
    out
}

fn describe_assessment(assessment: Option<&StaffAssessment>) -> String {
    match assessment {
        Some(a) => format!(
            "## スタッフ所見\n\n- 状態の所見: {}\n- 注意点・懸念: {}",
            or_placeholder(Some(a.assessment_notes.as_str())),
            or_placeholder(Some(a.concerns.as_str()))
        ),
        None => "## スタッフ所見\n\n未入力".to_string(),
    }
}

fn describe_prescription(p: &StaffPrescription) -> String {
    let mut out = String::new();
    let power = p.power_level.map(|v| v.to_string());
    out.push_str(&format!("- 体力レベル: {}\n", or_placeholder(power.as_deref())));
    for zone in Zone::ALL {
        let s = p.section(zone);
        out.push_str(&format!(
            "- {}: {} {}g / インクライン {}g / リトピノH {}g\n",
            zone.label(),
            or_placeholder(Some(s.product.as_str())),
            s.amount,
            s.incline,
            s.ritpino_h
        ));
    }
    let iron = p.iron_temperature.map(|t| format!("{t}℃"));
    out.push_str(&format!("- アイロン温度: {}\n", or_placeholder(iron.as_deref())));
    out.push_str(&format!("- 備考: {}", or_placeholder(Some(p.notes.as_str()))));
    out
}
