//! Treatment plan produced by the model, plus the fixed substitutes used when it can't be.
//!
//! Every field defaults and every field reads leniently, so any reply that is
//! valid JSON renders as the model wrote it. The fallbacks cover unparseable text only.

use serde::{Deserialize, Serialize};

use crate::llm_client::parser::de;
use crate::planning::AiOutput;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HairAnalysis {
    #[serde(deserialize_with = "de::int")]
    pub power_level: i64,
    #[serde(deserialize_with = "de::text")]
    pub curl_level: String,
    #[serde(deserialize_with = "de::text")]
    pub zone: String,
    #[serde(deserialize_with = "de::text_list")]
    pub risk_factors: Vec<String>,
}

/// Cream and additive amounts for one zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductDose {
    #[serde(deserialize_with = "de::text")]
    pub product: String,
    #[serde(deserialize_with = "de::text")]
    pub amount: String,
    #[serde(deserialize_with = "de::text")]
    pub incline: String,
    #[serde(deserialize_with = "de::text")]
    pub ritpino_h: String,
    #[serde(deserialize_with = "de::text")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSelection {
    #[serde(deserialize_with = "de::or_default")]
    pub root: ProductDose,
    #[serde(deserialize_with = "de::or_default")]
    pub middle: ProductDose,
    #[serde(deserialize_with = "de::or_default")]
    pub ends: ProductDose,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessStep {
    #[serde(deserialize_with = "de::int")]
    pub step: i64,
    #[serde(deserialize_with = "de::text")]
    pub action: String,
    #[serde(deserialize_with = "de::int")]
    pub time_minutes: i64,
    #[serde(deserialize_with = "de::text")]
    pub details: String,
    /// Iron temperature in °C, only on heat steps.
    #[serde(
        deserialize_with = "de::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedResults {
    #[serde(deserialize_with = "de::text")]
    pub shine: String,
    #[serde(deserialize_with = "de::text")]
    pub texture: String,
    #[serde(deserialize_with = "de::text")]
    pub duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AfterCare {
    #[serde(deserialize_with = "de::text")]
    pub immediate: String,
    #[serde(deserialize_with = "de::text")]
    pub home_care: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreatmentPlan {
    #[serde(deserialize_with = "de::text")]
    pub recommended_menu: String,
    /// Yen, tax included.
    #[serde(deserialize_with = "de::int")]
    pub recommended_price: i64,
    #[serde(deserialize_with = "de::int")]
    pub duration_minutes: i64,
    #[serde(deserialize_with = "de::or_default")]
    pub hair_analysis: HairAnalysis,
    #[serde(deserialize_with = "de::or_default")]
    pub product_selection: ProductSelection,
    #[serde(deserialize_with = "de::or_default")]
    pub treatment_process: Vec<ProcessStep>,
    #[serde(deserialize_with = "de::text_list")]
    pub risks_and_precautions: Vec<String>,
    #[serde(deserialize_with = "de::or_default")]
    pub expected_results: ExpectedResults,
    #[serde(deserialize_with = "de::or_default")]
    pub after_care: AfterCare,
    #[serde(deserialize_with = "de::text")]
    pub next_visit_recommendation: String,
}

fn dose(product: &str, incline: &str, reason: &str) -> ProductDose {
    ProductDose {
        product: product.to_string(),
        amount: "60g".to_string(),
        incline: incline.to_string(),
        ritpino_h: "0g".to_string(),
        reason: reason.to_string(),
    }
}

fn step(n: i64, action: &str, minutes: i64, temperature: Option<&str>) -> ProcessStep {
    ProcessStep {
        step: n,
        action: action.to_string(),
        time_minutes: minutes,
        details: String::new(),
        temperature: temperature.map(str::to_string),
        notes: String::new(),
    }
}

fn standard_process() -> Vec<ProcessStep> {
    vec![
        step(1, "前処理", 10, None),
        step(2, "薬剤塗布", 20, None),
        step(3, "放置・チェック", 20, None),
        step(4, "中間水洗", 5, None),
        step(5, "中間処理", 10, None),
        step(6, "ドライ", 15, None),
        step(7, "アイロン", 30, Some("180")),
        step(8, "2剤・仕上げ", 20, None),
    ]
}

impl TreatmentPlan {
    /// Served when the model replied but its text could not be parsed.
    pub fn parse_fallback() -> Self {
        Self::standard(vec![
            "AI解析エラー: プランを自動生成できませんでした。手動で確認・調整してください。".to_string(),
        ])
    }

    /// Served when the provider call itself failed. `error_summary` is shown to the stylist.
    pub fn provider_fallback(error_summary: &str) -> Self {
        Self::standard(vec![
            "AIサービスに接続できませんでした。標準処方を表示しています。".to_string(),
            format!("エラー詳細: {error_summary}"),
        ])
    }

    /// Served when no API key is configured.
    pub fn demo() -> Self {
        let mut plan = Self::standard(vec![
            "デモ表示: APIキーが設定されていないためAI生成は行われていません。".to_string(),
        ]);
        plan.recommended_menu = "メテオトリートメント (デモ)".to_string();
        plan
    }

    fn standard(risks: Vec<String>) -> Self {
        Self {
            recommended_menu: "メテオトリートメント".to_string(),
            recommended_price: 16500,
            duration_minutes: 120,
            hair_analysis: HairAnalysis {
                power_level: 5,
                curl_level: "要確認".to_string(),
                zone: "要確認".to_string(),
                risk_factors: vec!["AI解析なし - 手動確認必要".to_string()],
            },
            product_selection: ProductSelection {
                root: dose("ネオメテオクリーム10.5", "6g", "標準処方"),
                middle: dose("ネオメテオクリーム7.0", "6g", "標準処方"),
                ends: dose("ネオメテオクリーム4.5", "0g", "ダメージケア"),
            },
            treatment_process: standard_process(),
            risks_and_precautions: risks,
            expected_results: ExpectedResults {
                shine: "要確認".to_string(),
                texture: "要確認".to_string(),
                duration: "要確認".to_string(),
            },
            after_care: AfterCare {
                immediate: "当日はシャンプーを避ける".to_string(),
                home_care: "しっかり乾かす".to_string(),
            },
            next_visit_recommendation: "1.5〜2ヶ月後".to_string(),
        }
    }
}

impl AiOutput for TreatmentPlan {
    const LABEL: &'static str = "treatment plan";

    fn parse_fallback() -> Self {
        TreatmentPlan::parse_fallback()
    }

    fn provider_fallback(error_summary: &str) -> Self {
        TreatmentPlan::provider_fallback(error_summary)
    }

    fn demo() -> Self {
        TreatmentPlan::demo()
    }
}
