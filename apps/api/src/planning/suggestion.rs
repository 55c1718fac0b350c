//! Color and style suggestions from a face-shape / personal-color profile.
//!
//! Stateless: nothing is persisted, the result goes straight back to the form.

use serde::{Deserialize, Serialize};

use crate::llm_client::parser::de;
use crate::llm_client::{Completion, CompletionOptions};
use crate::planning::prompts::{
    build_suggestion_prompt, StyleProfile, MATCHING_KNOWLEDGE, SUGGESTION_MAX_TOKENS,
    SUGGESTION_MODEL,
};
use crate::planning::{request, AiOutput, Generated};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestionSummary {
    #[serde(deserialize_with = "de::text")]
    pub face_shape: String,
    #[serde(deserialize_with = "de::text")]
    pub personal_color: String,
    #[serde(deserialize_with = "de::int")]
    pub match_rate: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSuggestion {
    #[serde(deserialize_with = "de::text")]
    pub name: String,
    /// `#RRGGBB`
    #[serde(deserialize_with = "de::text")]
    pub code: String,
    #[serde(deserialize_with = "de::text")]
    pub desc: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSuggestion {
    #[serde(deserialize_with = "de::int")]
    pub id: i64,
    #[serde(deserialize_with = "de::text")]
    pub title: String,
    #[serde(deserialize_with = "de::text")]
    pub desc: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestionResult {
    #[serde(deserialize_with = "de::or_default")]
    pub summary: SuggestionSummary,
    #[serde(deserialize_with = "de::or_default")]
    pub colors: Vec<ColorSuggestion>,
    #[serde(deserialize_with = "de::or_default")]
    pub styles: Vec<StyleSuggestion>,
    #[serde(deserialize_with = "de::text_list")]
    pub advice: Vec<String>,
    #[serde(deserialize_with = "de::text")]
    pub ai_analysis: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl AiOutput for SuggestionResult {
    const LABEL: &'static str = "style suggestion";

    fn parse_fallback() -> Self {
        Self {
            summary: SuggestionSummary {
                face_shape: "AI診断中...".to_string(),
                personal_color: "診断中...".to_string(),
                match_rate: 0,
            },
            colors: Vec::new(),
            styles: Vec::new(),
            advice: strings(&[
                "AIの応答が不安定なため、完全な診断結果を表示できませんでした。",
                "スタイリストにご相談ください。",
            ]),
            ai_analysis: "AIの応答を読み取れませんでした。もう一度試すか、スタイリストと直接相談しながら決めてください。".to_string(),
        }
    }

    fn provider_fallback(error_summary: &str) -> Self {
        Self {
            summary: SuggestionSummary {
                face_shape: "診断エラー".to_string(),
                personal_color: "不明".to_string(),
                match_rate: 0,
            },
            colors: Vec::new(),
            styles: Vec::new(),
            advice: strings(&[
                "申し訳ありません。AIサービスの接続に失敗しました。",
                "時間をおいて再度お試しください。",
            ]),
            ai_analysis: format!("エラー詳細: {error_summary}"),
        }
    }

    fn demo() -> Self {
        Self {
            summary: SuggestionSummary {
                face_shape: "卵型 (デモ)".to_string(),
                personal_color: "ブルベ夏 (デモ)".to_string(),
                match_rate: 88,
            },
            colors: vec![ColorSuggestion {
                name: "デモベージュ".to_string(),
                code: "#E0C0A0".to_string(),
                desc: "APIキーが設定されていないためデモデータを返しています".to_string(),
            }],
            styles: vec![StyleSuggestion {
                id: 1,
                title: "デモショート".to_string(),
                desc: "APIキー未設定".to_string(),
            }],
            advice: strings(&[
                "APIキーを設定してください",
                "ANTHROPIC_API_KEY の設定を確認してください",
            ]),
            ai_analysis: "これはデモレスポンスです。APIキーを設定すると、AIによる診断結果が表示されます。".to_string(),
        }
    }
}

pub async fn suggest_style(llm: &dyn Completion, profile: &StyleProfile) -> Generated<SuggestionResult> {
    let prompt = build_suggestion_prompt(profile, MATCHING_KNOWLEDGE);
    let options = CompletionOptions::new(SUGGESTION_MODEL, SUGGESTION_MAX_TOKENS);
    request(llm, &prompt, &options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{Script, ScriptedCompletion};
    use crate::planning::AiSource;

    fn profile() -> StyleProfile {
        serde_json::from_str(
            r#"{"faceShape": "卵型", "personalColor": "Summer", "customerRequest": ""}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fenced_reply_with_prose_is_extracted() {
        let llm = ScriptedCompletion::text(
            "Hello ```json\n{\"summary\": {\"faceShape\": \"卵型\", \"personalColor\": \"ブルベ夏\", \"matchRate\": 90}, \
             \"colors\": [{\"name\": \"ラベンダーアッシュ\", \"code\": \"#B8A8C8\", \"desc\": \"透明感\"}], \
             \"styles\": [{\"id\": 1, \"title\": \"くびれミディ\", \"desc\": \"バランス型\"}], \
             \"advice\": [\"前髪は流す\"], \"aiAnalysis\": \"Out Form はひし形\"}\n``` thanks",
        );
        let out = suggest_style(&llm, &profile()).await;
        assert_eq!(out.source, AiSource::Ai);
        assert_eq!(out.value.summary.match_rate, 90);
        assert_eq!(out.value.colors[0].code, "#B8A8C8");
        assert_eq!(out.value.styles[0].title, "くびれミディ");
    }

    #[tokio::test]
    async fn test_reply_without_braces_falls_back() {
        let llm = ScriptedCompletion::text("I'm sorry, I can't help with that.");
        let out = suggest_style(&llm, &profile()).await;
        assert_eq!(out.source, AiSource::Fallback);
        assert_eq!(out.value.summary.match_rate, 0);
        assert!(!out.value.advice.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_uses_suggestion_model_without_system_prompt() {
        let llm = ScriptedCompletion::text("{}");
        suggest_style(&llm, &profile()).await;
        let (prompt, options) = llm.last_prompt().unwrap();
        assert_eq!(options.model, SUGGESTION_MODEL);
        assert_eq!(options.max_tokens, 3000);
        assert!(options.system.is_none());
        assert!(prompt.contains("# Matching Knowledge"));
    }

    #[tokio::test]
    async fn test_demo_and_provider_fallbacks() {
        let demo = suggest_style(&ScriptedCompletion::new(Script::MissingCredential), &profile()).await;
        assert_eq!(demo.source, AiSource::Demo);
        assert_eq!(demo.value.summary.match_rate, 88);
        assert!(demo.value.summary.face_shape.contains("デモ"));

        let failed = suggest_style(
            &ScriptedCompletion::new(Script::Api(500, "internal".to_string())),
            &profile(),
        )
        .await;
        assert_eq!(failed.source, AiSource::ProviderError);
        assert_eq!(failed.value.summary.face_shape, "診断エラー");
        assert!(failed.value.ai_analysis.starts_with("エラー詳細: "));
        assert!(failed.value.ai_analysis.contains("internal"));
    }
}
