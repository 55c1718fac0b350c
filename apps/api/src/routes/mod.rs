pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::counseling::handlers as counseling;
use crate::planning::handlers as planning;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Customers
        .route(
            "/api/v1/customers",
            get(counseling::handle_list_customers).post(counseling::handle_create_customer),
        )
        .route(
            "/api/v1/customers/:customer_id/sessions",
            get(counseling::handle_customer_sessions),
        )
        // Sessions
        .route("/api/v1/sessions", post(counseling::handle_create_session))
        .route(
            "/api/v1/sessions/:session_id",
            get(counseling::handle_get_session),
        )
        .route(
            "/api/v1/sessions/:session_id/hair-condition",
            get(counseling::handle_get_hair_condition).post(counseling::handle_save_hair_condition),
        )
        .route(
            "/api/v1/sessions/:session_id/assessment",
            get(counseling::handle_get_assessment).post(counseling::handle_save_assessment),
        )
        .route(
            "/api/v1/sessions/:session_id/complete",
            post(counseling::handle_complete_session),
        )
        .route(
            "/api/v1/knowledge",
            get(counseling::handle_list_knowledge).post(counseling::handle_save_knowledge),
        )
        // AI
        .route(
            "/api/v1/sessions/:session_id/generate-plan",
            post(planning::handle_generate_plan),
        )
        .route(
            "/api/v1/sessions/:session_id/review-plan",
            post(planning::handle_review_plan),
        )
        .route("/api/v1/ai-suggestion", post(planning::handle_ai_suggestion))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::counseling::repository::CounselingRepository;
    use crate::llm_client::testing::{Script, ScriptedCompletion};
    use crate::llm_client::Completion;
    use crate::planning::inflight::InFlight;
    use crate::store::testing::memory_tiers;

    fn app_with(llm: impl Completion + 'static) -> (Router, AppState) {
        let state = AppState {
            repo: CounselingRepository::new(memory_tiers().0),
            llm: Arc::new(llm),
            config: Config::for_tests(),
            in_flight: InFlight::default(),
        };
        (build_router(state.clone()), state)
    }

    fn app() -> Router {
        app_with(ScriptedCompletion::new(Script::MissingCredential)).0
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn create_session(app: &Router, extra: Value) -> (String, String) {
        let (status, customer) = send(app, post("/api/v1/customers", json!({"name": "山田 花子"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let customer_id = customer["id"].as_str().unwrap().to_string();

        let mut body = json!({"customerId": customer_id});
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        let (status, session) = send(app, post("/api/v1/sessions", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        (customer_id, session["id"].as_str().unwrap().to_string())
    }

    fn hair_body(ends_damage: u8) -> Value {
        json!({
            "timing": "before",
            "condition": {
                "root": {"damage": 1, "curl": "strong"},
                "middle": {"damage": 3, "curl": "medium"},
                "ends": {"damage": ends_damage, "curl": "light"}
            },
            "history": {"bleachCount": "1", "hasStraightening": false}
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_customer_create_validation_and_search() {
        let app = app();
        let (status, body) = send(&app, post("/api/v1/customers", json!({"name": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        send(&app, post("/api/v1/customers", json!({"name": "佐藤", "phone": "080-1234"}))).await;
        send(&app, post("/api/v1/customers", json!({"name": "鈴木"}))).await;

        let (status, body) = send(&app, get("/api/v1/customers?search=1234")).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "佐藤");
    }

    #[tokio::test]
    async fn test_session_uses_explicit_ids_then_config_defaults() {
        let app = app();
        let (_, explicit) = create_session(&app, json!({"staffId": "st-9", "storeId": "sh-2"})).await;
        let (_, body) = send(&app, get(&format!("/api/v1/sessions/{explicit}"))).await;
        assert_eq!(body["stylistId"], "st-9");
        assert_eq!(body["storeId"], "sh-2");
        assert_eq!(body["status"], "draft");

        let (_, defaulted) = create_session(&app, json!({})).await;
        let (_, body) = send(&app, get(&format!("/api/v1/sessions/{defaulted}"))).await;
        assert_eq!(body["stylistId"], "stylist-test");
        assert_eq!(body["storeId"], "store-test");
    }

    #[tokio::test]
    async fn test_session_for_unknown_customer_is_404() {
        let (status, body) = send(&app(), post("/api/v1/sessions", json!({"customerId": "nobody"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_hair_condition_round_trip_and_damage_bounds() {
        let app = app();
        let (_, session) = create_session(&app, json!({})).await;
        let uri = format!("/api/v1/sessions/{session}/hair-condition");

        let (status, body) = send(&app, post(&uri, hair_body(7))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(&app, post(&uri, hair_body(5))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get(&format!("{uri}?timing=before"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["condition"]["ends"]["damage"], 5);
        assert_eq!(body["history"]["bleachCount"], "1");

        let (status, _) = send(&app, get(&format!("{uri}?timing=after"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_assessment_save_and_fetch() {
        let app = app();
        let (_, session) = create_session(&app, json!({})).await;
        let uri = format!("/api/v1/sessions/{session}/assessment");

        let (status, _) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            post(&uri, json!({"assessmentNotes": "乾燥", "concerns": "広がり、うねり", "customerRequests": "まとまり重視"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get(&uri)).await;
        assert_eq!(body["customerRequests"], "まとまり重視");
    }

    #[tokio::test]
    async fn test_generate_plan_without_key_returns_demo_with_200() {
        let app = app();
        let (_, session) = create_session(&app, json!({})).await;
        let (status, body) = send(
            &app,
            post(&format!("/api/v1/sessions/{session}/generate-plan"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "demo");
        assert!(body["plan"]["recommendedMenu"].as_str().unwrap().contains("デモ"));

        let (_, stored) = send(&app, get(&format!("/api/v1/sessions/{session}"))).await;
        assert_eq!(stored["status"], "plan_generated");
    }

    #[tokio::test]
    async fn test_generate_plan_provider_failure_is_200_with_error_detail() {
        let (app, _) = app_with(ScriptedCompletion::new(Script::Api(401, "invalid x-api-key".to_string())));
        let (_, session) = create_session(&app, json!({})).await;
        let (status, body) = send(
            &app,
            post(&format!("/api/v1/sessions/{session}/generate-plan"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "provider_error");
        let risks = body["plan"]["risksAndPrecautions"].to_string();
        assert!(risks.contains("invalid x-api-key"));
    }

    #[tokio::test]
    async fn test_concurrent_generate_for_same_session_is_409() {
        let (app, state) = app_with(ScriptedCompletion::text("{}"));
        let (_, session) = create_session(&app, json!({})).await;

        let _held = state.in_flight.try_begin(&session).unwrap();
        let (status, body) = send(
            &app,
            post(&format!("/api/v1/sessions/{session}/review-plan"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_review_with_garbage_reply_fails_open() {
        let (app, _) = app_with(ScriptedCompletion::text("毛先は危険です {not json"));
        let (_, session) = create_session(&app, json!({})).await;
        let (status, body) = send(
            &app,
            post(
                &format!("/api/v1/sessions/{session}/review-plan"),
                json!({"powerLevel": 3, "ironTemperature": 200}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "fallback");
        assert_eq!(
            body["review"],
            json!({"overall": "ok", "sections": {}, "suggestions": [], "warnings": []})
        );

        let (_, stored) = send(&app, get(&format!("/api/v1/sessions/{session}"))).await;
        assert_eq!(stored["status"], "in_progress");
        assert_eq!(stored["staffPrescription"]["ironTemperature"], 200);
    }

    #[tokio::test]
    async fn test_review_rejects_out_of_range_power_level() {
        let app = app();
        let (_, session) = create_session(&app, json!({})).await;
        let (status, _) = send(
            &app,
            post(&format!("/api/v1/sessions/{session}/review-plan"), json!({"powerLevel": 11})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ai_suggestion_scenario() {
        let (app, _) = app_with(ScriptedCompletion::text(
            "Hello ```json\n{\"summary\": {\"faceShape\": \"卵型\", \"personalColor\": \"ブルベ夏\", \"matchRate\": 90}, \"colors\": [], \"styles\": [], \"advice\": [\"a\"], \"aiAnalysis\": \"x\"}\n``` thanks",
        ));
        let (status, body) = send(
            &app,
            post(
                "/api/v1/ai-suggestion",
                json!({"faceShape": "卵型", "personalColor": "Summer", "customerRequest": ""}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["matchRate"], 90);
        assert_eq!(body["source"], "ai");
    }

    #[tokio::test]
    async fn test_complete_updates_history_and_visit_count() {
        let app = app();
        let (customer, session) = create_session(&app, json!({})).await;
        send(&app, post(&format!("/api/v1/sessions/{session}/hair-condition"), hair_body(4))).await;
        send(
            &app,
            post(
                &format!("/api/v1/sessions/{session}/assessment"),
                json!({"concerns": "広がり、うねり、ツヤ"}),
            ),
        )
        .await;

        let (status, body) = send(&app, post(&format!("/api/v1/sessions/{session}/complete"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");

        let (_, history) = send(&app, get(&format!("/api/v1/customers/{customer}/sessions"))).await;
        let row = &history.as_array().unwrap()[0];
        assert_eq!(row["hairConditionSummary"], "根元Lv.1 / 中間Lv.3 / 毛先Lv.4");
        assert_eq!(row["treatmentSummary"], "広がり・うねり");

        let (_, customers) = send(&app, get("/api/v1/customers")).await;
        assert_eq!(customers[0]["visitCount"], 1);
    }

    #[tokio::test]
    async fn test_saved_knowledge_reaches_plan_prompt() {
        let llm = Arc::new(ScriptedCompletion::text("{}"));
        let state = AppState {
            repo: CounselingRepository::new(memory_tiers().0),
            llm: llm.clone(),
            config: Config::for_tests(),
            in_flight: InFlight::default(),
        };
        let app = build_router(state);
        let (status, _) = send(
            &app,
            post(
                "/api/v1/knowledge",
                json!({"id": "k1", "category": "meteo_recipe", "title": "配合レシピ", "content": "10.5 + インクライン6g", "priority": 3}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, listed) = send(&app, get("/api/v1/knowledge")).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (_, session) = create_session(&app, json!({})).await;
        let (_, body) = send(
            &app,
            post(&format!("/api/v1/sessions/{session}/generate-plan"), json!({})),
        )
        .await;
        assert_eq!(body["source"], "ai");
        let (prompt, _) = llm.last_prompt().unwrap();
        assert!(prompt.contains("## 配合レシピ\n\n10.5 + インクライン6g"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_404_everywhere() {
        let app = app();
        for req in [
            get("/api/v1/sessions/missing"),
            post("/api/v1/sessions/missing/complete", json!({})),
            post("/api/v1/sessions/missing/generate-plan", json!({})),
            get("/api/v1/sessions/missing/assessment"),
        ] {
            let (status, _) = send(&app, req).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
    }
}
