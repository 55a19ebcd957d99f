use axum::{
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{chat, triage};
use crate::api::middleware::AppError;
use crate::config::Config;
use crate::services::database::DataBackend;
use crate::services::{ChatService, CompletionClient, RenderOptions, RetryPolicy};
use crate::storage::SqliteStorage;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<SqliteStorage>,
    pub backend: Arc<dyn DataBackend>,
    pub llm: Arc<dyn CompletionClient>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Fails only when the pipeline settings are unusable (bad heuristic pattern).
    pub fn new(
        storage: Arc<SqliteStorage>,
        config: &Config,
        backend: Arc<dyn DataBackend>,
        llm: Arc<dyn CompletionClient>,
    ) -> Result<Self, AppError> {
        let policy = RetryPolicy::from_config(&config.pipeline)?;
        let chat = Arc::new(ChatService::new(
            storage.clone(),
            backend.clone(),
            llm.clone(),
            policy,
            RenderOptions::from_config(&config.render),
        ));

        Ok(Self {
            storage,
            backend,
            llm,
            chat,
        })
    }
}

/// Create router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/v1/chat/sse", get(chat::chat_stream))
        .route(
            "/api/v1/chat/history/{user_id}",
            get(chat::get_history).delete(chat::clear_history),
        )
        .route("/api/v1/chat/tables", get(chat::list_tables))
        .route(
            "/api/v1/chat/tables/{table_name}/schema",
            get(chat::table_schema),
        )
        .route("/api/v1/chat/ai-triage", post(triage::ai_triage))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "AI server is running"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeBackend, ScriptedCompletion};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app(backend: FakeBackend, llm: ScriptedCompletion) -> Router {
        let storage = Arc::new(SqliteStorage::new(":memory:").await.unwrap());
        let config = Config::from_env().unwrap();
        let state = AppState::new(storage, &config, Arc::new(backend), Arc::new(llm)).unwrap();
        create_router(state)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_state_reads_pipeline_settings_once() {
        let storage = Arc::new(SqliteStorage::new(":memory:").await.unwrap());
        let mut config = Config::from_env().unwrap();
        config.pipeline.sql_error_pattern = "(unclosed".to_string();

        let result = AppState::new(
            storage.clone(),
            &config,
            Arc::new(FakeBackend::new()),
            Arc::new(ScriptedCompletion::new()),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));

        // The settings stay with the caller; the state keeps only services
        config.pipeline.sql_error_pattern = "(?i)error".to_string();
        let state = AppState::new(
            storage,
            &config,
            Arc::new(FakeBackend::new()),
            Arc::new(ScriptedCompletion::new()),
        );
        assert!(state.is_ok());
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(FakeBackend::new(), ScriptedCompletion::new()).await;
        let response = app.oneshot(get_request("/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "ok", "message": "AI server is running"})
        );
    }

    #[tokio::test]
    async fn test_missing_message_is_rejected_before_streaming() {
        let app = app(FakeBackend::new(), ScriptedCompletion::new()).await;
        let response = app
            .oneshot(get_request("/api/v1/chat/sse?session_id=9&use_mcp=true"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_passthrough_stream() {
        let app = app(FakeBackend::new(), ScriptedCompletion::new().reply("Hello")).await;
        let response = app
            .oneshot(get_request("/api/v1/chat/sse?message=hi&use_mcp=false"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = body_text(response).await;
        let start = body.find("event: start").unwrap();
        let chunk = body.find("data: {\"text\":\"Hello\"}").unwrap();
        let end = body.find("event: end").unwrap();
        assert!(start < chunk && chunk < end);
    }

    #[tokio::test]
    async fn test_pipeline_stream_and_history() {
        let backend = FakeBackend::new()
            .with_table("users", json!([{"Field": "id"}]))
            .with_result("SELECT COUNT(*) AS n FROM users", json!([{"n": 3}]));
        let llm = ScriptedCompletion::new()
            .reply("SELECT COUNT(*) AS n FROM users")
            .reply(r#"{"message": "There are 3 users.", "isValid": true}"#);
        let app = app(backend, llm).await;

        let response = app
            .clone()
            .oneshot(get_request(
                "/api/v1/chat/sse?message=how%20many%20users&session_id=u1&use_mcp=true",
            ))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("AI summary: There are 3 users."));
        assert!(body.contains("event: end"));
        assert!(!body.contains("event: error"));

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/chat/history/u1"))
            .await
            .unwrap();
        let history = body_json(response).await;
        assert_eq!(history.as_array().unwrap().len(), 4);
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[0]["content"], "how many users");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/chat/history/u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_request("/api/v1/chat/history/u1")).await.unwrap();
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_tables_and_schema() {
        let backend = FakeBackend::new().with_table("users", json!([{"Field": "id", "Type": "int"}]));
        let app = app(backend, ScriptedCompletion::new()).await;

        let response = app.clone().oneshot(get_request("/api/v1/chat/tables")).await.unwrap();
        assert_eq!(body_json(response).await, json!({"tables": ["users"]}));

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/chat/tables/users/schema"))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"schema": [{"Field": "id", "Type": "int"}]})
        );

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/chat/tables/orders/schema"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/chat/tables/users%3Bdrop/schema"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_schema_of_hyphenated_table() {
        let backend = FakeBackend::new().with_table("order-items", json!([{"Field": "sku"}]));
        let app = app(backend, ScriptedCompletion::new()).await;

        let response = app
            .oneshot(get_request("/api/v1/chat/tables/order-items/schema"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"schema": [{"Field": "sku"}]}));
    }

    #[tokio::test]
    async fn test_ai_triage() {
        let llm = ScriptedCompletion::new()
            .reply(r#"{"criticalI": 0.1, "criticalII": 0.3, "nonCritical": 0.6, "departments": {"Cardiology": 0.7, "Emergency": 0.3}, "msg": "stable"}"#)
            .reply("no idea");
        let app = app(FakeBackend::new(), llm).await;

        let form = json!({"data": {"sex": "female", "age": 30, "complaint": "palpitations"}});
        let response = app
            .clone()
            .oneshot(post_json("/api/v1/chat/ai-triage", form.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["code"], 1);
        assert_eq!(body["data"]["nonCritical"], json!(0.6));
        assert_eq!(body["data"]["departments"]["Cardiology"], json!(0.7));
        assert_eq!(body["data"]["msg"], "stable");

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/chat/ai-triage", form))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], 2);
        assert_eq!(body["error"], "AI triage failed");

        let response = app
            .oneshot(post_json("/api/v1/chat/ai-triage", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
