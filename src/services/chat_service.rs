use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{ChatMessage, ChatRole, ChatStreamParams, Question, StreamEvent};
use crate::services::database::DataBackend;
use crate::services::llm_service::CompletionClient;
use crate::services::result_renderer::RenderOptions;
use crate::services::retry_controller::{RetryController, RetryPolicy};
use crate::services::schema_service::collect_schema;
use crate::services::stream_emitter::EventSink;
use crate::storage::SqliteStorage;

/// Text of the `error` event when the run breaks after streaming began
pub const PROCESSING_FAILED: &str = "failed to process message";

/// A chat request that passed validation and has its question recorded.
#[derive(Debug, Clone)]
pub struct AcceptedChat {
    pub question: Question,
    pub session_id: String,
    pub use_sql: bool,
}

/// Drives one chat request: the query pipeline or a plain completion, plus
/// the history bookkeeping around it.
pub struct ChatService {
    storage: Arc<SqliteStorage>,
    backend: Arc<dyn DataBackend>,
    llm: Arc<dyn CompletionClient>,
    policy: RetryPolicy,
    render: RenderOptions,
}

impl ChatService {
    pub fn new(
        storage: Arc<SqliteStorage>,
        backend: Arc<dyn DataBackend>,
        llm: Arc<dyn CompletionClient>,
        policy: RetryPolicy,
        render: RenderOptions,
    ) -> Self {
        Self {
            storage,
            backend,
            llm,
            policy,
            render,
        }
    }

    /// Everything that can still fail with a plain HTTP error: a missing
    /// question, or the question not making it into history.
    pub async fn accept(&self, params: &ChatStreamParams) -> Result<AcceptedChat, AppError> {
        let question = Question::new(params.message.clone().unwrap_or_default())?;
        let session_id = params.session_id().to_string();

        self.storage
            .add_message(&ChatMessage::new(
                &session_id,
                ChatRole::User,
                question.as_str(),
                question.as_str(),
            ))
            .await?;

        tracing::info!(
            "Accepted chat message for session {} (query pipeline: {})",
            session_id,
            params.use_sql()
        );

        Ok(AcceptedChat {
            question,
            session_id,
            use_sql: params.use_sql(),
        })
    }

    /// Emit the whole event sequence for an accepted request: `start`,
    /// chunks, then `end`, with `error` in between if history could not be
    /// written.
    pub async fn respond(&self, chat: AcceptedChat, sink: &mut dyn EventSink) {
        sink.emit(StreamEvent::Start);

        let handled = if chat.use_sql {
            self.answer_with_query(&chat, sink).await
        } else {
            self.answer_directly(&chat, sink).await
        };

        if let Err(e) = handled {
            tracing::error!("Failed to process message for session {}: {}", chat.session_id, e);
            sink.emit(StreamEvent::Error {
                error: PROCESSING_FAILED.to_string(),
            });
        }

        sink.emit(StreamEvent::End);
    }

    async fn answer_directly(&self, chat: &AcceptedChat, sink: &mut dyn EventSink) -> Result<(), AppError> {
        let reply = match self.llm.complete_streaming(chat.question.as_str(), sink).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Completion failed: {}", e);
                let text = format!("AI call failed: {}", e.reason());
                sink.emit(StreamEvent::chunk(text.clone()));
                text
            }
        };

        self.record(chat, reply, chat.question.as_str()).await
    }

    async fn answer_with_query(&self, chat: &AcceptedChat, sink: &mut dyn EventSink) -> Result<(), AppError> {
        let schema = match collect_schema(self.backend.as_ref()).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!("Schema collection failed: {}", e);
                sink.emit(StreamEvent::chunk(format!(
                    "Schema retrieval or AI call failed: {}",
                    e.reason()
                )));
                return Ok(());
            }
        };

        let controller = RetryController::new(
            self.backend.as_ref(),
            self.llm.as_ref(),
            &self.policy,
            self.render,
        );
        let outcome = controller.run(&chat.question, &schema, sink).await;

        for attempt in &outcome.attempts {
            self.record(chat, attempt.generated_text(), chat.question.as_str())
                .await?;
        }

        let last_query = outcome
            .attempts
            .last()
            .map(|a| a.generated_text().to_string())
            .unwrap_or_default();
        if !outcome.rendered.is_empty() {
            self.record(chat, outcome.rendered.as_str(), &last_query).await?;
        }
        self.record(chat, outcome.summary, &last_query).await
    }

    async fn record(
        &self,
        chat: &AcceptedChat,
        content: impl Into<String>,
        user_message: &str,
    ) -> Result<(), AppError> {
        let message = ChatMessage::new(&chat.session_id, ChatRole::Assistant, content, user_message);
        self.storage.add_message(&message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SQL_ERROR_PATTERN;
    use crate::services::testing::{FakeBackend, ScriptedCompletion};
    use regex::Regex;
    use serde_json::json;
    use tempfile::tempdir;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_query_attempts: 2,
            max_validate_attempts: 3,
            sql_error_pattern: Regex::new(DEFAULT_SQL_ERROR_PATTERN).unwrap(),
        }
    }

    fn params(message: Option<&str>, use_sql: bool) -> ChatStreamParams {
        ChatStreamParams {
            message: message.map(str::to_string),
            session_id: Some("s1".to_string()),
            use_sql: Some(use_sql.to_string()),
        }
    }

    async fn service(backend: FakeBackend, llm: Arc<ScriptedCompletion>) -> (ChatService, Arc<SqliteStorage>) {
        let storage = Arc::new(SqliteStorage::new(":memory:").await.unwrap());
        let service = ChatService::new(
            storage.clone(),
            Arc::new(backend),
            llm,
            policy(),
            RenderOptions::default(),
        );
        (service, storage)
    }

    #[tokio::test]
    async fn test_empty_question_rejected_before_streaming() {
        let (service, storage) = service(FakeBackend::new(), Arc::new(ScriptedCompletion::new())).await;

        let err = service.accept(&params(Some("  "), true)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = service.accept(&params(None, true)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(storage.list_messages("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_run_streams_and_records_history() {
        let backend = FakeBackend::new()
            .with_table("users", json!([{"Field": "id"}]))
            .with_result("SELECT COUNT(*) AS n FROM users", json!([{"n": 3}]));
        let llm = Arc::new(
            ScriptedCompletion::new()
                .reply("SELECT COUNT(*) AS n FROM users")
                .reply(r#"{"message": "There are 3 users.", "isValid": true}"#),
        );
        let (service, storage) = service(backend, llm).await;

        let chat = service.accept(&params(Some("how many users?"), true)).await.unwrap();
        let mut events = Vec::new();
        service.respond(chat, &mut events).await;

        assert_eq!(events.first(), Some(&StreamEvent::Start));
        assert_eq!(events.last(), Some(&StreamEvent::End));
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], StreamEvent::chunk("AI summary: There are 3 users."));

        let history = storage.list_messages("s1").await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0], "how many users?");
        assert_eq!(contents[1], "SELECT COUNT(*) AS n FROM users");
        assert!(contents[2].starts_with("Generated SQL:"));
        assert_eq!(contents[3], "There are 3 users.");
        assert_eq!(history[3].user_message, "SELECT COUNT(*) AS n FROM users");
    }

    #[tokio::test]
    async fn test_schema_failure_becomes_chunk() {
        let backend = FakeBackend::new().with_schema_error("Access denied for user");
        let llm = Arc::new(ScriptedCompletion::new());
        let (service, _storage) = service(backend, llm.clone()).await;

        let chat = service.accept(&params(Some("q"), true)).await.unwrap();
        let mut events = Vec::new();
        service.respond(chat, &mut events).await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::chunk("Schema retrieval or AI call failed: Access denied for user"),
                StreamEvent::End,
            ]
        );
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_passthrough_reply_and_failure() {
        let llm = Arc::new(ScriptedCompletion::new().reply("Hello there").fail("503 Service Unavailable"));
        let (service, storage) = service(FakeBackend::new(), llm).await;

        let chat = service.accept(&params(Some("hi"), false)).await.unwrap();
        let mut events = Vec::new();
        service.respond(chat, &mut events).await;
        assert_eq!(events[1], StreamEvent::chunk("Hello there"));

        let chat = service.accept(&params(Some("hi again"), false)).await.unwrap();
        let mut events = Vec::new();
        service.respond(chat, &mut events).await;
        assert_eq!(events[1], StreamEvent::chunk("AI call failed: 503 Service Unavailable"));
        assert_eq!(events[2], StreamEvent::End);

        let history = storage.list_messages("s1").await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].content, "Hello there");
        assert_eq!(history[3].content, "AI call failed: 503 Service Unavailable");
    }

    #[tokio::test]
    async fn test_history_failure_after_start_emits_error_then_end() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("history.db");
        let storage = Arc::new(SqliteStorage::new(&db_path).await.unwrap());
        let llm = Arc::new(ScriptedCompletion::new().reply("Hello"));
        let service = ChatService::new(
            storage,
            Arc::new(FakeBackend::new()),
            llm,
            policy(),
            RenderOptions::default(),
        );

        let chat = service.accept(&params(Some("hi"), false)).await.unwrap();
        // pull the table out from under the store
        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute("DROP TABLE chat_history", [])
            .unwrap();

        let mut events = Vec::new();
        service.respond(chat, &mut events).await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::chunk("Hello"),
                StreamEvent::Error {
                    error: PROCESSING_FAILED.to_string()
                },
                StreamEvent::End,
            ]
        );
    }
}
