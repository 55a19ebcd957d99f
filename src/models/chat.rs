use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "user" => ChatRole::User,
            _ => ChatRole::Assistant,
        }
    }
}

/// One stored line of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    /// The prompt this entry answers: the question for user entries and
    /// generated queries, the generated query for results and summaries.
    pub user_message: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        session_id: &str,
        role: ChatRole,
        content: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: session_id.to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.into(),
            user_message: user_message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Query string of the streaming chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatStreamParams {
    pub message: Option<String>,
    pub session_id: Option<String>,
    #[serde(alias = "use_mcp")]
    pub use_sql: Option<String>,
}

impl ChatStreamParams {
    pub fn session_id(&self) -> &str {
        self.session_id.as_deref().unwrap_or("1")
    }

    /// Only the literal `true` selects the query pipeline.
    pub fn use_sql(&self) -> bool {
        self.use_sql.as_deref() == Some("true")
    }
}
