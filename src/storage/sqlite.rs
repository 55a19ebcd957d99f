use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{ChatMessage, ChatRole};

/// SQLite store for chat history
/// Uses tokio::Mutex for async-friendly locking
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the history database. Accepts a plain path,
    /// `sqlite:path`, `sqlite://path` or `:memory:`.
    pub async fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path: &str = if path_str.starts_with("sqlite:") {
            path_str.trim_start_matches("sqlite:").trim_start_matches("//")
        } else {
            path_str.as_ref()
        };

        let conn = Connection::open(clean_path)?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                user_message TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_history_user_created ON chat_history(user_id, created_at)",
            [],
        )?;

        Ok(())
    }

    pub async fn add_message(&self, message: &ChatMessage) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO chat_history (id, user_id, session_id, role, content, user_message, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            rusqlite::params![
                message.id,
                message.user_id,
                message.session_id,
                message.role.as_str(),
                message.content,
                message.user_message,
                // fixed width so text order is time order
                message.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(())
    }

    /// Every message of a user, oldest first
    pub async fn list_messages(&self, user_id: &str) -> SqliteResult<Vec<ChatMessage>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, session_id, role, content, user_message, created_at
            FROM chat_history
            WHERE user_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let messages = stmt.query_map([user_id], |row| {
            let role: String = row.get(3)?;
            let created_at: String = row.get(6)?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?
                .with_timezone(&Utc);

            Ok(ChatMessage {
                id: row.get(0)?,
                user_id: row.get(1)?,
                session_id: row.get(2)?,
                role: ChatRole::from_str(&role),
                content: row.get(4)?,
                user_message: row.get(5)?,
                created_at,
            })
        })?;

        messages.collect()
    }

    /// Returns how many messages were removed
    pub async fn clear_messages(&self, user_id: &str) -> SqliteResult<usize> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM chat_history WHERE user_id = ?1", [user_id])
    }
}
