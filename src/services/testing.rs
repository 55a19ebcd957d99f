// Scripted collaborators for service and router tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::api::middleware::AppError;
use crate::services::database::{DataBackend, DatabaseType};
use crate::services::llm_service::CompletionClient;

/// In-memory data backend. Unscripted statements return an empty rowset.
#[derive(Default)]
pub struct FakeBackend {
    tables: Vec<(String, Value)>,
    results: HashMap<String, Value>,
    errors: HashMap<String, String>,
    schema_error: Option<String>,
    executed: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, structure: Value) -> Self {
        self.tables.push((name.to_string(), structure));
        self
    }

    pub fn with_result(mut self, sql: &str, rows: Value) -> Self {
        self.results.insert(sql.to_string(), rows);
        self
    }

    pub fn with_error(mut self, sql: &str, message: &str) -> Self {
        self.errors.insert(sql.to_string(), message.to_string());
        self
    }

    pub fn with_schema_error(mut self, message: &str) -> Self {
        self.schema_error = Some(message.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DataBackend for FakeBackend {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        if let Some(message) = &self.schema_error {
            return Err(AppError::Database(message.clone()));
        }
        Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Value, AppError> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, structure)| structure.clone())
            .ok_or_else(|| AppError::NotFound(format!("Table '{}' not found", table)))
    }

    async fn run_query(&self, sql: &str) -> Result<Value, AppError> {
        self.executed.lock().unwrap().push(sql.to_string());
        if let Some(message) = self.errors.get(sql) {
            return Err(AppError::Database(message.clone()));
        }
        Ok(self.results.get(sql).cloned().unwrap_or_else(|| json!([])))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }
}

/// Completion client answering from a queue. An empty queue is a
/// transport failure.
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String, AppError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, reason: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(AppError::LlmService(reason.to_string())));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::LlmService("script exhausted".to_string())))
    }
}
