use serde::Serialize;
use serde_json::Value;

use crate::api::middleware::AppError;
use crate::services::query_executor::split_statements;

/// The user's question for one pipeline run. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    pub fn new(raw: impl Into<String>) -> Result<Self, AppError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(AppError::Validation("message is required".to_string()));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structure description of one table as returned by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub structure: Value,
}

/// Table names plus per-table structure, collected once per run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSchema>,
}

impl SchemaSnapshot {
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Prompt fragment: one "Table"/"Structure" pair per table.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            out.push_str(&format!(
                "Table: {}\nStructure: {}\n",
                table.name,
                serde_json::to_string(&table.structure).unwrap_or_default()
            ));
        }
        out
    }
}

/// One generated query candidate and the statements split out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAttempt {
    generated_text: String,
    statements: Vec<String>,
}

impl QueryAttempt {
    pub fn new(generated_text: impl Into<String>) -> Self {
        let generated_text = generated_text.into();
        let statements = split_statements(&generated_text);
        Self {
            generated_text,
            statements,
        }
    }

    pub fn generated_text(&self) -> &str {
        &self.generated_text
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatementOutcome {
    Success { rows: Value },
    Failure { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementResult {
    pub statement: String,
    pub outcome: StatementOutcome,
}

impl StatementResult {
    pub fn success(statement: impl Into<String>, rows: Value) -> Self {
        Self {
            statement: statement.into(),
            outcome: StatementOutcome::Success { rows },
        }
    }

    pub fn failure(statement: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            outcome: StatementOutcome::Failure {
                error: error.into(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, StatementOutcome::Failure { .. })
    }

    /// The value shown to the validator and the renderer: the rowset, or the
    /// failure text as a plain string.
    pub fn display_value(&self) -> Value {
        match &self.outcome {
            StatementOutcome::Success { rows } => rows.clone(),
            StatementOutcome::Failure { error } => {
                Value::String(format!("SQL execution failed: {}", error))
            }
        }
    }
}

/// Model output for a summary/validation request before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Structured { message: String, is_valid: bool },
    Unstructured { raw_text: String },
}

impl Verdict {
    pub fn into_validation(self) -> ValidationVerdict {
        match self {
            Verdict::Structured { message, is_valid } => ValidationVerdict { message, is_valid },
            Verdict::Unstructured { raw_text } => ValidationVerdict {
                message: raw_text,
                is_valid: false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationVerdict {
    pub message: String,
    #[serde(rename = "isValid")]
    pub is_valid: bool,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A verdict accepted the result.
    Validated,
    /// Both retry budgets were spent; the last summary is delivered as is.
    Exhausted,
    /// A completion call failed; the failure text is delivered instead.
    Faulted,
}

/// What one pipeline run hands back after its events have been emitted.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub status: RunStatus,
    pub attempts: Vec<QueryAttempt>,
    pub rendered: String,
    pub summary: String,
    pub validations: usize,
}
