use crate::models::{QueryAttempt, StatementResult};
use crate::services::database::DataBackend;
use crate::validation::SqlValidator;

/// Split generated text on `;` into trimmed, non-empty statements, keeping
/// their order.
pub fn split_statements(text: &str) -> Vec<String> {
    text.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runs the statements of a query attempt against the data backend.
///
/// Failures never escape: a rejected or failing statement becomes a
/// failure result and the batch carries on with the next one.
pub struct QueryExecutor<'a> {
    backend: &'a dyn DataBackend,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(backend: &'a dyn DataBackend) -> Self {
        Self { backend }
    }

    pub async fn execute(&self, statement: &str) -> StatementResult {
        if let Err(e) = SqlValidator::validate_select_only(statement, self.backend.database_type()) {
            tracing::warn!("Rejected generated statement: {}", e);
            return StatementResult::failure(statement, e.reason());
        }

        match self.backend.run_query(statement).await {
            Ok(rows) => StatementResult::success(statement, rows),
            Err(e) => {
                tracing::warn!("Statement failed: {} ({})", statement, e);
                StatementResult::failure(statement, e.reason())
            }
        }
    }

    /// Statements run strictly one after another; later ones may rely on
    /// what earlier ones left behind.
    pub async fn execute_all(&self, attempt: &QueryAttempt) -> Vec<StatementResult> {
        let mut results = Vec::with_capacity(attempt.statements().len());
        for statement in attempt.statements() {
            results.push(self.execute(statement).await);
        }
        results
    }
}
