// Data backend trait: the schema-introspection and query-execution seam
use crate::api::middleware::AppError;
use crate::services::database::DatabaseType;
use serde_json::Value;

/// Read-only view of the data source the pipeline queries.
///
/// Implementations are shared by every concurrent request behind an `Arc`,
/// so they own their connection pooling.
#[async_trait::async_trait]
pub trait DataBackend: Send + Sync {
    /// Names of the tables visible to the connection, in backend order
    async fn list_tables(&self) -> Result<Vec<String>, AppError>;

    /// Column description of one table (one JSON object per column)
    async fn describe_table(&self, table: &str) -> Result<Value, AppError>;

    /// Run a single statement and return its rows as an array of objects
    async fn run_query(&self, sql: &str) -> Result<Value, AppError>;

    /// Dialect used to parse statements before they are run
    fn database_type(&self) -> DatabaseType;
}
