use crate::api::middleware::AppError;
use crate::models::{SchemaSnapshot, TableSchema};
use crate::services::database::DataBackend;

/// Snapshot of every visible table and its structure, fetched table by table.
pub async fn collect_schema(backend: &dyn DataBackend) -> Result<SchemaSnapshot, AppError> {
    let names = backend.list_tables().await?;
    tracing::debug!("Describing {} tables", names.len());

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let structure = backend.describe_table(&name).await?;
        tables.push(TableSchema { name, structure });
    }

    Ok(SchemaSnapshot { tables })
}
