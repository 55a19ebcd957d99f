// PostgreSQL backend backed by a deadpool connection pool
use crate::api::middleware::AppError;
use crate::services::database::adapter::DataBackend;
use crate::services::database::{mask_credentials, DatabaseType};
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Object, Pool, RecyclingMethod};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use tokio_postgres::NoTls;

const DEFAULT_POOL_SIZE: usize = 16;

pub struct PostgreSQLBackend {
    pool: Pool,
}

impl PostgreSQLBackend {
    pub fn new(connection_url: &str) -> Result<Self, AppError> {
        Self::with_pool_size(connection_url, DEFAULT_POOL_SIZE)
    }

    pub fn with_pool_size(connection_url: &str, max_pool_size: usize) -> Result<Self, AppError> {
        if !connection_url.starts_with("postgresql://") && !connection_url.starts_with("postgres://") {
            return Err(AppError::Validation(
                "Invalid PostgreSQL URL format. Must start with 'postgresql://' or 'postgres://'".to_string(),
            ));
        }

        tracing::info!(
            "Creating connection pool for: {} (max_size: {})",
            mask_credentials(connection_url),
            max_pool_size
        );

        let mut cfg = PoolConfig::new();
        cfg.url = Some(connection_url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
            .map_err(|e| {
                tracing::error!("Failed to create connection pool: {}", e);
                AppError::Connection(format!("Failed to create connection pool: {}", e))
            })?;
        pool.resize(max_pool_size);

        Ok(Self { pool })
    }

    async fn get_client(&self) -> Result<Object, AppError> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to get PostgreSQL connection from pool: {}", e)))
    }

    /// Split `schema.table`, defaulting to the connection's search path
    fn split_qualified(table: &str) -> (Option<&str>, &str) {
        match table.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (None, table),
        }
    }

    /// JSON number for a NUMERIC value; text when it does not fit one
    fn decimal_to_json(value: Decimal) -> Value {
        let text = value.normalize().to_string();
        match serde_json::from_str::<Number>(&text) {
            Ok(number) => Value::Number(number),
            Err(_) => Value::String(text),
        }
    }

    /// Convert PostgreSQL rows to JSON objects keyed by column name
    fn rows_to_json(rows: Vec<tokio_postgres::Row>) -> Vec<Value> {
        let mut results = Vec::with_capacity(rows.len());

        for row in rows {
            let mut row_obj = Map::new();

            for (idx, column) in row.columns().iter().enumerate() {
                let value = match column.type_().name() {
                    "int2" => row.try_get::<_, Option<i16>>(idx).ok().flatten().map(Value::from),
                    "int4" => row.try_get::<_, Option<i32>>(idx).ok().flatten().map(Value::from),
                    "int8" => row.try_get::<_, Option<i64>>(idx).ok().flatten().map(Value::from),
                    "float4" => row
                        .try_get::<_, Option<f32>>(idx)
                        .ok()
                        .flatten()
                        .and_then(|v| Number::from_f64(v as f64))
                        .map(Value::Number),
                    "float8" => row
                        .try_get::<_, Option<f64>>(idx)
                        .ok()
                        .flatten()
                        .and_then(Number::from_f64)
                        .map(Value::Number),
                    "numeric" => row
                        .try_get::<_, Option<Decimal>>(idx)
                        .ok()
                        .flatten()
                        .map(Self::decimal_to_json),
                    "bool" => row.try_get::<_, Option<bool>>(idx).ok().flatten().map(Value::Bool),
                    "json" | "jsonb" => row.try_get::<_, Option<Value>>(idx).ok().flatten(),
                    "timestamp" => row
                        .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| Value::String(v.to_string())),
                    "timestamptz" => row
                        .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| Value::String(v.to_rfc3339())),
                    "date" => row
                        .try_get::<_, Option<chrono::NaiveDate>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| Value::String(v.to_string())),
                    type_name => match row.try_get::<_, Option<String>>(idx) {
                        Ok(v) => v.map(Value::String),
                        Err(_) => {
                            tracing::warn!(
                                "Unsupported column type {} for column {}, using NULL",
                                type_name,
                                column.name()
                            );
                            None
                        }
                    },
                };

                row_obj.insert(column.name().to_string(), value.unwrap_or(Value::Null));
            }

            results.push(Value::Object(row_obj));
        }

        results
    }
}

#[async_trait::async_trait]
impl DataBackend for PostgreSQLBackend {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                r#"
                SELECT table_name::text
                FROM information_schema.tables
                WHERE table_schema = current_schema()
                  AND table_type = 'BASE TABLE'
                ORDER BY table_name
                "#,
                &[],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to list tables: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| AppError::Database(format!("Failed to read table name: {}", e)))
            })
            .collect()
    }

    async fn describe_table(&self, table: &str) -> Result<Value, AppError> {
        let (schema, name) = Self::split_qualified(table);
        let client = self.get_client().await?;
        let rows = client
            .query(
                r#"
                SELECT
                    column_name::text AS "Field",
                    data_type::text AS "Type",
                    is_nullable::text AS "Null",
                    column_default::text AS "Default"
                FROM information_schema.columns
                WHERE table_schema::text = COALESCE($1::text, current_schema()::text)
                  AND table_name::text = $2::text
                ORDER BY ordinal_position
                "#,
                &[&schema, &name],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to describe table {}: {}", table, e)))?;

        if rows.is_empty() {
            return Err(AppError::NotFound(format!("Table {} not found", table)));
        }

        Ok(Value::Array(Self::rows_to_json(rows)))
    }

    async fn run_query(&self, sql: &str) -> Result<Value, AppError> {
        let client = self.get_client().await?;
        let rows = client.query(sql, &[]).await.map_err(|e| {
            let details = match e.as_db_error() {
                Some(db_error) => format!("{} ({})", db_error.message(), db_error.code().code()),
                None => e.to_string(),
            };
            AppError::Database(details)
        })?;
        Ok(Value::Array(Self::rows_to_json(rows)))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }
}
