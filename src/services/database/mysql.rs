// MySQL backend using connection pooling for concurrent pipeline runs
use crate::api::middleware::AppError;
use crate::services::database::adapter::DataBackend;
use crate::services::database::DatabaseType;
use mysql_async::{prelude::*, Conn, Pool, Row, Value as MySqlValue};
use serde_json::{json, Value};
use std::time::Instant;
use url::Url;

pub struct MySQLBackend {
    pool: Pool,
}

impl MySQLBackend {
    pub fn new(connection_url: &str) -> Result<Self, AppError> {
        // Validate MySQL URL format
        let url = Url::parse(connection_url)
            .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))?;

        if url.scheme() != "mysql" && url.scheme() != "mariadb" {
            return Err(AppError::Validation("URL must use mysql:// or mariadb:// scheme".to_string()));
        }

        // mysql_async only understands the mysql:// scheme
        let mut url = url;
        if url.scheme() == "mariadb" {
            url.set_scheme("mysql")
                .map_err(|_| AppError::Validation("Invalid MariaDB URL".to_string()))?;
        }

        let pool = Pool::from_url(url.as_str())
            .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<Conn, AppError> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to get MySQL connection from pool: {}", e)))
    }

    /// Backtick-quote each part of a possibly schema-qualified name.
    /// Embedded backticks are doubled, so any name `SHOW TABLES` returns
    /// can be described.
    fn quote_identifier(table: &str) -> String {
        table
            .split('.')
            .map(|part| format!("`{}`", part.replace('`', "``")))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Convert rows to JSON objects, keeping column order
    fn rows_to_json(rows: Vec<Row>) -> Vec<Value> {
        let mut json_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row_obj = serde_json::Map::new();
            let columns = row.columns_ref();

            for (idx, column) in columns.iter().enumerate() {
                let value: Value = match row.get_opt::<MySqlValue, usize>(idx) {
                    Some(Ok(mysql_val)) => Self::mysql_value_to_json(mysql_val),
                    Some(Err(_)) | None => Value::Null,
                };
                row_obj.insert(column.name_str().to_string(), value);
            }
            json_rows.push(Value::Object(row_obj));
        }
        json_rows
    }

    /// Helper function to convert MySQL Value to JSON Value
    fn mysql_value_to_json(mysql_val: MySqlValue) -> Value {
        match mysql_val {
            MySqlValue::NULL => Value::Null,
            MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(s) => json!(s),
                Err(_) => Value::Null,
            },
            MySqlValue::Int(i) => json!(i),
            MySqlValue::UInt(u) => json!(u),
            MySqlValue::Float(f) => json!(f),
            MySqlValue::Double(d) => json!(d),
            MySqlValue::Date(y, m, d, h, min, s, _) => {
                json!(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s))
            }
            MySqlValue::Time(is_neg, d, h, m, s, _) => {
                let sign = if is_neg { "-" } else { "" };
                let total_hours = d * 24 + h as u32;
                json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
            }
        }
    }
}

#[async_trait::async_trait]
impl DataBackend for MySQLBackend {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let mut conn = self.get_conn().await?;
        let tables: Vec<String> = conn
            .query("SHOW TABLES")
            .await
            .map_err(|e| AppError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(tables)
    }

    async fn describe_table(&self, table: &str) -> Result<Value, AppError> {
        let mut conn = self.get_conn().await?;
        let sql = format!("DESCRIBE {}", Self::quote_identifier(table));
        let rows: Vec<Row> = conn
            .query(sql)
            .await
            .map_err(|e| AppError::Database(format!("Failed to describe table {}: {}", table, e)))?;
        Ok(Value::Array(Self::rows_to_json(rows)))
    }

    async fn run_query(&self, sql: &str) -> Result<Value, AppError> {
        let mut conn = self.get_conn().await?;
        let start_time = Instant::now();

        let rows: Vec<Row> = conn
            .query(sql)
            .await
            .map_err(|e| AppError::Database(format!("{}", e)))?;

        let json_rows = Self::rows_to_json(rows);
        tracing::debug!(
            "MySQL query returned {} rows in {} ms",
            json_rows.len(),
            start_time.elapsed().as_millis()
        );
        Ok(Value::Array(json_rows))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }
}
