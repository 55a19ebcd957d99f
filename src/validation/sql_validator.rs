use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use crate::api::middleware::AppError;
use crate::services::database::DatabaseType;

/// Guards the data source against anything but read-only queries
pub struct SqlValidator;

impl SqlValidator {
    fn dialect_for(db_type: DatabaseType) -> Box<dyn Dialect> {
        match db_type {
            DatabaseType::MySQL => Box::new(MySqlDialect {}),
            DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        }
    }

    /// Validate a single statement and ensure it's a query
    pub fn validate_select_only(sql: &str, db_type: DatabaseType) -> Result<(), AppError> {
        let dialect = Self::dialect_for(db_type);
        let ast = Parser::parse_sql(dialect.as_ref(), sql)
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        if ast.is_empty() {
            return Err(AppError::InvalidSql("Empty SQL query".to_string()));
        }

        for stmt in &ast {
            Self::check_statement(stmt)?;
        }

        Ok(())
    }

    fn check_statement(stmt: &Statement) -> Result<(), AppError> {
        let rejected = match stmt {
            Statement::Query(_) => return Ok(()),
            Statement::Insert { .. } => "INSERT",
            Statement::Update { .. } => "UPDATE",
            Statement::Delete { .. } => "DELETE",
            Statement::Drop { .. } => "DROP",
            Statement::CreateTable { .. } => "CREATE TABLE",
            Statement::AlterTable { .. } => "ALTER TABLE",
            Statement::Truncate { .. } => "TRUNCATE",
            _ => {
                return Err(AppError::InvalidSql(
                    "Only SELECT queries are permitted.".to_string(),
                ))
            }
        };
        Err(AppError::InvalidSql(format!(
            "{} statements are not allowed. Only SELECT queries are permitted.",
            rejected
        )))
    }
}
