// Data source abstraction: MySQL and PostgreSQL backends
pub mod adapter;
pub mod mysql;
pub mod postgresql;

pub use adapter::DataBackend;
pub use mysql::MySQLBackend;
pub use postgresql::PostgreSQLBackend;

use crate::api::middleware::AppError;
use std::sync::Arc;

/// Database type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    PostgreSQL,
    MySQL,
}

impl DatabaseType {
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseType::PostgreSQL),
            "mysql" | "mariadb" => Ok(DatabaseType::MySQL),
            _ => Err(AppError::Validation(format!("Unsupported database type: {}", s))),
        }
    }

    /// Pick the backend from the URL scheme
    pub fn from_url(connection_url: &str) -> Result<Self, AppError> {
        let url = url::Url::parse(connection_url)
            .map_err(|e| AppError::Validation(format!("Invalid database URL: {}", e)))?;
        Self::from_str(url.scheme())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::PostgreSQL => "postgresql",
            DatabaseType::MySQL => "mysql",
        }
    }
}

/// Factory function to create the backend for the configured data source
pub fn create_backend(connection_url: &str) -> Result<Arc<dyn DataBackend>, AppError> {
    tracing::info!("Creating data backend for: {}", mask_credentials(connection_url));
    match DatabaseType::from_url(connection_url)? {
        DatabaseType::PostgreSQL => Ok(Arc::new(PostgreSQLBackend::new(connection_url)?)),
        DatabaseType::MySQL => Ok(Arc::new(MySQLBackend::new(connection_url)?)),
    }
}

/// Mask credentials in connection URL for safe logging
pub fn mask_credentials(url: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url) {
        let mut masked = parsed_url.clone();
        if parsed_url.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    } else {
        "[invalid-url]".to_string()
    }
}

/// Screens table names arriving in request paths. Backends quote or bind
/// whatever they are given, so this only keeps obvious junk out.
pub fn validate_table_name(table: &str) -> Result<(), AppError> {
    let valid = !table.is_empty()
        && table.len() <= 128
        && table
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid table name: {}", table)))
    }
}
