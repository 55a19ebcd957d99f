use serde::Deserialize;
use std::env;

/// Default pattern for recognising a verdict that blames a broken query
/// rather than a wrong answer.
pub const DEFAULT_SQL_ERROR_PATTERN: &str =
    r"(?i)SQL\s*(query|execution|statement)\b.*(error|fail)|SQL(查询|执行|语句).*错";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub history: HistoryConfig,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

/// Data source the generated queries run against.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub max_query_attempts: usize,
    pub max_validate_attempts: usize,
    pub sql_error_pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub truncate_columns: bool,
    pub truncate_cells: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file first so its values show up below
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("database.url", "mysql://root@localhost:3306/app")?
            .set_default("history.url", "./chat_history.db")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("llm.gateway_url", "https://api.deepseek.com/v1")?
            .set_default("llm.model", "deepseek-chat")?
            .set_default("llm.temperature", 0.7)?
            .set_default("llm.max_tokens", 2048)?
            .set_default("pipeline.max_query_attempts", 2)?
            .set_default("pipeline.max_validate_attempts", 3)?
            .set_default("pipeline.sql_error_pattern", DEFAULT_SQL_ERROR_PATTERN)?
            .set_default("render.truncate_columns", false)?
            .set_default("render.truncate_cells", false)?
            .set_default("logging.level", "info")?;

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        if let Ok(history_url) = env::var("HISTORY_DATABASE_URL") {
            builder = builder.set_override("history.url", history_url)?;
        }

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(gateway_url) = env::var("LLM_GATEWAY_URL") {
            builder = builder.set_override("llm.gateway_url", gateway_url)?;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            builder = builder.set_override("llm.api_key", Some(api_key))?;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            builder = builder.set_override("llm.model", model)?;
        }

        if let Ok(temperature) = env::var("LLM_TEMPERATURE") {
            builder = builder.set_override(
                "llm.temperature",
                temperature.parse::<f64>().unwrap_or(0.7),
            )?;
        }

        if let Ok(max_tokens) = env::var("LLM_MAX_TOKENS") {
            builder = builder.set_override("llm.max_tokens", max_tokens.parse::<u32>().unwrap_or(2048))?;
        }

        if let Ok(attempts) = env::var("MAX_QUERY_ATTEMPTS") {
            builder = builder.set_override(
                "pipeline.max_query_attempts",
                parse_attempts(&attempts, 2) as u64,
            )?;
        }

        if let Ok(attempts) = env::var("MAX_VALIDATE_ATTEMPTS") {
            builder = builder.set_override(
                "pipeline.max_validate_attempts",
                parse_attempts(&attempts, 3) as u64,
            )?;
        }

        if let Ok(pattern) = env::var("SQL_ERROR_PATTERN") {
            builder = builder.set_override("pipeline.sql_error_pattern", pattern)?;
        }

        if let Ok(flag) = env::var("RENDER_TRUNCATE_COLUMNS") {
            builder = builder.set_override("render.truncate_columns", flag == "true")?;
        }

        if let Ok(flag) = env::var("RENDER_TRUNCATE_CELLS") {
            builder = builder.set_override("render.truncate_cells", flag == "true")?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Positive attempt counts only; anything else falls back to `default`.
fn parse_attempts(raw: &str, default: usize) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => default,
    }
}
