pub mod chat_service;
pub mod database; // MySQL and PostgreSQL data sources
pub mod llm_service;
pub mod probability;
pub mod query_executor;
pub mod query_generator;
pub mod response_parser;
pub mod result_renderer;
pub mod retry_controller;
pub mod schema_service;
pub mod stream_emitter;
pub mod summary_validator;
pub mod triage_service;

#[cfg(test)]
pub(crate) mod testing;

pub use chat_service::*;
pub use llm_service::*;
pub use query_executor::*;
pub use query_generator::*;
pub use result_renderer::*;
pub use retry_controller::*;
pub use stream_emitter::*;
pub use summary_validator::*;
pub use triage_service::*;
