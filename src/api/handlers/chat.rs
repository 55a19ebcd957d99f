use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};

use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::models::{ChatMessage, ChatStreamParams};
use crate::services::database::validate_table_name;
use crate::services::stream_emitter::{to_sse_event, ChannelSink};

/// GET /api/v1/chat/sse - answer one message as a server-sent event stream.
///
/// Request validation and recording the question happen before the stream
/// opens, so their failures are ordinary HTTP errors.
pub async fn chat_stream(
    State(state): State<AppState>,
    Query(params): Query<ChatStreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, AppError> {
    let chat = state.chat.accept(&params).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let service = state.chat.clone();
    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        service.respond(chat, &mut sink).await;
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| Ok(to_sse_event(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// GET /api/v1/chat/history/{user_id}
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let history = state.storage.list_messages(&user_id).await?;
    Ok(Json(history))
}

/// DELETE /api/v1/chat/history/{user_id}
pub async fn clear_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = state.storage.clear_messages(&user_id).await?;
    tracing::info!("Cleared {} history entries for {}", removed, user_id);

    Ok(Json(serde_json::json!({
        "message": "chat history cleared"
    })))
}

/// GET /api/v1/chat/tables
pub async fn list_tables(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tables = state.backend.list_tables().await?;

    Ok(Json(serde_json::json!({
        "tables": tables
    })))
}

/// GET /api/v1/chat/tables/{table_name}/schema
pub async fn table_schema(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    validate_table_name(&table_name)?;
    let schema = state.backend.describe_table(&table_name).await?;

    Ok(Json(serde_json::json!({
        "schema": schema
    })))
}
