//! Chat endpoint
//!
//! `POST /chatkit` forwards the raw body to the chat server and answers with
//! an event stream or a JSON document depending on the request type.

use crate::api::streaming::create_sse_response;
use crate::chat::ProcessResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// POST /chatkit
pub async fn chatkit(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    match state.chat.process(&body, state.request_context()).await? {
        ProcessResult::Streaming(events) => create_sse_response(events),
        ProcessResult::NonStreaming(value) => Ok(Json(value).into_response()),
    }
}
