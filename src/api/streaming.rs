//! Streaming utilities for Server-Sent Events (SSE)
//!
//! Turns chat event streams into `text/event-stream` responses.

use crate::chat::server::EventStream;
use crate::error::AppError;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use futures_util::StreamExt;
use tracing::warn;

/// Create an SSE response from chat events
///
/// Each event is sent as `data: <json>\n\n`.
pub fn create_sse_response(events: EventStream) -> Result<Response, AppError> {
    let sse_stream = events.map(|event| {
        let sse_text = match serde_json::to_string(&event) {
            Ok(data) => format!("data: {}\n\n", data),
            Err(e) => {
                warn!(error = %e, "Failed to encode chat event");
                String::new()
            }
        };
        Ok::<_, std::io::Error>(sse_text)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(sse_stream))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build SSE response: {}", e)))
}
