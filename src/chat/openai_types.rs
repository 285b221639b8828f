//! OpenAI Responses API types
//!
//! Structs that mirror the subset of the Responses API JSON format used by
//! the agent runtime.

use crate::chat::agents::AgentTool;
use crate::chat::runtime::InputMessage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request body for `POST /responses`
#[derive(Serialize, Debug)]
pub struct ResponsesRequest<'a> {
    /// Model name
    pub model: &'a str,
    /// System instructions for the agent
    pub instructions: &'a str,
    /// Conversation so far, oldest first
    pub input: &'a [InputMessage],
    /// Hosted tools (file search)
    #[serde(skip_serializing_if = "no_tools")]
    pub tools: &'a [AgentTool],
    /// Trace metadata (workflow routing)
    #[serde(skip_serializing_if = "no_metadata")]
    pub metadata: &'a BTreeMap<String, String>,
    /// Whether to stream server-sent events
    pub stream: bool,
}

fn no_tools(tools: &&[AgentTool]) -> bool {
    tools.is_empty()
}

fn no_metadata(metadata: &&BTreeMap<String, String>) -> bool {
    metadata.is_empty()
}

/// A response object (non-streaming body, or embedded in stream events)
#[derive(Deserialize, Debug, Default)]
pub struct ResponseObject {
    /// Response id
    #[serde(default)]
    #[allow(dead_code)] // Part of API response format
    pub id: String,
    /// `completed`, `failed`, `incomplete`, ...
    #[serde(default)]
    pub status: Option<String>,
    /// Output items
    #[serde(default)]
    pub output: Vec<OutputItem>,
    /// Error details when the response failed
    #[serde(default)]
    pub error: Option<ApiError>,
}

impl ResponseObject {
    /// Concatenated `output_text` parts of all message items
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { content } => Some(content),
                OutputItem::Other => None,
            })
            .flatten()
            .filter_map(|part| match part {
                OutputContent::OutputText { text } => Some(text.as_str()),
                OutputContent::Other => None,
            })
            .collect()
    }

    /// Best available failure description
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| {
                format!(
                    "response ended with status {}",
                    self.status.as_deref().unwrap_or("unknown")
                )
            })
    }
}

/// One output item
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum OutputItem {
    /// Assistant message
    #[serde(rename = "message")]
    Message {
        /// Message parts
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    /// Tool calls and anything else
    #[serde(other)]
    Other,
}

/// One part of an output message
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum OutputContent {
    /// Generated text
    #[serde(rename = "output_text")]
    OutputText {
        /// The text
        text: String,
    },
    /// Refusals and anything else
    #[serde(other)]
    Other,
}

/// Error object
#[derive(Deserialize, Debug)]
pub struct ApiError {
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

/// Streamed event (the `data:` payload of one SSE event)
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Text appended to the output
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Appended text
        delta: String,
    },
    /// Response finished successfully
    #[serde(rename = "response.completed")]
    Completed {},
    /// Response failed
    #[serde(rename = "response.failed")]
    Failed {
        /// Final response object
        #[serde(default)]
        response: ResponseObject,
    },
    /// Stream-level error
    #[serde(rename = "error")]
    Error {
        /// Human-readable message
        #[serde(default)]
        message: String,
    },
    /// Lifecycle events we do not act on
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_text_skips_tool_calls() {
        let body = r#"{
            "id": "resp_1",
            "status": "completed",
            "output": [
                {"type": "file_search_call", "id": "fs_1", "queries": ["rent"]},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "{\"a\":", "annotations": []},
                    {"type": "output_text", "text": "1}", "annotations": []}
                ]}
            ]
        }"#;
        let parsed: ResponseObject = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.output_text(), "{\"a\":1}");
    }

    #[test]
    fn test_stream_event_variants() {
        let delta: StreamEvent =
            serde_json::from_str(r#"{"type":"response.output_text.delta","delta":"Hi","item_id":"x"}"#)
                .unwrap();
        assert!(matches!(delta, StreamEvent::OutputTextDelta { ref delta } if delta == "Hi"));

        let done: StreamEvent =
            serde_json::from_str(r#"{"type":"response.completed","response":{"id":"r"}}"#).unwrap();
        assert!(matches!(done, StreamEvent::Completed {}));

        let other: StreamEvent =
            serde_json::from_str(r#"{"type":"response.in_progress","sequence_number":1}"#).unwrap();
        assert!(matches!(other, StreamEvent::Other));

        let failed: StreamEvent = serde_json::from_str(
            r#"{"type":"response.failed","response":{"status":"failed","error":{"code":"server_error","message":"overloaded"}}}"#,
        )
        .unwrap();
        match failed {
            StreamEvent::Failed { response } => assert_eq!(response.error_message(), "overloaded"),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
