//! Agent runtime
//!
//! The chat server and the rent lookup talk to the model through the
//! [`AgentRuntime`] trait. [`OpenAiRuntime`] is the production implementation
//! over the OpenAI Responses API; tests substitute scripted runtimes.

use crate::chat::agents::AgentDefinition;
use crate::chat::openai_types::{ResponseObject, ResponsesRequest, StreamEvent};
use crate::config::OpenAiConfig;
use async_stream::stream;
use async_trait::async_trait;
use futures_util::{stream::Stream, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::pin::Pin;
use thiserror::Error;
use tracing::{debug, error};

/// Errors returned by an agent runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No API key configured
    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,

    /// Request could not be sent or the body could not be read
    #[error("Failed to reach agent runtime: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream rate limit
    #[error("Agent runtime rate limit exceeded (HTTP 429): {0}")]
    RateLimited(String),

    /// Upstream returned a non-success status
    #[error("Agent runtime returned error status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Upstream body did not match the expected format
    #[error("Failed to parse agent runtime response: {0}")]
    Decode(String),

    /// The run itself failed
    #[error("Agent run failed: {0}")]
    Failed(String),
}

/// Message author in agent input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    /// The user
    User,
    /// An agent
    Assistant,
}

/// One prior message given to the agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputMessage {
    /// Author
    pub role: InputRole,
    /// Plain text
    pub content: String,
}

/// Everything needed for one agent run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Agent to run
    pub agent: AgentDefinition,
    /// Conversation, oldest first
    pub input: Vec<InputMessage>,
    /// Trace metadata
    pub metadata: BTreeMap<String, String>,
}

/// Stream of text deltas
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, RuntimeError>> + Send>>;

/// Something that can run an agent
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Start a run and stream its text as it is generated
    async fn stream(&self, request: RunRequest) -> Result<DeltaStream, RuntimeError>;

    /// Run to completion and return the full text
    async fn complete(&self, request: RunRequest) -> Result<String, RuntimeError>;
}

/// Responses API runtime
pub struct OpenAiRuntime {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiRuntime {
    /// Create a runtime sharing `client` (connection pooling)
    pub fn new(client: reqwest::Client, config: &OpenAiConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn send(&self, request: &RunRequest, stream: bool) -> Result<reqwest::Response, RuntimeError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(RuntimeError::MissingApiKey)?;
        let url = format!("{}/responses", self.base_url);

        let body = ResponsesRequest {
            model: &request.agent.model,
            instructions: &request.agent.instructions,
            input: &request.input,
            tools: &request.agent.tools,
            metadata: &request.metadata,
            stream,
        };

        debug!(
            url = %url,
            agent = request.agent.name,
            model = %request.agent.model,
            input_messages = request.input.len(),
            stream,
            "Calling agent runtime"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            error!(
                status_code = status_code,
                error_body = %error_body,
                "Agent runtime returned error status"
            );

            if status_code == 429 {
                return Err(RuntimeError::RateLimited(error_body));
            }
            return Err(RuntimeError::Status {
                status: status_code,
                body: error_body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AgentRuntime for OpenAiRuntime {
    async fn stream(&self, request: RunRequest) -> Result<DeltaStream, RuntimeError> {
        let response = self.send(&request, true).await?;
        let mut chunks = Box::pin(response.bytes_stream());

        let deltas = stream! {
            let mut decoder = SseDecoder::default();
            'read: while let Some(chunk) = chunks.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(RuntimeError::Http(e));
                        break 'read;
                    }
                };
                for data in decoder.push(&chunk) {
                    if data == "[DONE]" {
                        break 'read;
                    }
                    match serde_json::from_str::<StreamEvent>(&data) {
                        Ok(StreamEvent::OutputTextDelta { delta }) => {
                            yield Ok(delta);
                        }
                        Ok(StreamEvent::Completed {}) => break 'read,
                        Ok(StreamEvent::Failed { response }) => {
                            yield Err(RuntimeError::Failed(response.error_message()));
                            break 'read;
                        }
                        Ok(StreamEvent::Error { message }) => {
                            yield Err(RuntimeError::Failed(message));
                            break 'read;
                        }
                        Ok(StreamEvent::Other) => {}
                        Err(e) => {
                            yield Err(RuntimeError::Decode(format!("{} - event: {}", e, data)));
                            break 'read;
                        }
                    }
                }
            }
        };
        Ok(Box::pin(deltas))
    }

    async fn complete(&self, request: RunRequest) -> Result<String, RuntimeError> {
        let response = self.send(&request, false).await?;
        let body = response.text().await?;

        let parsed: ResponseObject = serde_json::from_str(&body)
            .map_err(|e| RuntimeError::Decode(format!("{} - Response body: {}", e, body)))?;

        if parsed.error.is_some() || parsed.status.as_deref() == Some("failed") {
            return Err(RuntimeError::Failed(parsed.error_message()));
        }

        let text = parsed.output_text();
        if text.trim().is_empty() {
            return Err(RuntimeError::Decode("response contains no output text".to_string()));
        }
        debug!(response_len = text.len(), "Agent run completed");
        Ok(text)
    }
}

/// Incremental server-sent-events splitter
///
/// Buffers raw bytes so events and UTF-8 sequences may straddle chunks, and
/// yields the joined `data:` lines of each complete event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk and return the data of every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let block = String::from_utf8_lossy(&block);
            let data: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
                .collect();
            if !data.is_empty() {
                events.push(data.join("\n"));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::agents::{AgentCatalog, AgentTool};
    use crate::config::Config;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn runtime(base_url: &str, api_key: Option<&str>) -> OpenAiRuntime {
        let mut config = Config::default().openai;
        config.base_url = base_url.to_string();
        config.api_key = api_key.map(str::to_string);
        OpenAiRuntime::new(reqwest::Client::new(), &config)
    }

    fn request(vector_store: Option<&str>) -> RunRequest {
        let catalog = AgentCatalog::new("gpt-4.1-mini", 2025, vector_store);
        RunRequest {
            agent: catalog.rent_workbook().clone(),
            input: vec![InputMessage {
                role: InputRole::User,
                content: "generate 2025 rent workbook".to_string(),
            }],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_sse_decoder_handles_split_events() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: response.output_text.delta\r\nda").is_empty());
        let events = decoder.push(b"ta: {\"a\":1}\r\n\r\ndata: [DONE]\n\n: comment\n\n");
        assert_eq!(events, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn test_sse_decoder_keeps_split_utf8() {
        let mut decoder = SseDecoder::default();
        let bytes = "data: café\n\n".as_bytes();
        let (head, tail) = bytes.split_at(9);
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["café".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let result = runtime("http://127.0.0.1:9", None).complete(request(None)).await;
        assert!(matches!(result, Err(RuntimeError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_complete_sends_tools_and_reads_output() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/responses")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4.1-mini",
                "stream": false,
                "tools": [{"type": "file_search", "vector_store_ids": ["vs_1"]}],
                "input": [{"role": "user", "content": "generate 2025 rent workbook"}]
            })))
            .with_status(200)
            .with_body(
                r#"{"id":"resp_1","status":"completed","output":[
                    {"type":"message","role":"assistant","content":[{"type":"output_text","text":"{\"ok\":true}","annotations":[]}]}
                ]}"#,
            )
            .create_async()
            .await;

        let result = runtime(&server.url(), Some("test-key"))
            .complete(request(Some("vs_1")))
            .await;

        mock.assert_async().await;
        assert_eq!(result.unwrap(), "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_request_omits_empty_tools_and_metadata() {
        let req = request(None);
        let body = ResponsesRequest {
            model: &req.agent.model,
            instructions: &req.agent.instructions,
            input: &req.input,
            tools: &req.agent.tools,
            metadata: &req.metadata,
            stream: true,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("metadata").is_none());

        let tools = vec![AgentTool::FileSearch {
            vector_store_ids: vec!["vs".to_string()],
        }];
        let metadata = BTreeMap::from([("workflow_id".to_string(), "wf".to_string())]);
        let body = ResponsesRequest {
            tools: &tools,
            metadata: &metadata,
            ..body
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["metadata"]["workflow_id"], "wf");
        assert_eq!(value["tools"][0]["type"], "file_search");
    }

    #[tokio::test]
    async fn test_complete_rate_limit() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/responses")
            .with_status(429)
            .with_body(r#"{"error": "Rate limit exceeded"}"#)
            .create_async()
            .await;

        let result = runtime(&server.url(), Some("test-key"))
            .complete(request(None))
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RuntimeError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_complete_invalid_json() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/responses")
            .with_status(200)
            .with_body("This is not JSON")
            .create_async()
            .await;

        let err = runtime(&server.url(), Some("test-key"))
            .complete(request(None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_stream_relays_deltas() {
        let mut server = Server::new_async().await;
        let body = concat!(
            "event: response.created\n",
            "data: {\"type\":\"response.created\",\"response\":{\"id\":\"r\"}}\n\n",
            "event: response.output_text.delta\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hel\"}\n\n",
            "event: response.output_text.delta\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"lo\"}\n\n",
            "event: response.completed\n",
            "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"r\"}}\n\n",
        );
        let _mock = server
            .mock("POST", "/responses")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let stream = runtime(&server.url(), Some("test-key"))
            .stream(request(None))
            .await
            .unwrap();
        let deltas: Vec<String> = stream.map(|d| d.unwrap()).collect().await;
        assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_surfaces_failure() {
        let mut server = Server::new_async().await;
        let body = concat!(
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"partial\"}\n\n",
            "data: {\"type\":\"response.failed\",\"response\":{\"status\":\"failed\",\"error\":{\"message\":\"overloaded\"}}}\n\n",
        );
        let _mock = server
            .mock("POST", "/responses")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let stream = runtime(&server.url(), Some("test-key"))
            .stream(request(None))
            .await
            .unwrap();
        let results: Vec<Result<String, RuntimeError>> = stream.collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "partial");
        assert!(results[1]
            .as_ref()
            .unwrap_err()
            .to_string()
            .contains("overloaded"));
    }
}
