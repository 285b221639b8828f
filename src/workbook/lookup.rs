//! Rent data lookup through the workbook agent
//!
//! Asks the workbook agent, armed with `file_search` over the configured
//! vector store, for the year's payload and pulls the JSON object out of
//! its reply. The result is untyped; callers validate it.

use crate::chat::agents::{AgentCatalog, AgentDefinition};
use crate::chat::runtime::{AgentRuntime, InputMessage, InputRole, RunRequest, RuntimeError};
use crate::workbook::payload::ValidationError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Lookup failures
#[derive(Error, Debug)]
pub enum LookupError {
    /// The agent run failed
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The reply held no JSON object
    #[error("agent reply did not contain a JSON object: {0}")]
    NoJson(String),

    /// The reply's payload failed validation
    #[error("agent payload is invalid: {0}")]
    Invalid(#[from] ValidationError),
}

/// Vector-store backed payload lookup
pub struct RentLookup {
    runtime: Arc<dyn AgentRuntime>,
    agent: AgentDefinition,
    prompt: String,
}

impl RentLookup {
    /// Build a lookup over the catalog's workbook agent
    pub fn new(runtime: Arc<dyn AgentRuntime>, agents: &AgentCatalog) -> Self {
        Self {
            runtime,
            agent: agents.rent_workbook().clone(),
            prompt: agents.rent_workbook_prompt(),
        }
    }

    /// Run the workbook agent and return the payload it produced
    pub async fn fetch_payload(&self) -> Result<Value, LookupError> {
        info!(agent = self.agent.name, prompt = %self.prompt, "Looking up rent data");
        let request = RunRequest {
            agent: self.agent.clone(),
            input: vec![InputMessage {
                role: InputRole::User,
                content: self.prompt.clone(),
            }],
            metadata: BTreeMap::new(),
        };

        let reply = self.runtime.complete(request).await?;
        extract_json_object(&reply).ok_or_else(|| {
            warn!(reply_len = reply.len(), "Lookup reply held no JSON object");
            LookupError::NoJson(preview(&reply))
        })
    }
}

/// Parse the JSON object in `text`
///
/// Accepts a bare object, one inside a markdown code fence, or one surrounded
/// by prose (first `{` to last `}`).
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = strip_code_fence(text.trim());
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") up to the first newline.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() > LIMIT {
        format!("{}...", text.chars().take(LIMIT).collect::<String>())
    } else {
        text.to_string()
    }
}
