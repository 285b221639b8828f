// Application state
// Configuration, the chat server and the optional rent lookup, shared by all handlers

use crate::chat::{AgentCatalog, AgentRuntime, ChatServer, MemoryStore, OpenAiRuntime, RequestContext};
use crate::config::Config;
use crate::workbook::RentLookup;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Shared state handed to every handler
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Chat proxy
    pub chat: ChatServer,
    /// Vector-store lookup; `None` without `OPENAI_VECTOR_STORE_ID`
    pub lookup: Option<Arc<RentLookup>>,
}

impl AppState {
    /// Build the state with the OpenAI runtime
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.openai.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let runtime = Arc::new(OpenAiRuntime::new(client, &config.openai));
        Ok(Self::with_runtime(config, runtime))
    }

    /// Build the state over any runtime
    pub fn with_runtime(config: Config, runtime: Arc<dyn AgentRuntime>) -> Self {
        let agents = AgentCatalog::new(
            &config.openai.model,
            config.workbook.year,
            config.openai.vector_store_id.as_deref(),
        );
        let lookup = config
            .openai
            .vector_store_id
            .as_ref()
            .map(|_| Arc::new(RentLookup::new(runtime.clone(), &agents)));
        let chat = ChatServer::new(Arc::new(MemoryStore::new()), runtime, agents);

        Self {
            config: Arc::new(config),
            chat,
            lookup,
        }
    }

    /// Workflow routing for chat requests
    pub fn request_context(&self) -> RequestContext {
        RequestContext {
            workflow_id: self.config.openai.workflow_id.clone(),
            workflow_version: Some(self.config.openai.workflow_version.clone()),
        }
    }
}
