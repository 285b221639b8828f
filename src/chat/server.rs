//! Chat server
//!
//! Parses widget requests, keeps threads in the [`MemoryStore`] and answers
//! user messages by running the routed agent. Agent runs execute in a
//! spawned task that feeds a channel, so a turn is persisted even when the
//! client disconnects mid-stream.

use crate::chat::agents::AgentCatalog;
use crate::chat::protocol::{
    AssistantContent, AssistantMessageItem, ChatRequest, ItemUpdate, Page, SortOrder, Thread,
    ThreadItem, ThreadMetadata, ThreadStreamEvent, UserMessageInput, UserMessageItem,
};
use crate::chat::runtime::{AgentRuntime, InputMessage, InputRole, RunRequest};
use crate::chat::store::MemoryStore;
use crate::config::DEFAULT_WORKFLOW_VERSION;
use crate::error::AppError;
use chrono::Utc;
use futures_util::{stream::Stream, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Items of history given to the agent
pub const MAX_RECENT_ITEMS: usize = 30;

/// Default page size for listings
pub const DEFAULT_PAGE_LIMIT: usize = 20;

const EVENT_BUFFER: usize = 64;

/// Stream of events for one turn
pub type EventStream = Pin<Box<dyn Stream<Item = ThreadStreamEvent> + Send>>;

/// Per-request routing details
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Hosted workflow id
    pub workflow_id: Option<String>,
    /// Hosted workflow version
    pub workflow_version: Option<String>,
}

impl RequestContext {
    /// Trace metadata; empty unless a workflow id is set
    pub fn trace_metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        if let Some(workflow_id) = &self.workflow_id {
            metadata.insert("workflow_id".to_string(), workflow_id.clone());
            metadata.insert("workflow_version".to_string(), self.version().to_string());
        }
        metadata
    }

    fn version(&self) -> &str {
        self.workflow_version
            .as_deref()
            .unwrap_or(DEFAULT_WORKFLOW_VERSION)
    }
}

/// Result of processing one request
pub enum ProcessResult {
    /// Serve as `text/event-stream`
    Streaming(EventStream),
    /// Serve as `application/json`
    NonStreaming(Value),
}

/// Chat server; cheap to clone
#[derive(Clone)]
pub struct ChatServer {
    store: Arc<MemoryStore>,
    runtime: Arc<dyn AgentRuntime>,
    agents: Arc<AgentCatalog>,
}

impl ChatServer {
    /// Create a server over a store, a runtime and the agent catalog
    pub fn new(store: Arc<MemoryStore>, runtime: Arc<dyn AgentRuntime>, agents: AgentCatalog) -> Self {
        Self {
            store,
            runtime,
            agents: Arc::new(agents),
        }
    }

    /// The conversation store
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Handle a raw request body
    pub async fn process(
        &self,
        body: &[u8],
        context: RequestContext,
    ) -> Result<ProcessResult, AppError> {
        let request: ChatRequest = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid chat request: {}", e)))?;
        debug!(streaming = request.is_streaming(), "Processing chat request");

        match request {
            ChatRequest::CreateThread(params) => {
                let thread = ThreadMetadata {
                    id: MemoryStore::generate_thread_id(),
                    title: Some(generate_title_from_message(&params.input.text())),
                    created_at: Utc::now(),
                };
                self.store.save_thread(thread.clone()).await;
                info!(thread_id = %thread.id, "Created thread");

                let user_item = self.add_user_message(&thread.id, &params.input).await?;
                let opening = vec![
                    ThreadStreamEvent::ThreadCreated {
                        thread: thread.clone(),
                    },
                    ThreadStreamEvent::ItemDone {
                        item: user_item.clone(),
                    },
                ];
                Ok(self.spawn_turn(thread, user_item.text(), opening, context))
            }
            ChatRequest::AddUserMessage(params) => {
                let mut thread = self.store.load_thread(&params.thread_id).await?;
                let user_item = self.add_user_message(&thread.id, &params.input).await?;

                let mut opening = Vec::new();
                if thread.title.is_none() {
                    thread.title = Some(generate_title_from_message(&params.input.text()));
                    self.store.save_thread(thread.clone()).await;
                    opening.push(ThreadStreamEvent::ThreadUpdated {
                        thread: thread.clone(),
                    });
                }
                opening.push(ThreadStreamEvent::ItemDone {
                    item: user_item.clone(),
                });
                Ok(self.spawn_turn(thread, user_item.text(), opening, context))
            }
            ChatRequest::RetryAfterItem(params) => {
                let thread = self.store.load_thread(&params.thread_id).await?;
                let item = self.store.load_item(&thread.id, &params.item_id).await?;
                if !matches!(item, ThreadItem::UserMessage(_)) {
                    return Err(AppError::BadRequest(format!(
                        "Item {} is not a user message",
                        params.item_id
                    )));
                }
                let removed = self
                    .store
                    .delete_items_after(&thread.id, &params.item_id)
                    .await?;
                info!(thread_id = %thread.id, item_id = %params.item_id, removed, "Retrying after item");
                Ok(self.spawn_turn(thread, item.text(), Vec::new(), context))
            }
            ChatRequest::GetThread(params) => {
                let metadata = self.store.load_thread(&params.thread_id).await?;
                let items = self
                    .store
                    .load_thread_items(&metadata.id, None, usize::MAX, SortOrder::Asc)
                    .await?;
                to_json(&Thread { metadata, items })
            }
            ChatRequest::ListThreads(params) => {
                let page: Page<ThreadMetadata> = self
                    .store
                    .load_threads(
                        params.after.as_deref(),
                        params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
                        params.order.unwrap_or(SortOrder::Desc),
                    )
                    .await;
                to_json(&page)
            }
            ChatRequest::ListItems(params) => {
                let page = self
                    .store
                    .load_thread_items(
                        &params.thread_id,
                        params.page.after.as_deref(),
                        params.page.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
                        params.page.order.unwrap_or(SortOrder::Asc),
                    )
                    .await?;
                to_json(&page)
            }
            ChatRequest::UpdateThread(params) => {
                let title = params.title.trim();
                if title.is_empty() {
                    return Err(AppError::BadRequest("Title cannot be empty".to_string()));
                }
                let mut thread = self.store.load_thread(&params.thread_id).await?;
                thread.title = Some(title.to_string());
                self.store.save_thread(thread.clone()).await;
                to_json(&thread)
            }
            ChatRequest::DeleteThread(params) => {
                self.store.delete_thread(&params.thread_id).await?;
                info!(thread_id = %params.thread_id, "Deleted thread");
                Ok(ProcessResult::NonStreaming(json!({})))
            }
        }
    }

    async fn add_user_message(
        &self,
        thread_id: &str,
        input: &UserMessageInput,
    ) -> Result<ThreadItem, AppError> {
        if input.text().trim().is_empty() {
            return Err(AppError::BadRequest("Message cannot be empty".to_string()));
        }
        let item = ThreadItem::UserMessage(UserMessageItem {
            id: MemoryStore::generate_item_id(),
            thread_id: thread_id.to_string(),
            created_at: Utc::now(),
            content: input.content.clone(),
        });
        self.store.save_item(thread_id, item.clone()).await?;
        Ok(item)
    }

    fn spawn_turn(
        &self,
        thread: ThreadMetadata,
        user_text: String,
        opening: Vec<ThreadStreamEvent>,
        context: RequestContext,
    ) -> ProcessResult {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let server = self.clone();

        tokio::spawn(async move {
            for event in opening {
                // Keep going even if the client is gone; the turn must be stored.
                let _ = tx.send(event).await;
            }
            server.respond(&thread, &user_text, &context, &tx).await;
        });

        ProcessResult::Streaming(Box::pin(ReceiverStream::new(rx)))
    }

    async fn respond(
        &self,
        thread: &ThreadMetadata,
        user_text: &str,
        context: &RequestContext,
        tx: &mpsc::Sender<ThreadStreamEvent>,
    ) {
        let input = match self.agent_input(&thread.id).await {
            Ok(input) => input,
            Err(e) => {
                let _ = tx.send(error_event(e.to_string(), false)).await;
                return;
            }
        };

        let agent = self.agents.route(user_text).clone();
        info!(
            thread_id = %thread.id,
            agent = agent.name,
            workflow_id = ?context.workflow_id,
            workflow_version = %context.version(),
            "Routing chat turn"
        );

        let request = RunRequest {
            agent,
            input,
            metadata: context.trace_metadata(),
        };

        let mut deltas = match self.runtime.stream(request).await {
            Ok(deltas) => deltas,
            Err(e) => {
                warn!(thread_id = %thread.id, error = %e, "Agent run could not start");
                let _ = tx.send(error_event(e.to_string(), true)).await;
                return;
            }
        };

        let mut message = AssistantMessageItem {
            id: MemoryStore::generate_item_id(),
            thread_id: thread.id.clone(),
            created_at: Utc::now(),
            content: Vec::new(),
        };

        let mut added = false;
        let mut text = String::new();
        let mut failure = None;
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(delta) => {
                    if !added {
                        send_item_added(tx, &message).await;
                        added = true;
                    }
                    text.push_str(&delta);
                    let _ = tx
                        .send(ThreadStreamEvent::ItemUpdated {
                            item_id: message.id.clone(),
                            update: ItemUpdate::TextDelta {
                                content_index: 0,
                                delta,
                            },
                        })
                        .await;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // A failed run with no text leaves no assistant item.
        if failure.is_none() || added {
            if !added {
                send_item_added(tx, &message).await;
            }
            message.content.push(AssistantContent::OutputText {
                text,
                annotations: Vec::new(),
            });
            let item = ThreadItem::AssistantMessage(message);
            if let Err(e) = self.store.save_item(&thread.id, item.clone()).await {
                warn!(thread_id = %thread.id, error = %e, "Failed to store assistant message");
            }
            let _ = tx.send(ThreadStreamEvent::ItemDone { item }).await;
        }

        if let Some(e) = failure {
            warn!(thread_id = %thread.id, error = %e, "Agent run failed");
            let _ = tx.send(error_event(e.to_string(), true)).await;
        }
    }

    /// Last [`MAX_RECENT_ITEMS`] items as agent input, oldest first
    async fn agent_input(&self, thread_id: &str) -> Result<Vec<InputMessage>, AppError> {
        let page = self
            .store
            .load_thread_items(thread_id, None, MAX_RECENT_ITEMS, SortOrder::Desc)
            .await?;
        Ok(page
            .data
            .iter()
            .rev()
            .filter_map(|item| {
                let role = match item {
                    ThreadItem::UserMessage(_) => InputRole::User,
                    ThreadItem::AssistantMessage(_) => InputRole::Assistant,
                };
                let content = item.text();
                (!content.trim().is_empty()).then_some(InputMessage { role, content })
            })
            .collect())
    }
}

fn error_event(message: String, allow_retry: bool) -> ThreadStreamEvent {
    ThreadStreamEvent::Error {
        code: "stream.error".to_string(),
        message,
        allow_retry,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<ProcessResult, AppError> {
    serde_json::to_value(value)
        .map(ProcessResult::NonStreaming)
        .map_err(|e| AppError::Internal(e.into()))
}

async fn send_item_added(tx: &mpsc::Sender<ThreadStreamEvent>, message: &AssistantMessageItem) {
    let _ = tx
        .send(ThreadStreamEvent::ItemAdded {
            item: ThreadItem::AssistantMessage(message.clone()),
        })
        .await;
}

/// Generate a title from message content
///
/// The first sentence when it is at most 60 characters. Otherwise the whole
/// text, cut to 47 characters plus `...` when longer than 50.
pub fn generate_title_from_message(content: &str) -> String {
    let trimmed = content.trim();

    if let Some(sentence_end) = trimmed.find(['.', '!', '?']) {
        let sentence = &trimmed[..=sentence_end];
        if sentence.chars().count() <= 60 {
            return sentence.trim().to_string();
        }
    }

    if trimmed.chars().count() > 50 {
        format!("{}...", trimmed.chars().take(47).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
