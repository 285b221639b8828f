//! Chat widget wire protocol
//!
//! Requests are `{"type": ..., "params": {...}}` objects. Streaming requests
//! answer with a sequence of [`ThreadStreamEvent`]s; the rest answer with a
//! single JSON document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Incoming chat request
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum ChatRequest {
    /// Start a thread with a first user message (streaming)
    #[serde(rename = "threads.create")]
    CreateThread(CreateThreadParams),
    /// Append a user message to a thread (streaming)
    #[serde(rename = "threads.add_user_message")]
    AddUserMessage(AddUserMessageParams),
    /// Drop everything after a user message and answer it again (streaming)
    #[serde(rename = "threads.retry_after_item")]
    RetryAfterItem(RetryAfterItemParams),
    /// Fetch a thread with its items
    #[serde(rename = "threads.get_by_id")]
    GetThread(ThreadIdParams),
    /// Page through threads
    #[serde(rename = "threads.list")]
    ListThreads(ListParams),
    /// Page through a thread's items
    #[serde(rename = "items.list")]
    ListItems(ListItemsParams),
    /// Rename a thread
    #[serde(rename = "threads.update")]
    UpdateThread(UpdateThreadParams),
    /// Delete a thread and its items
    #[serde(rename = "threads.delete")]
    DeleteThread(ThreadIdParams),
}

impl ChatRequest {
    /// Whether the response is an event stream
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            ChatRequest::CreateThread(_)
                | ChatRequest::AddUserMessage(_)
                | ChatRequest::RetryAfterItem(_)
        )
    }
}

#[allow(missing_docs)]
#[derive(Debug, Deserialize)]
pub struct CreateThreadParams {
    pub input: UserMessageInput,
}

#[allow(missing_docs)]
#[derive(Debug, Deserialize)]
pub struct AddUserMessageParams {
    pub thread_id: String,
    pub input: UserMessageInput,
}

#[allow(missing_docs)]
#[derive(Debug, Deserialize)]
pub struct RetryAfterItemParams {
    pub thread_id: String,
    pub item_id: String,
}

#[allow(missing_docs)]
#[derive(Debug, Deserialize)]
pub struct ThreadIdParams {
    pub thread_id: String,
}

#[allow(missing_docs)]
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub order: Option<SortOrder>,
    #[serde(default)]
    pub after: Option<String>,
}

#[allow(missing_docs)]
#[derive(Debug, Deserialize)]
pub struct ListItemsParams {
    pub thread_id: String,
    #[serde(flatten)]
    pub page: ListParams,
}

#[allow(missing_docs)]
#[derive(Debug, Deserialize)]
pub struct UpdateThreadParams {
    pub thread_id: String,
    pub title: String,
}

/// Sort order for paged listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    Desc,
}

/// User message as typed into the widget
#[derive(Debug, Clone, Deserialize)]
pub struct UserMessageInput {
    /// Message parts
    pub content: Vec<UserContent>,
}

impl UserMessageInput {
    /// Plain text of the message
    pub fn text(&self) -> String {
        content_text(&self.content)
    }
}

/// One part of a user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserContent {
    /// Typed text
    #[serde(rename = "input_text")]
    InputText {
        /// The text
        text: String,
    },
}

/// One part of an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContent {
    /// Generated text
    #[serde(rename = "output_text")]
    OutputText {
        /// The text
        text: String,
        /// Citations; always empty here
        #[serde(default)]
        annotations: Vec<serde_json::Value>,
    },
}

/// Thread header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    /// Thread id (`thr_...`)
    pub id: String,
    /// Title, set from the first user message
    pub title: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Thread header plus its items
#[derive(Debug, Clone, Serialize)]
pub struct Thread {
    /// Header fields
    #[serde(flatten)]
    pub metadata: ThreadMetadata,
    /// Items, oldest first
    pub items: Page<ThreadItem>,
}

/// A message in a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ThreadItem {
    /// Sent by the user
    #[serde(rename = "user_message")]
    UserMessage(UserMessageItem),
    /// Produced by an agent
    #[serde(rename = "assistant_message")]
    AssistantMessage(AssistantMessageItem),
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessageItem {
    pub id: String,
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub content: Vec<UserContent>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessageItem {
    pub id: String,
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub content: Vec<AssistantContent>,
}

impl ThreadItem {
    /// Item id
    pub fn id(&self) -> &str {
        match self {
            ThreadItem::UserMessage(item) => &item.id,
            ThreadItem::AssistantMessage(item) => &item.id,
        }
    }

    /// Plain text of the item
    pub fn text(&self) -> String {
        match self {
            ThreadItem::UserMessage(item) => content_text(&item.content),
            ThreadItem::AssistantMessage(item) => item
                .content
                .iter()
                .map(|part| match part {
                    AssistantContent::OutputText { text, .. } => text.as_str(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn content_text(content: &[UserContent]) -> String {
    content
        .iter()
        .map(|part| match part {
            UserContent::InputText { text } => text.as_str(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Entries in the requested order
    pub data: Vec<T>,
    /// Whether more entries follow
    pub has_more: bool,
    /// Cursor for the next page
    pub after: Option<String>,
}

/// Event streamed back while a thread is being answered
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ThreadStreamEvent {
    /// A new thread was created
    #[serde(rename = "thread.created")]
    ThreadCreated {
        /// The new thread
        thread: ThreadMetadata,
    },
    /// Thread header changed
    #[serde(rename = "thread.updated")]
    ThreadUpdated {
        /// The updated thread
        thread: ThreadMetadata,
    },
    /// An item started
    #[serde(rename = "thread.item.added")]
    ItemAdded {
        /// The item as it stands
        item: ThreadItem,
    },
    /// Incremental change to an in-progress item
    #[serde(rename = "thread.item.updated")]
    ItemUpdated {
        /// Item being updated
        item_id: String,
        /// The change
        update: ItemUpdate,
    },
    /// An item is complete
    #[serde(rename = "thread.item.done")]
    ItemDone {
        /// The final item
        item: ThreadItem,
    },
    /// The turn failed
    #[serde(rename = "error")]
    Error {
        /// Machine-readable code
        code: String,
        /// Human-readable message
        message: String,
        /// Whether the client may offer a retry
        allow_retry: bool,
    },
}

/// Incremental item change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ItemUpdate {
    /// Text appended to an assistant message part
    #[serde(rename = "assistant_message.content_part.text_delta")]
    TextDelta {
        /// Content part index
        content_index: usize,
        /// Appended text
        delta: String,
    },
}
