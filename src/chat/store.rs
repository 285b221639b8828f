//! In-memory conversation store
//!
//! Threads and their items live for the lifetime of the process.

use crate::chat::protocol::{Page, SortOrder, ThreadItem, ThreadMetadata};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store lookup failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No thread with this id
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    /// No item with this id in the thread
    #[error("Item not found: {0}")]
    ItemNotFound(String),
}

#[derive(Debug)]
struct StoredThread {
    metadata: ThreadMetadata,
    items: Vec<ThreadItem>,
}

/// Process-local thread and item storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    // Creation order
    threads: RwLock<Vec<StoredThread>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh thread id
    pub fn generate_thread_id() -> String {
        format!("thr_{}", Uuid::new_v4().simple())
    }

    /// Fresh item id
    pub fn generate_item_id() -> String {
        format!("msg_{}", Uuid::new_v4().simple())
    }

    /// Insert or replace a thread header
    pub async fn save_thread(&self, thread: ThreadMetadata) {
        let mut threads = self.threads.write().await;
        match threads.iter_mut().find(|t| t.metadata.id == thread.id) {
            Some(existing) => existing.metadata = thread,
            None => threads.push(StoredThread {
                metadata: thread,
                items: Vec::new(),
            }),
        }
    }

    /// Load a thread header
    pub async fn load_thread(&self, thread_id: &str) -> Result<ThreadMetadata, StoreError> {
        let threads = self.threads.read().await;
        threads
            .iter()
            .find(|t| t.metadata.id == thread_id)
            .map(|t| t.metadata.clone())
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))
    }

    /// Page through thread headers
    pub async fn load_threads(
        &self,
        after: Option<&str>,
        limit: usize,
        order: SortOrder,
    ) -> Page<ThreadMetadata> {
        let threads = self.threads.read().await;
        let all = threads.iter().map(|t| t.metadata.clone()).collect();
        paginate(all, after, limit, order, |t| &t.id)
    }

    /// Delete a thread and its items
    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), StoreError> {
        let mut threads = self.threads.write().await;
        let before = threads.len();
        threads.retain(|t| t.metadata.id != thread_id);
        if threads.len() == before {
            return Err(StoreError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }

    /// Append an item, or replace the item with the same id
    pub async fn save_item(&self, thread_id: &str, item: ThreadItem) -> Result<(), StoreError> {
        let mut threads = self.threads.write().await;
        let thread = find_mut(&mut threads, thread_id)?;
        match thread.items.iter_mut().find(|i| i.id() == item.id()) {
            Some(existing) => *existing = item,
            None => thread.items.push(item),
        }
        Ok(())
    }

    /// Load one item
    pub async fn load_item(&self, thread_id: &str, item_id: &str) -> Result<ThreadItem, StoreError> {
        let threads = self.threads.read().await;
        let thread = threads
            .iter()
            .find(|t| t.metadata.id == thread_id)
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))?;
        thread
            .items
            .iter()
            .find(|i| i.id() == item_id)
            .cloned()
            .ok_or_else(|| StoreError::ItemNotFound(item_id.to_string()))
    }

    /// Remove every item that follows `item_id`
    pub async fn delete_items_after(&self, thread_id: &str, item_id: &str) -> Result<usize, StoreError> {
        let mut threads = self.threads.write().await;
        let thread = find_mut(&mut threads, thread_id)?;
        let position = thread
            .items
            .iter()
            .position(|i| i.id() == item_id)
            .ok_or_else(|| StoreError::ItemNotFound(item_id.to_string()))?;
        let removed = thread.items.len() - position - 1;
        thread.items.truncate(position + 1);
        Ok(removed)
    }

    /// Page through a thread's items
    pub async fn load_thread_items(
        &self,
        thread_id: &str,
        after: Option<&str>,
        limit: usize,
        order: SortOrder,
    ) -> Result<Page<ThreadItem>, StoreError> {
        let threads = self.threads.read().await;
        let thread = threads
            .iter()
            .find(|t| t.metadata.id == thread_id)
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))?;
        Ok(paginate(thread.items.clone(), after, limit, order, |i| i.id()))
    }
}

fn find_mut<'a>(
    threads: &'a mut [StoredThread],
    thread_id: &str,
) -> Result<&'a mut StoredThread, StoreError> {
    threads
        .iter_mut()
        .find(|t| t.metadata.id == thread_id)
        .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))
}

/// Slice `entries` (oldest first) into a page
///
/// An `after` cursor that matches nothing starts from the beginning.
fn paginate<T, F>(
    mut entries: Vec<T>,
    after: Option<&str>,
    limit: usize,
    order: SortOrder,
    id_of: F,
) -> Page<T>
where
    F: Fn(&T) -> &str,
{
    if order == SortOrder::Desc {
        entries.reverse();
    }
    let start = after
        .and_then(|cursor| entries.iter().position(|e| id_of(e) == cursor))
        .map(|pos| pos + 1)
        .unwrap_or(0);

    let remaining = entries.len().saturating_sub(start);
    let data: Vec<T> = entries.into_iter().skip(start).take(limit).collect();
    let has_more = remaining > data.len();
    let after = data.last().map(|e| id_of(e).to_string());

    Page {
        data,
        has_more,
        after,
    }
}
