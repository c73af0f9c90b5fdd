use async_trait::async_trait;
use thiserror::Error;

use concierge_core::domain::thread::{ConversationKey, ThreadId};
use concierge_core::domain::tool::ToolDispatchRecord;
use concierge_core::errors::StorageError;

pub mod dispatch;
pub mod memory;
pub mod thread;

pub use dispatch::SqlDispatchJournal;
pub use memory::{InMemoryDispatchJournal, InMemoryThreadRepository};
pub use thread::SqlThreadRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StorageError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => Self::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => Self::Corrupt(message),
        }
    }
}

/// Persistent conversation key → thread id table.
///
/// `put` is an upsert with last-write-wins semantics; there is no
/// compare-and-set, so two racing first contacts may each create a thread.
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    async fn get(&self, key: &ConversationKey) -> Result<Option<ThreadId>, RepositoryError>;
    async fn put(&self, key: &ConversationKey, thread_id: &ThreadId)
        -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait DispatchJournal: Send + Sync {
    async fn record(&self, record: ToolDispatchRecord) -> Result<(), RepositoryError>;
    async fn recent(&self, limit: u32) -> Result<Vec<ToolDispatchRecord>, RepositoryError>;
}
