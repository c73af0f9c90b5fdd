use std::collections::HashMap;

use tokio::sync::RwLock;

use concierge_core::domain::thread::{ConversationKey, ThreadId};
use concierge_core::domain::tool::ToolDispatchRecord;

use super::{DispatchJournal, RepositoryError, ThreadRepository};

#[derive(Default)]
pub struct InMemoryThreadRepository {
    threads: RwLock<HashMap<String, ThreadId>>,
}

#[async_trait::async_trait]
impl ThreadRepository for InMemoryThreadRepository {
    async fn get(&self, key: &ConversationKey) -> Result<Option<ThreadId>, RepositoryError> {
        let threads = self.threads.read().await;
        Ok(threads.get(&key.0).cloned())
    }

    async fn put(
        &self,
        key: &ConversationKey,
        thread_id: &ThreadId,
    ) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().await;
        threads.insert(key.0.clone(), thread_id.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDispatchJournal {
    records: RwLock<Vec<ToolDispatchRecord>>,
}

impl InMemoryDispatchJournal {
    pub async fn all(&self) -> Vec<ToolDispatchRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait::async_trait]
impl DispatchJournal for InMemoryDispatchJournal {
    async fn record(&self, record: ToolDispatchRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ToolDispatchRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit as usize).cloned().collect())
    }
}
