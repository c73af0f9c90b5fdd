use chrono::Utc;
use sqlx::Row;

use concierge_core::domain::thread::{ConversationKey, ThreadId};

use super::{RepositoryError, ThreadRepository};
use crate::DbPool;

pub struct SqlThreadRepository {
    pool: DbPool,
}

impl SqlThreadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ThreadRepository for SqlThreadRepository {
    async fn get(&self, key: &ConversationKey) -> Result<Option<ThreadId>, RepositoryError> {
        let row = sqlx::query("SELECT thread_id FROM conversation_thread WHERE conversation_key = ?")
            .bind(&key.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let thread_id: String =
            row.try_get("thread_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        if thread_id.trim().is_empty() {
            return Err(RepositoryError::Decode(format!(
                "empty thread id stored for conversation key `{}`",
                key.0
            )));
        }

        Ok(Some(ThreadId(thread_id)))
    }

    async fn put(
        &self,
        key: &ConversationKey,
        thread_id: &ThreadId,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO conversation_thread (conversation_key, thread_id, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(conversation_key) DO UPDATE SET
                 thread_id = excluded.thread_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&key.0)
        .bind(&thread_id.0)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::domain::thread::{ConversationKey, ThreadId};

    use super::SqlThreadRepository;
    use crate::repositories::{RepositoryError, ThreadRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn missing_key_reads_as_absent() {
        let pool = setup_pool().await;
        let repo = SqlThreadRepository::new(pool.clone());

        let found = repo.get(&ConversationKey::from("U-unknown")).await.expect("get");
        assert_eq!(found, None);

        pool.close().await;
    }

    #[tokio::test]
    async fn put_then_get_returns_stored_thread() {
        let pool = setup_pool().await;
        let repo = SqlThreadRepository::new(pool.clone());
        let key = ConversationKey::from("U-100");

        repo.put(&key, &ThreadId::from("thread_abc")).await.expect("put");

        assert_eq!(repo.get(&key).await.expect("get"), Some(ThreadId::from("thread_abc")));

        pool.close().await;
    }

    #[tokio::test]
    async fn second_put_for_same_key_wins() {
        let pool = setup_pool().await;
        let repo = SqlThreadRepository::new(pool.clone());
        let key = ConversationKey::from("U-200");

        repo.put(&key, &ThreadId::from("thread_first")).await.expect("first put");
        repo.put(&key, &ThreadId::from("thread_second")).await.expect("second put");

        assert_eq!(repo.get(&key).await.expect("get"), Some(ThreadId::from("thread_second")));

        let (rows,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM conversation_thread WHERE conversation_key = ?")
                .bind("U-200")
                .fetch_one(&pool)
                .await
                .expect("count rows");
        assert_eq!(rows, 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn closed_pool_surfaces_database_error() {
        let pool = setup_pool().await;
        let repo = SqlThreadRepository::new(pool.clone());
        pool.close().await;

        let error = repo.get(&ConversationKey::from("U-1")).await.expect_err("closed pool");
        assert!(matches!(error, RepositoryError::Database(_)));
    }
}
