use chrono::{DateTime, Utc};
use sqlx::Row;

use concierge_core::domain::tool::{DispatchOutcome, ToolDispatchRecord};

use super::{DispatchJournal, RepositoryError};
use crate::DbPool;

pub struct SqlDispatchJournal {
    pool: DbPool,
}

impl SqlDispatchJournal {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ToolDispatchRecord, RepositoryError> {
    let tool_call_id: Option<String> =
        row.try_get("tool_call_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tool_name: String =
        row.try_get("tool_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let arguments_json: String =
        row.try_get("arguments_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let outcome_str: String =
        row.try_get("outcome").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let output: String =
        row.try_get("output").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recorded_at_str: String =
        row.try_get("recorded_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let outcome = DispatchOutcome::parse(&outcome_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown dispatch outcome `{outcome_str}`")))?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ToolDispatchRecord { tool_call_id, tool_name, arguments_json, outcome, output, recorded_at })
}

#[async_trait::async_trait]
impl DispatchJournal for SqlDispatchJournal {
    async fn record(&self, record: ToolDispatchRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tool_dispatch_log (tool_call_id, tool_name, arguments_json, outcome,
                                            output, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.tool_call_id)
        .bind(&record.tool_name)
        .bind(&record.arguments_json)
        .bind(record.outcome.as_str())
        .bind(&record.output)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ToolDispatchRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT tool_call_id, tool_name, arguments_json, outcome, output, recorded_at
             FROM tool_dispatch_log
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use concierge_core::domain::tool::{DispatchOutcome, ToolDispatchRecord};

    use super::SqlDispatchJournal;
    use crate::repositories::DispatchJournal;
    use crate::{connect_with_settings, migrations};

    fn record(tool_name: &str, outcome: DispatchOutcome) -> ToolDispatchRecord {
        ToolDispatchRecord {
            tool_call_id: Some(format!("call_{tool_name}")),
            tool_name: tool_name.to_owned(),
            arguments_json: "{}".to_owned(),
            outcome,
            output: format!("output of {tool_name}"),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recent_returns_newest_first_and_respects_limit() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let journal = SqlDispatchJournal::new(pool.clone());

        journal.record(record("get_product_info_by_criteria", DispatchOutcome::Ok)).await.expect("1");
        journal.record(record("create_invoice", DispatchOutcome::Error)).await.expect("2");
        journal.record(record("mystery", DispatchOutcome::UnknownTool)).await.expect("3");

        let recent = journal.recent(2).await.expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tool_name, "mystery");
        assert_eq!(recent[0].outcome, DispatchOutcome::UnknownTool);
        assert_eq!(recent[1].tool_name, "create_invoice");
        assert_eq!(recent[1].outcome, DispatchOutcome::Error);
        assert_eq!(recent[1].tool_call_id.as_deref(), Some("call_create_invoice"));

        pool.close().await;
    }
}
