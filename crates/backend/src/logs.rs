use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use cadence_types::{ExecutionLogEntry, ExecutionStatus, TriggerSource};

use crate::db::Database;
use crate::row::{column_decode, decode_json, decode_uuid, decode_uuid_opt, encode_json};

const LOG_COLUMNS: &str = "id, organization_id, rule_id, executed_at, triggered_by, trigger_source, \
     status, records_evaluated, records_matched, tasks_created, records_skipped_duplicate, \
     error_message, details";

/// Payload for one append; the store stamps id and `executed_at`.
#[derive(Debug, Clone)]
pub struct NewExecutionLog {
    pub organization_id: Uuid,
    pub rule_id: Uuid,
    pub triggered_by: Option<Uuid>,
    pub trigger_source: TriggerSource,
    pub status: ExecutionStatus,
    pub records_evaluated: i64,
    pub records_matched: i64,
    pub tasks_created: i64,
    pub records_skipped_duplicate: i64,
    pub error_message: Option<String>,
    pub details: serde_json::Value,
}

/// Append-only audit trail. There is deliberately no update or delete path.
#[derive(Clone)]
pub struct ExecutionLogStore {
    pool: SqlitePool,
}

impl ExecutionLogStore {
    pub fn new(db: &Database) -> Self {
        ExecutionLogStore {
            pool: db.pool().clone(),
        }
    }

    pub async fn append(&self, new: NewExecutionLog) -> Result<ExecutionLogEntry, sqlx::Error> {
        let entry = ExecutionLogEntry {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            rule_id: new.rule_id,
            executed_at: Utc::now(),
            triggered_by: new.triggered_by,
            trigger_source: new.trigger_source,
            status: new.status,
            records_evaluated: new.records_evaluated,
            records_matched: new.records_matched,
            tasks_created: new.tasks_created,
            records_skipped_duplicate: new.records_skipped_duplicate,
            error_message: new.error_message,
            details: new.details,
        };

        sqlx::query(
            "INSERT INTO execution_logs (id, organization_id, rule_id, executed_at, triggered_by, \
             trigger_source, status, records_evaluated, records_matched, tasks_created, \
             records_skipped_duplicate, error_message, details) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(entry.id.to_string())
        .bind(entry.organization_id.to_string())
        .bind(entry.rule_id.to_string())
        .bind(entry.executed_at)
        .bind(entry.triggered_by.map(|id| id.to_string()))
        .bind(entry.trigger_source.as_str())
        .bind(entry.status.as_str())
        .bind(entry.records_evaluated)
        .bind(entry.records_matched)
        .bind(entry.tasks_created)
        .bind(entry.records_skipped_duplicate)
        .bind(entry.error_message.clone())
        .bind(encode_json(&entry.details)?)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Most recent first.
    pub async fn list_recent(
        &self,
        organization_id: Uuid,
        rule_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionLogEntry>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM execution_logs \
             WHERE organization_id = ?1 AND rule_id = ?2 \
             ORDER BY executed_at DESC, id DESC LIMIT ?3"
        ))
        .bind(organization_id.to_string())
        .bind(rule_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(log_from_row).collect()
    }
}

fn log_from_row(row: &SqliteRow) -> Result<ExecutionLogEntry, sqlx::Error> {
    let source_raw: String = row.try_get("trigger_source")?;
    let trigger_source = TriggerSource::parse(&source_raw).ok_or_else(|| {
        column_decode("trigger_source", format!("unknown source '{}'", source_raw))
    })?;
    let status_raw: String = row.try_get("status")?;
    let status = ExecutionStatus::parse(&status_raw)
        .ok_or_else(|| column_decode("status", format!("unknown status '{}'", status_raw)))?;

    Ok(ExecutionLogEntry {
        id: decode_uuid(row, "id")?,
        organization_id: decode_uuid(row, "organization_id")?,
        rule_id: decode_uuid(row, "rule_id")?,
        executed_at: row.try_get::<DateTime<Utc>, _>("executed_at")?,
        triggered_by: decode_uuid_opt(row, "triggered_by")?,
        trigger_source,
        status,
        records_evaluated: row.try_get("records_evaluated")?,
        records_matched: row.try_get("records_matched")?,
        tasks_created: row.try_get("tasks_created")?,
        records_skipped_duplicate: row.try_get("records_skipped_duplicate")?,
        error_message: row.try_get("error_message")?,
        details: decode_json(row, "details")?,
    })
}
