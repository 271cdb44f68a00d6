use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::HashSet;
use uuid::Uuid;

use cadence_types::{GeneratedTask, TaskPriority, TaskStatus};

use crate::db::Database;
use crate::row::{column_decode, decode_uuid, decode_uuid_opt};

const TASK_COLUMNS: &str = "id, organization_id, source_rule_id, account_id, subject, description, \
     priority, status, due_date, assignee_id, created_at, updated_at, completed_at, deleted_at";

/// A task staged by the orchestrator, ready to persist.
#[derive(Debug, Clone)]
pub struct NewGeneratedTask {
    pub organization_id: Uuid,
    pub source_rule_id: Uuid,
    pub account_id: Uuid,
    pub subject: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: NaiveDate,
    pub assignee_id: Option<Uuid>,
}

/// Insert outcome; a unique-index conflict on the active `(rule, account)`
/// pair is a normal result, not an error.
#[derive(Debug)]
pub enum TaskInsert {
    Created(GeneratedTask),
    DuplicateActive,
}

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(db: &Database) -> Self {
        TaskStore {
            pool: db.pool().clone(),
        }
    }

    pub async fn insert(&self, new: NewGeneratedTask) -> Result<TaskInsert, sqlx::Error> {
        let now = Utc::now();
        let task = GeneratedTask {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            source_rule_id: new.source_rule_id,
            account_id: new.account_id,
            subject: new.subject,
            description: new.description,
            priority: new.priority,
            status: new.status,
            due_date: new.due_date,
            assignee_id: new.assignee_id,
            created_at: now,
            updated_at: now,
            completed_at: None,
            deleted_at: None,
        };

        let result = sqlx::query(
            "INSERT INTO generated_tasks (id, organization_id, source_rule_id, account_id, subject, \
             description, priority, status, due_date, assignee_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(task.id.to_string())
        .bind(task.organization_id.to_string())
        .bind(task.source_rule_id.to_string())
        .bind(task.account_id.to_string())
        .bind(task.subject.clone())
        .bind(task.description.clone())
        .bind(task.priority.as_str())
        .bind(task.status.as_str())
        .bind(task.due_date)
        .bind(task.assignee_id.map(|id| id.to_string()))
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(TaskInsert::Created(task)),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(TaskInsert::DuplicateActive)
            }
            Err(err) => Err(err),
        }
    }

    /// Account ids that already have an active task from the given rule.
    pub async fn active_account_ids(&self, rule_id: Uuid) -> Result<HashSet<Uuid>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT DISTINCT account_id FROM generated_tasks \
             WHERE source_rule_id = ?1 AND status IN ('scheduled', 'pending') AND deleted_at IS NULL",
        )
        .bind(rule_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| decode_uuid(row, "account_id"))
            .collect()
    }

    pub async fn count_active_pair(
        &self,
        rule_id: Uuid,
        account_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS active FROM generated_tasks \
             WHERE source_rule_id = ?1 AND account_id = ?2 \
             AND status IN ('scheduled', 'pending') AND deleted_at IS NULL",
        )
        .bind(rule_id.to_string())
        .bind(account_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        row.try_get("active")
    }

    pub async fn list_for_rule(&self, rule_id: Uuid) -> Result<Vec<GeneratedTask>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM generated_tasks \
             WHERE source_rule_id = ?1 AND deleted_at IS NULL \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(rule_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    /// Normal task lifecycle, outside the engine's control once created.
    pub async fn complete(
        &self,
        organization_id: Uuid,
        task_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE generated_tasks SET status = 'completed', completed_at = ?1, updated_at = ?1 \
             WHERE id = ?2 AND organization_id = ?3 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(task_id.to_string())
        .bind(organization_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn task_from_row(row: &SqliteRow) -> Result<GeneratedTask, sqlx::Error> {
    let priority_raw: String = row.try_get("priority")?;
    let priority = TaskPriority::parse(&priority_raw)
        .ok_or_else(|| column_decode("priority", format!("unknown priority '{}'", priority_raw)))?;
    let status_raw: String = row.try_get("status")?;
    let status = TaskStatus::parse(&status_raw)
        .ok_or_else(|| column_decode("status", format!("unknown status '{}'", status_raw)))?;

    Ok(GeneratedTask {
        id: decode_uuid(row, "id")?,
        organization_id: decode_uuid(row, "organization_id")?,
        source_rule_id: decode_uuid(row, "source_rule_id")?,
        account_id: decode_uuid(row, "account_id")?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        priority,
        status,
        due_date: row.try_get::<NaiveDate, _>("due_date")?,
        assignee_id: decode_uuid_opt(row, "assignee_id")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        deleted_at: row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")?,
    })
}
