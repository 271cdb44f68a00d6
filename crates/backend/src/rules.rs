use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use cadence_types::{NewWorkflowRule, RuleUpdate, WorkflowRule};

use crate::db::Database;
use crate::row::{decode_json, decode_uuid, decode_uuid_opt, encode_json};

const RULE_COLUMNS: &str = "id, organization_id, name, description, trigger_type, \
     trigger_conditions, action_config, is_enabled, sort_order, created_by, \
     created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct RuleStore {
    pool: SqlitePool,
}

impl RuleStore {
    pub fn new(db: &Database) -> Self {
        RuleStore {
            pool: db.pool().clone(),
        }
    }

    pub async fn create(
        &self,
        organization_id: Uuid,
        created_by: Option<Uuid>,
        new: NewWorkflowRule,
    ) -> Result<WorkflowRule, sqlx::Error> {
        let now = Utc::now();
        let rule = WorkflowRule {
            id: Uuid::new_v4(),
            organization_id,
            name: new.name,
            description: new.description,
            trigger_type: new.trigger_type,
            trigger_conditions: new.trigger_conditions,
            action_config: new.action_config,
            is_enabled: new.is_enabled,
            sort_order: new.sort_order,
            created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        sqlx::query(
            "INSERT INTO workflow_rules (id, organization_id, name, description, trigger_type, \
             trigger_conditions, action_config, is_enabled, sort_order, created_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(rule.id.to_string())
        .bind(rule.organization_id.to_string())
        .bind(rule.name.clone())
        .bind(rule.description.clone())
        .bind(rule.trigger_type.clone())
        .bind(encode_json(&rule.trigger_conditions)?)
        .bind(encode_json(&rule.action_config)?)
        .bind(rule.is_enabled)
        .bind(rule.sort_order)
        .bind(rule.created_by.map(|id| id.to_string()))
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(rule)
    }

    /// Fetch a live (non-deleted) rule scoped to its organization.
    pub async fn get(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WorkflowRule>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM workflow_rules \
             WHERE id = ?1 AND organization_id = ?2 AND deleted_at IS NULL"
        ))
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| rule_from_row(&row)).transpose()
    }

    /// Fetch regardless of soft deletion; used by the log listing so an audit
    /// trail stays reachable after its rule is deleted.
    pub async fn get_any(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WorkflowRule>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM workflow_rules \
             WHERE id = ?1 AND organization_id = ?2"
        ))
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| rule_from_row(&row)).transpose()
    }

    pub async fn list(&self, organization_id: Uuid) -> Result<Vec<WorkflowRule>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM workflow_rules \
             WHERE organization_id = ?1 AND deleted_at IS NULL \
             ORDER BY sort_order ASC, created_at DESC"
        ))
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rule_from_row).collect()
    }

    pub async fn list_enabled(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<WorkflowRule>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM workflow_rules \
             WHERE organization_id = ?1 AND deleted_at IS NULL AND is_enabled = 1 \
             ORDER BY sort_order ASC, created_at ASC"
        ))
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rule_from_row).collect()
    }

    /// Apply a partial update; returns the refreshed rule, or `None` when the
    /// rule does not exist (or is deleted) in this organization.
    pub async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        update: &RuleUpdate,
    ) -> Result<Option<WorkflowRule>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE workflow_rules SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(name) = &update.name {
            builder.push(", name = ").push_bind(name.clone());
        }
        if let Some(description) = &update.description {
            builder.push(", description = ").push_bind(description.clone());
        }
        if let Some(trigger_type) = &update.trigger_type {
            builder.push(", trigger_type = ").push_bind(trigger_type.clone());
        }
        if let Some(conditions) = &update.trigger_conditions {
            builder
                .push(", trigger_conditions = ")
                .push_bind(encode_json(conditions)?);
        }
        if let Some(action_config) = &update.action_config {
            builder
                .push(", action_config = ")
                .push_bind(encode_json(action_config)?);
        }
        if let Some(is_enabled) = update.is_enabled {
            builder.push(", is_enabled = ").push_bind(is_enabled);
        }
        if let Some(sort_order) = update.sort_order {
            builder.push(", sort_order = ").push_bind(sort_order);
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());
        builder
            .push(" AND organization_id = ")
            .push_bind(organization_id.to_string());
        builder.push(" AND deleted_at IS NULL");

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(organization_id, id).await
    }

    /// Soft delete. Execution logs are intentionally left in place.
    pub async fn soft_delete(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflow_rules SET deleted_at = ?1, updated_at = ?1 \
             WHERE id = ?2 AND organization_id = ?3 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn rule_from_row(row: &SqliteRow) -> Result<WorkflowRule, sqlx::Error> {
    Ok(WorkflowRule {
        id: decode_uuid(row, "id")?,
        organization_id: decode_uuid(row, "organization_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        trigger_type: row.try_get("trigger_type")?,
        trigger_conditions: decode_json(row, "trigger_conditions")?,
        action_config: decode_json(row, "action_config")?,
        is_enabled: row.try_get("is_enabled")?,
        sort_order: row.try_get("sort_order")?,
        created_by: decode_uuid_opt(row, "created_by")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        deleted_at: row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")?,
    })
}
