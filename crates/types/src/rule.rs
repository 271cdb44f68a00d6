use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::task::TaskPriority;

/// A configured trigger + action pair, owned by one organization.
///
/// `trigger_type` is kept as the raw stored string so that a rule written with
/// a trigger this build does not understand still loads; the evaluator rejects
/// it at execution time instead of poisoning every list query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: String,
    pub trigger_conditions: Value,
    pub action_config: ActionConfig,
    pub is_enabled: bool,
    pub sort_order: i64,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Task-creation policy attached to a rule.
///
/// Field names here are the on-disk JSON contract; they are also the names
/// rule authors use, so they stay snake_case independent of the API casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub subject_template: String,
    #[serde(default)]
    pub description_template: String,
    #[serde(default)]
    pub priority: PriorityPolicy,
    #[serde(default)]
    pub days_before_due: i64,
    #[serde(default)]
    pub assignee_strategy: AssigneeStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_user_id: Option<Uuid>,
}

/// Priority written onto generated tasks: either a fixed level or `auto`,
/// which derives urgency from how close the renewal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriorityPolicy {
    #[default]
    Auto,
    High,
    Medium,
    Low,
}

impl PriorityPolicy {
    pub fn resolve(&self, days_remaining: i64) -> TaskPriority {
        match self {
            PriorityPolicy::High => TaskPriority::High,
            PriorityPolicy::Medium => TaskPriority::Medium,
            PriorityPolicy::Low => TaskPriority::Low,
            PriorityPolicy::Auto => {
                if days_remaining <= 7 {
                    TaskPriority::High
                } else if days_remaining <= 14 {
                    TaskPriority::Medium
                } else {
                    TaskPriority::Low
                }
            }
        }
    }
}

/// How the generated task's assignee is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssigneeStrategy {
    AccountOwner,
    SpecificUser,
    #[default]
    TriggeringUser,
}

impl AssigneeStrategy {
    /// Resolve the assignee, falling back to the triggering user when the
    /// preferred target is not available.
    pub fn resolve(
        &self,
        account_owner: Option<Uuid>,
        configured_user: Option<Uuid>,
        triggered_by: Option<Uuid>,
    ) -> Option<Uuid> {
        match self {
            AssigneeStrategy::AccountOwner => account_owner.or(triggered_by),
            AssigneeStrategy::SpecificUser => configured_user.or(triggered_by),
            AssigneeStrategy::TriggeringUser => triggered_by,
        }
    }
}

/// Request body for creating a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkflowRule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub trigger_type: String,
    pub trigger_conditions: Value,
    pub action_config: ActionConfig,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub sort_order: i64,
}

/// Partial update for an existing rule; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub trigger_type: Option<String>,
    #[serde(default)]
    pub trigger_conditions: Option<Value>,
    #[serde(default)]
    pub action_config: Option<ActionConfig>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

impl RuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.trigger_type.is_none()
            && self.trigger_conditions.is_none()
            && self.action_config.is_none()
            && self.is_enabled.is_none()
            && self.sort_order.is_none()
    }
}

fn default_true() -> bool {
    true
}
