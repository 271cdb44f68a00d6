use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::task::TaskPriority;

/// What kicked off a rule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    #[default]
    Manual,
    Scheduled,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Scheduled => "scheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(TriggerSource::Manual),
            "scheduled" => Some(TriggerSource::Scheduled),
            _ => None,
        }
    }
}

/// Outcome of one engine run against one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Skipped,
    PartialFailure,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::PartialFailure => "partial_failure",
            ExecutionStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(ExecutionStatus::Success),
            "skipped" => Some(ExecutionStatus::Skipped),
            "partial_failure" => Some(ExecutionStatus::PartialFailure),
            "error" => Some(ExecutionStatus::Error),
            _ => None,
        }
    }
}

/// Per-task detail recorded in the execution log's `details` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub account_id: Uuid,
    pub account_name: String,
    pub task_id: Uuid,
    pub subject: String,
    pub priority: TaskPriority,
    pub due_date: NaiveDate,
    pub assignee_id: Option<Uuid>,
    pub days_remaining: i64,
}

/// Summary returned to the caller of a single rule execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub rule_id: Uuid,
    pub organization_id: Uuid,
    pub status: ExecutionStatus,
    pub records_evaluated: i64,
    pub records_matched: i64,
    pub tasks_created: i64,
    pub records_skipped_duplicate: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub details: Vec<TaskDetail>,
    pub execution_time_ms: u64,
}

impl ExecutionSummary {
    pub fn empty(rule_id: Uuid, organization_id: Uuid, status: ExecutionStatus) -> Self {
        ExecutionSummary {
            rule_id,
            organization_id,
            status,
            records_evaluated: 0,
            records_matched: 0,
            tasks_created: 0,
            records_skipped_duplicate: 0,
            error_message: None,
            details: Vec::new(),
            execution_time_ms: 0,
        }
    }
}

/// One durable, append-only audit record of a rule execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub rule_id: Uuid,
    pub executed_at: DateTime<Utc>,
    pub triggered_by: Option<Uuid>,
    pub trigger_source: TriggerSource,
    pub status: ExecutionStatus,
    pub records_evaluated: i64,
    pub records_matched: i64,
    pub tasks_created: i64,
    pub records_skipped_duplicate: i64,
    pub error_message: Option<String>,
    pub details: Value,
}

/// Per-rule line item inside a run-all summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRunOutcome {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub status: ExecutionStatus,
    pub records_matched: i64,
    pub tasks_created: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Aggregate summary of executing every enabled rule for an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAllSummary {
    pub organization_id: Uuid,
    pub trigger_source: TriggerSource,
    pub rules_executed: i64,
    pub total_records_evaluated: i64,
    pub total_records_matched: i64,
    pub total_tasks_created: i64,
    pub total_records_skipped: i64,
    pub overall_status: ExecutionStatus,
    pub executions: Vec<RuleRunOutcome>,
    pub execution_time_ms: u64,
}

impl RunAllSummary {
    pub fn new(organization_id: Uuid, trigger_source: TriggerSource) -> Self {
        RunAllSummary {
            organization_id,
            trigger_source,
            rules_executed: 0,
            total_records_evaluated: 0,
            total_records_matched: 0,
            total_tasks_created: 0,
            total_records_skipped: 0,
            overall_status: ExecutionStatus::Success,
            executions: Vec::new(),
            execution_time_ms: 0,
        }
    }

    /// Fold one rule's summary into the aggregate.
    pub fn absorb(&mut self, rule_name: &str, summary: &ExecutionSummary) {
        self.rules_executed += 1;
        self.total_records_evaluated += summary.records_evaluated;
        self.total_records_matched += summary.records_matched;
        self.total_tasks_created += summary.tasks_created;
        self.total_records_skipped += summary.records_skipped_duplicate;
        if matches!(
            summary.status,
            ExecutionStatus::Error | ExecutionStatus::PartialFailure
        ) {
            self.overall_status = ExecutionStatus::PartialFailure;
        }
        self.executions.push(RuleRunOutcome {
            rule_id: summary.rule_id,
            rule_name: rule_name.to_string(),
            status: summary.status,
            records_matched: summary.records_matched,
            tasks_created: summary.tasks_created,
            error_message: summary.error_message.clone(),
        });
    }
}
