//! Execution orchestrator: loads a rule, evaluates its trigger, filters
//! duplicates, renders and persists tasks, and appends exactly one execution
//! log entry per run that got past configuration loading.

use chrono::{Duration, NaiveDate, Utc};
use std::time::Instant;
use tokio::time::timeout;
use uuid::Uuid;

use cadence_backend::{
    AccountStore, Database, ExecutionLogStore, NewExecutionLog, NewGeneratedTask, RuleStore,
    TaskInsert, TaskStore,
};
use cadence_types::{
    Account, ExecutionLogEntry, ExecutionStatus, ExecutionSummary, RunAllSummary, TaskDetail,
    TaskStatus, TriggerSource, WorkflowRule,
};

use crate::core::config::ExecutionConfig;
use crate::core::error::EngineError;
use crate::core::guard::DuplicateGuard;
use crate::core::template;
use crate::core::trigger::{self, TriggerEvaluator};
use crate::core::types::ErrorCategory;

/// Phase ladder for one run. `Failed` is reachable from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Evaluating,
    Filtering,
    Rendering,
    Persisting,
    Logging,
    Done,
    Failed,
}

/// Mutable run progress. Kept outside the timed future so a timed-out run
/// still logs whatever counts it reached.
#[derive(Debug)]
struct RunState {
    phase: ExecutionPhase,
    records_evaluated: i64,
    records_matched: i64,
    tasks_created: i64,
    records_skipped_duplicate: i64,
    insert_failures: i64,
    first_insert_error: Option<String>,
    details: Vec<TaskDetail>,
}

impl RunState {
    fn new() -> Self {
        RunState {
            phase: ExecutionPhase::Evaluating,
            records_evaluated: 0,
            records_matched: 0,
            tasks_created: 0,
            records_skipped_duplicate: 0,
            insert_failures: 0,
            first_insert_error: None,
            details: Vec::new(),
        }
    }

    fn enter(&mut self, phase: ExecutionPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "execution phase transition");
        self.phase = phase;
    }
}

/// One staged task plus the account context needed for the log details.
struct StagedTask {
    account_id: Uuid,
    account_name: String,
    days_remaining: i64,
    record: NewGeneratedTask,
}

pub struct WorkflowEngine {
    rules: RuleStore,
    tasks: TaskStore,
    logs: ExecutionLogStore,
    evaluator: TriggerEvaluator,
    guard: DuplicateGuard,
    run_timeout: std::time::Duration,
}

impl WorkflowEngine {
    pub fn new(db: &Database, config: &ExecutionConfig) -> Self {
        WorkflowEngine {
            rules: RuleStore::new(db),
            tasks: TaskStore::new(db),
            logs: ExecutionLogStore::new(db),
            evaluator: TriggerEvaluator::new(AccountStore::new(db)),
            guard: DuplicateGuard::new(TaskStore::new(db)),
            run_timeout: std::time::Duration::from_secs(config.run_timeout_seconds),
        }
    }

    /// Run one rule to completion.
    ///
    /// Errors are split two ways per the engine contract: a missing rule or a
    /// bad trigger configuration is returned as `Err` with no log entry
    /// (evaluation never started); any failure after that is absorbed into an
    /// `ExecutionSummary` with `status = error` and one log entry.
    pub async fn execute(
        &self,
        organization_id: Uuid,
        rule_id: Uuid,
        triggered_by: Option<Uuid>,
        source: TriggerSource,
    ) -> Result<ExecutionSummary, EngineError> {
        let started = Instant::now();
        let rule = self
            .rules
            .get(organization_id, rule_id)
            .await?
            .ok_or_else(|| EngineError::rule_not_found(rule_id))?;

        if !rule.is_enabled {
            return self.record_skip(&rule, triggered_by, source, started).await;
        }

        // Reject bad trigger configuration before any work starts.
        trigger::parse_trigger(&rule.trigger_type, &rule.trigger_conditions)?;

        tracing::info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            source = source.as_str(),
            "executing workflow rule"
        );

        let mut state = RunState::new();
        let outcome = match timeout(
            self.run_timeout,
            self.run_phases(&rule, triggered_by, &mut state),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(EngineError::new(
                ErrorCategory::TimeoutError,
                format!(
                    "rule execution exceeded {}s budget",
                    self.run_timeout.as_secs()
                ),
            )),
        };

        state.enter(ExecutionPhase::Logging);
        let status = match &outcome {
            Ok(()) if state.insert_failures > 0 => ExecutionStatus::PartialFailure,
            Ok(()) => ExecutionStatus::Success,
            Err(_) => ExecutionStatus::Error,
        };
        let error_message = match &outcome {
            Ok(()) => state.first_insert_error.clone(),
            Err(err) => {
                tracing::error!(rule_id = %rule.id, error = %err, "rule execution failed");
                Some(err.to_string())
            }
        };

        self.logs
            .append(NewExecutionLog {
                organization_id,
                rule_id: rule.id,
                triggered_by,
                trigger_source: source,
                status,
                records_evaluated: state.records_evaluated,
                records_matched: state.records_matched,
                tasks_created: state.tasks_created,
                records_skipped_duplicate: state.records_skipped_duplicate,
                error_message: error_message.clone(),
                details: serde_json::to_value(&state.details)?,
            })
            .await?;

        state.enter(if outcome.is_ok() {
            ExecutionPhase::Done
        } else {
            ExecutionPhase::Failed
        });

        Ok(ExecutionSummary {
            rule_id: rule.id,
            organization_id,
            status,
            records_evaluated: state.records_evaluated,
            records_matched: state.records_matched,
            tasks_created: state.tasks_created,
            records_skipped_duplicate: state.records_skipped_duplicate,
            error_message,
            details: state.details,
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Execute every enabled rule of the organization in sort order. One
    /// rule failing degrades the overall status but never stops the rest.
    pub async fn execute_all(
        &self,
        organization_id: Uuid,
        triggered_by: Option<Uuid>,
        source: TriggerSource,
    ) -> Result<RunAllSummary, EngineError> {
        let started = Instant::now();
        let rules = self.rules.list_enabled(organization_id).await?;
        let mut aggregate = RunAllSummary::new(organization_id, source);
        for rule in rules {
            match self
                .execute(organization_id, rule.id, triggered_by, source)
                .await
            {
                Ok(summary) => aggregate.absorb(&rule.name, &summary),
                Err(err) => {
                    tracing::error!(rule_id = %rule.id, error = %err, "skipping failed rule");
                    let mut failed = ExecutionSummary::empty(
                        rule.id,
                        organization_id,
                        ExecutionStatus::Error,
                    );
                    failed.error_message = Some(err.to_string());
                    aggregate.absorb(&rule.name, &failed);
                }
            }
        }
        aggregate.execution_time_ms = started.elapsed().as_millis() as u64;
        Ok(aggregate)
    }

    /// Most-recent-first execution history. Works for soft-deleted rules so
    /// the audit trail outlives its rule.
    pub async fn list_logs(
        &self,
        organization_id: Uuid,
        rule_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionLogEntry>, EngineError> {
        if self
            .rules
            .get_any(organization_id, rule_id)
            .await?
            .is_none()
        {
            return Err(EngineError::rule_not_found(rule_id));
        }
        Ok(self.logs.list_recent(organization_id, rule_id, limit).await?)
    }

    async fn record_skip(
        &self,
        rule: &WorkflowRule,
        triggered_by: Option<Uuid>,
        source: TriggerSource,
        started: Instant,
    ) -> Result<ExecutionSummary, EngineError> {
        let message = format!("rule is disabled: {}", rule.name);
        tracing::info!(rule_id = %rule.id, "skipping disabled rule");
        self.logs
            .append(NewExecutionLog {
                organization_id: rule.organization_id,
                rule_id: rule.id,
                triggered_by,
                trigger_source: source,
                status: ExecutionStatus::Skipped,
                records_evaluated: 0,
                records_matched: 0,
                tasks_created: 0,
                records_skipped_duplicate: 0,
                error_message: Some(message.clone()),
                details: serde_json::Value::Array(Vec::new()),
            })
            .await?;
        let mut summary = ExecutionSummary::empty(
            rule.id,
            rule.organization_id,
            ExecutionStatus::Skipped,
        );
        summary.error_message = Some(message);
        summary.execution_time_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    async fn run_phases(
        &self,
        rule: &WorkflowRule,
        triggered_by: Option<Uuid>,
        state: &mut RunState,
    ) -> Result<(), EngineError> {
        let today = Utc::now().date_naive();

        let evaluation = self.evaluator.evaluate(rule, today).await?;
        state.records_evaluated = evaluation.records_evaluated;
        state.records_matched = evaluation.matched.len() as i64;
        if evaluation.matched.is_empty() {
            return Ok(());
        }

        state.enter(ExecutionPhase::Filtering);
        let partition = self.guard.partition(rule, evaluation.matched).await?;
        state.records_skipped_duplicate = partition.skipped.len() as i64;

        state.enter(ExecutionPhase::Rendering);
        let staged = stage_tasks(rule, &partition.to_create, triggered_by, today);

        state.enter(ExecutionPhase::Persisting);
        for task in staged {
            match self.tasks.insert(task.record).await {
                Ok(TaskInsert::Created(created)) => {
                    state.tasks_created += 1;
                    state.details.push(TaskDetail {
                        account_id: task.account_id,
                        account_name: task.account_name,
                        task_id: created.id,
                        subject: created.subject,
                        priority: created.priority,
                        due_date: created.due_date,
                        assignee_id: created.assignee_id,
                        days_remaining: task.days_remaining,
                    });
                }
                Ok(TaskInsert::DuplicateActive) => {
                    // Lost the insert race against a concurrent run of the
                    // same rule; counted exactly like a guard-detected skip.
                    state.records_skipped_duplicate += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        account_id = %task.account_id,
                        error = %err,
                        "task insert failed, continuing with remaining accounts"
                    );
                    state.insert_failures += 1;
                    if state.first_insert_error.is_none() {
                        state.first_insert_error = Some(err.to_string());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Render templates and resolve the action policy for every account that
/// passed the duplicate guard. Pure; persistence happens in the caller.
fn stage_tasks(
    rule: &WorkflowRule,
    accounts: &[Account],
    triggered_by: Option<Uuid>,
    today: NaiveDate,
) -> Vec<StagedTask> {
    let config = &rule.action_config;
    accounts
        .iter()
        .map(|account| {
            let days_remaining = account
                .renewal_date
                .map(|date| (date - today).num_days())
                .unwrap_or(0);
            let vars = template::account_context(account, days_remaining);
            let due_date = today + Duration::days(config.days_before_due);
            let status = if due_date > today {
                TaskStatus::Scheduled
            } else {
                TaskStatus::Pending
            };
            StagedTask {
                account_id: account.id,
                account_name: account.account_name.clone(),
                days_remaining,
                record: NewGeneratedTask {
                    organization_id: rule.organization_id,
                    source_rule_id: rule.id,
                    account_id: account.id,
                    subject: template::render(&config.subject_template, &vars),
                    description: template::render(&config.description_template, &vars),
                    priority: config.priority.resolve(days_remaining),
                    status,
                    due_date,
                    assignee_id: config.assignee_strategy.resolve(
                        account.owner_id,
                        config.assignee_user_id,
                        triggered_by,
                    ),
                },
            }
        })
        .collect()
}
