pub mod account;
pub mod execution;
pub mod rule;
pub mod task;

pub use account::{Account, NewAccount};
pub use execution::{
    ExecutionLogEntry, ExecutionStatus, ExecutionSummary, RuleRunOutcome, RunAllSummary,
    TaskDetail, TriggerSource,
};
pub use rule::{
    ActionConfig, AssigneeStrategy, NewWorkflowRule, PriorityPolicy, RuleUpdate, WorkflowRule,
};
pub use task::{GeneratedTask, TaskPriority, TaskStatus};
