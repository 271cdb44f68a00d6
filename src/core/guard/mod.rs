//! Duplicate guard: split trigger matches into accounts that still need a
//! task and accounts that already have an active one from this rule.
//!
//! The partition is advisory; the unique index on active
//! `(source_rule_id, account_id)` pairs is what actually prevents two
//! concurrent runs from double-creating. Detection reads live task state
//! only, never the execution log, so a task a user completed or deleted
//! frees its account for the next run.

use cadence_backend::TaskStore;
use cadence_types::{Account, WorkflowRule};

use crate::core::error::EngineError;

#[derive(Debug)]
pub struct Partition {
    pub to_create: Vec<Account>,
    pub skipped: Vec<Account>,
}

pub struct DuplicateGuard {
    tasks: TaskStore,
}

impl DuplicateGuard {
    pub fn new(tasks: TaskStore) -> Self {
        DuplicateGuard { tasks }
    }

    pub async fn partition(
        &self,
        rule: &WorkflowRule,
        candidates: Vec<Account>,
    ) -> Result<Partition, EngineError> {
        if candidates.is_empty() {
            return Ok(Partition {
                to_create: Vec::new(),
                skipped: Vec::new(),
            });
        }
        let active = self.tasks.active_account_ids(rule.id).await?;
        let (skipped, to_create) = candidates
            .into_iter()
            .partition(|account| active.contains(&account.id));
        Ok(Partition { to_create, skipped })
    }
}
