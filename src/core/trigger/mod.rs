//! Trigger evaluation: turn a rule's trigger configuration into the set of
//! matching accounts. Pure read; all filtering beyond tenancy happens here
//! rather than in SQL so the window semantics live in one place.

use chrono::{Duration, NaiveDate};
use serde_json::Value;

use cadence_backend::AccountStore;
use cadence_types::{Account, WorkflowRule};

use crate::core::error::EngineError;

/// Parsed, validated trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Accounts whose renewal date falls within `[today, today + days]`.
    RenewalWithinDays { days: i64 },
}

/// Result of evaluating one rule: how many candidates were examined and
/// which of them matched.
#[derive(Debug)]
pub struct Evaluation {
    pub records_evaluated: i64,
    pub matched: Vec<Account>,
}

/// Parse and validate a stored trigger configuration.
pub fn parse_trigger(trigger_type: &str, conditions: &Value) -> Result<Trigger, EngineError> {
    match trigger_type {
        "renewal_within_days" => {
            let days = conditions
                .get("days")
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    EngineError::invalid_trigger_config(
                        "trigger renewal_within_days requires integer field 'days'",
                    )
                })?;
            if days < 0 {
                return Err(EngineError::invalid_trigger_config(
                    "trigger renewal_within_days requires days >= 0",
                ));
            }
            Ok(Trigger::RenewalWithinDays { days })
        }
        other => Err(EngineError::unknown_trigger_type(other)),
    }
}

/// Window test: inclusive at both ends, so `today + days` still matches and
/// anything before today never does.
fn in_renewal_window(renewal: NaiveDate, today: NaiveDate, days: i64) -> bool {
    renewal >= today && renewal <= today + Duration::days(days)
}

pub struct TriggerEvaluator {
    accounts: AccountStore,
}

impl TriggerEvaluator {
    pub fn new(accounts: AccountStore) -> Self {
        TriggerEvaluator { accounts }
    }

    pub async fn evaluate(
        &self,
        rule: &WorkflowRule,
        today: NaiveDate,
    ) -> Result<Evaluation, EngineError> {
        let trigger = parse_trigger(&rule.trigger_type, &rule.trigger_conditions)?;
        match trigger {
            Trigger::RenewalWithinDays { days } => {
                let candidates = self
                    .accounts
                    .renewal_candidates(rule.organization_id)
                    .await?;
                let records_evaluated = candidates.len() as i64;
                let matched = candidates
                    .into_iter()
                    .filter(|account| {
                        account
                            .renewal_date
                            .is_some_and(|date| in_renewal_window(date, today, days))
                    })
                    .collect();
                Ok(Evaluation {
                    records_evaluated,
                    matched,
                })
            }
        }
    }
}
