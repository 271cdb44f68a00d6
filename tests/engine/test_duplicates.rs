use cadence::core::config::ExecutionConfig;
use cadence::core::engine::WorkflowEngine;
use cadence_backend::{AccountStore, Database, RuleStore, TaskStore};
use cadence_types::{ActionConfig, ExecutionStatus, NewAccount, NewWorkflowRule, TriggerSource};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

async fn setup() -> (TempDir, Database, WorkflowEngine) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("cadence.db").display());
    let db = Database::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    let engine = WorkflowEngine::new(&db, &ExecutionConfig::default());
    (dir, db, engine)
}

fn renewal_rule(days: i64) -> NewWorkflowRule {
    NewWorkflowRule {
        name: "renewal follow-up".to_string(),
        description: None,
        trigger_type: "renewal_within_days".to_string(),
        trigger_conditions: json!({ "days": days }),
        action_config: ActionConfig {
            subject_template: "Renewal for {{account_name}}".to_string(),
            description_template: String::new(),
            priority: Default::default(),
            days_before_due: 0,
            assignee_strategy: Default::default(),
            assignee_user_id: None,
        },
        is_enabled: true,
        sort_order: 0,
    }
}

async fn seed_accounts(db: &Database, org: Uuid, count: usize) -> Vec<Uuid> {
    let today = Utc::now().date_naive();
    let store = AccountStore::new(db);
    let mut ids = Vec::new();
    for index in 0..count {
        let account = store
            .insert(
                org,
                NewAccount {
                    account_name: format!("account {}", index),
                    owner_id: None,
                    contact_first_name: None,
                    contact_last_name: None,
                    contact_email: None,
                    contact_phone: None,
                    renewal_date: Some(today + Duration::days(5 + index as i64)),
                    is_active: true,
                },
            )
            .await
            .unwrap();
        ids.push(account.id);
    }
    ids
}

#[tokio::test]
async fn concurrent_runs_never_double_create() {
    let (_dir, db, engine) = setup().await;
    let org = Uuid::new_v4();
    let account_ids = seed_accounts(&db, org, 2).await;
    let rule = RuleStore::new(&db)
        .create(org, None, renewal_rule(30))
        .await
        .unwrap();

    let engine = Arc::new(engine);
    let left = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .execute(org, rule.id, None, TriggerSource::Manual)
                .await
                .unwrap()
        })
    };
    let right = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .execute(org, rule.id, None, TriggerSource::Manual)
                .await
                .unwrap()
        })
    };
    let (left, right) = (left.await.unwrap(), right.await.unwrap());

    // Whatever the interleaving, each pair ends up with exactly one active
    // task, and the two runs together created each task exactly once.
    let tasks = TaskStore::new(&db);
    for account_id in &account_ids {
        assert_eq!(tasks.count_active_pair(rule.id, *account_id).await.unwrap(), 1);
    }
    assert_eq!(left.tasks_created + right.tasks_created, 2);
    assert!(matches!(
        left.status,
        ExecutionStatus::Success | ExecutionStatus::PartialFailure
    ));
    assert!(matches!(
        right.status,
        ExecutionStatus::Success | ExecutionStatus::PartialFailure
    ));
}

#[tokio::test]
async fn sequential_rerun_skips_every_match() {
    let (_dir, db, engine) = setup().await;
    let org = Uuid::new_v4();
    seed_accounts(&db, org, 3).await;
    let rule = RuleStore::new(&db)
        .create(org, None, renewal_rule(30))
        .await
        .unwrap();

    let first = engine
        .execute(org, rule.id, None, TriggerSource::Manual)
        .await
        .unwrap();
    let second = engine
        .execute(org, rule.id, None, TriggerSource::Manual)
        .await
        .unwrap();

    assert_eq!(first.tasks_created, 3);
    assert_eq!(second.tasks_created, 0);
    assert_eq!(second.records_skipped_duplicate, first.records_matched);
}

#[tokio::test]
async fn completing_a_task_allows_the_next_run_to_recreate_it() {
    // Duplicate detection reads live task state only; a task closed by a
    // user frees its account for the next run.
    let (_dir, db, engine) = setup().await;
    let org = Uuid::new_v4();
    let account_ids = seed_accounts(&db, org, 2).await;
    let rule = RuleStore::new(&db)
        .create(org, None, renewal_rule(30))
        .await
        .unwrap();

    engine
        .execute(org, rule.id, None, TriggerSource::Manual)
        .await
        .unwrap();

    let tasks = TaskStore::new(&db);
    let created = tasks.list_for_rule(rule.id).await.unwrap();
    let closed = created
        .iter()
        .find(|task| task.account_id == account_ids[0])
        .unwrap();
    assert!(tasks.complete(org, closed.id).await.unwrap());

    let rerun = engine
        .execute(org, rule.id, None, TriggerSource::Manual)
        .await
        .unwrap();
    assert_eq!(rerun.tasks_created, 1);
    assert_eq!(rerun.records_skipped_duplicate, 1);
    assert_eq!(
        tasks.count_active_pair(rule.id, account_ids[0]).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn two_rules_track_duplicates_independently() {
    let (_dir, db, engine) = setup().await;
    let org = Uuid::new_v4();
    seed_accounts(&db, org, 1).await;
    let rules = RuleStore::new(&db);
    let first = rules.create(org, None, renewal_rule(30)).await.unwrap();
    let mut other = renewal_rule(30);
    other.name = "second rule".to_string();
    let second = rules.create(org, None, other).await.unwrap();

    let first_summary = engine
        .execute(org, first.id, None, TriggerSource::Manual)
        .await
        .unwrap();
    let second_summary = engine
        .execute(org, second.id, None, TriggerSource::Manual)
        .await
        .unwrap();

    assert_eq!(first_summary.tasks_created, 1);
    assert_eq!(second_summary.tasks_created, 1);
    assert_eq!(second_summary.records_skipped_duplicate, 0);
}
