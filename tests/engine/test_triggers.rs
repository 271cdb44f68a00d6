use cadence::core::config::ExecutionConfig;
use cadence::core::engine::WorkflowEngine;
use cadence_backend::{AccountStore, Database, RuleStore, TaskStore};
use cadence_types::{ActionConfig, NewAccount, NewWorkflowRule, TriggerSource};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;
use std::collections::HashSet;
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
        name: format!("{}-day window", days),
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

async fn seed_account(
    db: &Database,
    org: Uuid,
    name: &str,
    renewal_date: Option<NaiveDate>,
    is_active: bool,
) -> Uuid {
    AccountStore::new(db)
        .insert(
            org,
            NewAccount {
                account_name: name.to_string(),
                owner_id: None,
                contact_first_name: None,
                contact_last_name: None,
                contact_email: None,
                contact_phone: None,
                renewal_date,
                is_active,
            },
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn window_includes_upper_bound_and_excludes_past_dates() {
    let (_dir, db, engine) = setup().await;
    let org = Uuid::new_v4();
    let today = Utc::now().date_naive();

    let on_today = seed_account(&db, org, "today", Some(today), true).await;
    let at_bound = seed_account(&db, org, "+30", Some(today + Duration::days(30)), true).await;
    let past_bound = seed_account(&db, org, "+31", Some(today + Duration::days(31)), true).await;
    let yesterday = seed_account(&db, org, "-1", Some(today - Duration::days(1)), true).await;

    let rule = RuleStore::new(&db)
        .create(org, None, renewal_rule(30))
        .await
        .unwrap();
    let summary = engine
        .execute(org, rule.id, None, TriggerSource::Manual)
        .await
        .unwrap();

    assert_eq!(summary.records_evaluated, 4);
    assert_eq!(summary.records_matched, 2);
    assert_eq!(summary.tasks_created, 2);

    let tasked: HashSet<Uuid> = TaskStore::new(&db)
        .list_for_rule(rule.id)
        .await
        .unwrap()
        .into_iter()
        .map(|task| task.account_id)
        .collect();
    assert!(tasked.contains(&on_today));
    assert!(tasked.contains(&at_bound));
    assert!(!tasked.contains(&past_bound));
    assert!(!tasked.contains(&yesterday));
}

#[tokio::test]
async fn inactive_and_dateless_accounts_are_not_even_evaluated() {
    let (_dir, db, engine) = setup().await;
    let org = Uuid::new_v4();
    let today = Utc::now().date_naive();

    seed_account(&db, org, "live", Some(today + Duration::days(3)), true).await;
    seed_account(&db, org, "inactive", Some(today + Duration::days(3)), false).await;
    seed_account(&db, org, "no date", None, true).await;

    let rule = RuleStore::new(&db)
        .create(org, None, renewal_rule(30))
        .await
        .unwrap();
    let summary = engine
        .execute(org, rule.id, None, TriggerSource::Manual)
        .await
        .unwrap();

    assert_eq!(summary.records_evaluated, 1);
    assert_eq!(summary.records_matched, 1);
}

#[tokio::test]
async fn zero_day_window_only_matches_today() {
    let (_dir, db, engine) = setup().await;
    let org = Uuid::new_v4();
    let today = Utc::now().date_naive();

    seed_account(&db, org, "today", Some(today), true).await;
    seed_account(&db, org, "tomorrow", Some(today + Duration::days(1)), true).await;

    let rule = RuleStore::new(&db)
        .create(org, None, renewal_rule(0))
        .await
        .unwrap();
    let summary = engine
        .execute(org, rule.id, None, TriggerSource::Manual)
        .await
        .unwrap();

    assert_eq!(summary.records_evaluated, 2);
    assert_eq!(summary.records_matched, 1);
}

#[tokio::test]
async fn accounts_from_other_organizations_never_match() {
    let (_dir, db, engine) = setup().await;
    let org = Uuid::new_v4();
    let other_org = Uuid::new_v4();
    let today = Utc::now().date_naive();

    seed_account(&db, other_org, "foreign", Some(today + Duration::days(3)), true).await;

    let rule = RuleStore::new(&db)
        .create(org, None, renewal_rule(30))
        .await
        .unwrap();
    let summary = engine
        .execute(org, rule.id, None, TriggerSource::Manual)
        .await
        .unwrap();

    assert_eq!(summary.records_evaluated, 0);
    assert_eq!(summary.records_matched, 0);
    assert_eq!(summary.tasks_created, 0);
}
