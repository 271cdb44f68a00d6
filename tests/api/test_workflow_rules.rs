use cadence::core::config::CadenceConfig;
use cadence_backend::Database;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::sync::oneshot;
use uuid::Uuid;

const TOKEN_ENV: &str = "CADENCE_API_TEST_TOKEN";
const TOKEN: &str = "integration-test-token";

async fn spawn_server() -> (TempDir, SocketAddr) {
    std::env::set_var(TOKEN_ENV, TOKEN);
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("api.db").display());
    let db = Database::connect(&url).await.unwrap();
    db.migrate().await.unwrap();

    let mut config = CadenceConfig::default();
    config.database.url = url;
    config.server.bind = "127.0.0.1:0".to_string();
    config.server.auth_token_env = TOKEN_ENV.to_string();

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = cadence::server::serve_with_ready_notifier(config, db, tx).await;
    });
    let addr = rx.await.expect("server should report its bind address");
    (dir, addr)
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn rule_body() -> Value {
    json!({
        "name": "30 day renewals",
        "triggerType": "renewal_within_days",
        "triggerConditions": { "days": 30 },
        "actionConfig": {
            "subject_template": "Renewal: {{account_name}}",
            "description_template": "Call {{contact_name}}"
        }
    })
}

fn account_body(name: &str, renewal_offset_days: i64) -> Value {
    let date = Utc::now().date_naive() + Duration::days(renewal_offset_days);
    json!({
        "accountName": name,
        "contactFirstName": "Ada",
        "contactLastName": "Lovelace",
        "renewalDate": date.to_string()
    })
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let (_dir, addr) = spawn_server().await;
    let resp = client()
        .get(format!("http://{}/healthz", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn requests_without_bearer_token_are_unauthorized() {
    let (_dir, addr) = spawn_server().await;
    let org = Uuid::new_v4();

    let resp = client()
        .get(format!("http://{}/workflow-rules", addr))
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client()
        .get(format!("http://{}/workflow-rules", addr))
        .bearer_auth("wrong-token")
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn missing_organization_header_is_a_bad_request() {
    let (_dir, addr) = spawn_server().await;
    let resp = client()
        .get(format!("http://{}/workflow-rules", addr))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("x-organization-id"));
}

#[tokio::test]
async fn creating_a_rule_with_a_broken_trigger_is_rejected() {
    let (_dir, addr) = spawn_server().await;
    let org = Uuid::new_v4();

    let mut body = rule_body();
    body["triggerConditions"] = json!({});
    let resp = client()
        .post(format!("http://{}/workflow-rules", addr))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let mut body = rule_body();
    body["triggerType"] = json!("contract_signed");
    let resp = client()
        .post(format!("http://{}/workflow-rules", addr))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn executing_an_unknown_rule_is_not_found() {
    let (_dir, addr) = spawn_server().await;
    let org = Uuid::new_v4();
    let resp = client()
        .post(format!(
            "http://{}/workflow-rules/{}/execute",
            addr,
            Uuid::new_v4()
        ))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn full_rule_lifecycle_over_http() {
    let (_dir, addr) = spawn_server().await;
    let org = Uuid::new_v4();
    let base = format!("http://{}", addr);

    // Seed two accounts, one inside and one outside the window.
    for (name, offset) in [("near", 10), ("far", 60)] {
        let resp = client()
            .post(format!("{}/accounts", base))
            .bearer_auth(TOKEN)
            .header("x-organization-id", org.to_string())
            .json(&account_body(name, offset))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    // Create the rule.
    let resp = client()
        .post(format!("{}/workflow-rules", base))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .json(&rule_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let rule: Value = resp.json().await.unwrap();
    let rule_id = rule["id"].as_str().unwrap().to_string();
    assert_eq!(rule["triggerType"], "renewal_within_days");

    // Listing shows it.
    let resp = client()
        .get(format!("{}/workflow-rules", base))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap();
    let listed: Value = resp.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Execute twice: the second run must be a no-op.
    let first: Value = client()
        .post(format!("{}/workflow-rules/{}/execute", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["status"], "success");
    assert_eq!(first["recordsEvaluated"], 2);
    assert_eq!(first["recordsMatched"], 1);
    assert_eq!(first["tasksCreated"], 1);

    let second: Value = client()
        .post(format!("{}/workflow-rules/{}/execute", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["tasksCreated"], 0);
    assert_eq!(second["recordsSkippedDuplicate"], 1);

    // Logs: most recent first, one entry per run.
    let logs: Value = client()
        .get(format!("{}/workflow-rules/{}/logs?limit=5", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = logs.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["tasksCreated"], 0);
    assert_eq!(entries[1]["tasksCreated"], 1);

    // Rule detail embeds recent history.
    let detail: Value = client()
        .get(format!("{}/workflow-rules/{}", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["rule"]["name"], "30 day renewals");
    assert_eq!(detail["logs"].as_array().unwrap().len(), 2);

    // Partial update.
    let resp = client()
        .put(format!("{}/workflow-rules/{}", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .json(&json!({"name": "renamed", "isEnabled": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["name"], "renamed");
    assert_eq!(updated["isEnabled"], false);

    // Delete, then confirm the rule is gone while its logs remain readable.
    let resp = client()
        .delete(format!("{}/workflow-rules/{}", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client()
        .get(format!("{}/workflow-rules/{}", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client()
        .get(format!("{}/workflow-rules/{}/logs", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let surviving: Value = resp.json().await.unwrap();
    assert_eq!(surviving.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn organizations_cannot_see_each_other() {
    let (_dir, addr) = spawn_server().await;
    let base = format!("http://{}", addr);
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();

    let resp = client()
        .post(format!("{}/workflow-rules", base))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org_a.to_string())
        .json(&rule_body())
        .send()
        .await
        .unwrap();
    let rule: Value = resp.json().await.unwrap();
    let rule_id = rule["id"].as_str().unwrap();

    let resp = client()
        .get(format!("{}/workflow-rules/{}", base, rule_id))
        .bearer_auth(TOKEN)
        .header("x-organization-id", org_b.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
