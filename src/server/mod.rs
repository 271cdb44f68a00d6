//! HTTP surface for the engine. Every endpoint requires a bearer token
//! (compared in constant time) and an `x-organization-id` header; the engine
//! itself trusts that tenant boundary on every query it issues.

use axum::{
    body::Body,
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, HeaderValue, Response, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::util::MapResponseLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use cadence_backend::{AccountStore, Database, RuleStore};
use cadence_types::{NewAccount, NewWorkflowRule, RuleUpdate, TriggerSource};

use crate::core::config::CadenceConfig;
use crate::core::engine::WorkflowEngine;
use crate::core::error::EngineError;
use crate::core::trigger;
use crate::core::types::ErrorCategory;

const ORGANIZATION_HEADER: &str = "x-organization-id";
const USER_HEADER: &str = "x-user-id";
const MAX_LOG_LIST_LIMIT: i64 = 200;
const RULE_DETAIL_LOG_LIMIT: i64 = 10;

struct ApiState {
    engine: WorkflowEngine,
    rules: RuleStore,
    accounts: AccountStore,
    auth_token: String,
    log_list_limit: i64,
}

/// Start the API listener and block until the service terminates.
pub async fn serve(config: CadenceConfig, db: Database) -> Result<(), EngineError> {
    serve_internal(config, db, None).await
}

/// Start the API listener and notify once the bind address is known
/// (test helper).
pub async fn serve_with_ready_notifier(
    config: CadenceConfig,
    db: Database,
    ready_notifier: oneshot::Sender<SocketAddr>,
) -> Result<(), EngineError> {
    serve_internal(config, db, Some(ready_notifier)).await
}

async fn serve_internal(
    config: CadenceConfig,
    db: Database,
    ready_notifier: Option<oneshot::Sender<SocketAddr>>,
) -> Result<(), EngineError> {
    let auth_token = config.auth_token()?;
    let bind_addr = config.bind_addr()?;
    let state = Arc::new(ApiState {
        engine: WorkflowEngine::new(&db, &config.execution),
        rules: RuleStore::new(&db),
        accounts: AccountStore::new(&db),
        auth_token,
        log_list_limit: config.server.log_list_limit,
    });

    let router = Router::new()
        .route("/healthz", get(health))
        .route("/workflow-rules", post(create_rule).get(list_rules))
        .route("/workflow-rules/execute-all", post(execute_all))
        .route(
            "/workflow-rules/{id}",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
        .route("/workflow-rules/{id}/execute", post(execute_rule))
        .route("/workflow-rules/{id}/logs", get(list_logs))
        .route("/accounts", post(create_account))
        .layer(Extension(state))
        .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
        .layer(MapResponseLayer::new(|mut response: Response<Body>| {
            if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
                let body = json!({
                    "error": {
                        "code": "CAD-API-413",
                        "message": "payload too large"
                    }
                })
                .to_string();
                *response.body_mut() = Body::from(body);
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            response
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(bind_addr).await.map_err(|err| {
        EngineError::new(
            ErrorCategory::IoError,
            format!("failed to bind API listener {}: {}", bind_addr, err),
        )
    })?;
    let local_addr = listener.local_addr().map_err(|err| {
        EngineError::new(
            ErrorCategory::IoError,
            format!("failed to determine API listener address: {}", err),
        )
    })?;
    if let Some(tx) = ready_notifier {
        let _ = tx.send(local_addr);
    }
    info!("cadence API listening on {}", local_addr);
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| {
            EngineError::new(
                ErrorCategory::InternalError,
                format!("API server terminated: {}", err),
            )
        })
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn create_rule(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<NewWorkflowRule>,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    let created_by = optional_user(&headers)?;
    // Reject broken triggers at the door instead of at execution time.
    trigger::parse_trigger(&body.trigger_type, &body.trigger_conditions)?;
    let rule = state
        .rules
        .create(organization_id, created_by, body)
        .await
        .map_err(EngineError::from)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn list_rules(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    let rules = state
        .rules
        .list(organization_id)
        .await
        .map_err(EngineError::from)?;
    Ok(Json(rules))
}

async fn get_rule(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    let rule = state
        .rules
        .get(organization_id, id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| ApiRejection::not_found("rule not found"))?;
    let logs = state
        .engine
        .list_logs(organization_id, id, RULE_DETAIL_LOG_LIMIT)
        .await?;
    Ok(Json(json!({"rule": rule, "logs": logs})))
}

async fn update_rule(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<RuleUpdate>,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    if body.is_empty() {
        return Err(ApiRejection::bad_request("no fields to update"));
    }
    let existing = state
        .rules
        .get(organization_id, id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| ApiRejection::not_found("rule not found"))?;
    // Validate the trigger as it would look after the update.
    let trigger_type = body
        .trigger_type
        .as_deref()
        .unwrap_or(&existing.trigger_type);
    let conditions = body
        .trigger_conditions
        .as_ref()
        .unwrap_or(&existing.trigger_conditions);
    trigger::parse_trigger(trigger_type, conditions)?;

    let updated = state
        .rules
        .update(organization_id, id, &body)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| ApiRejection::not_found("rule not found"))?;
    Ok(Json(updated))
}

async fn delete_rule(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    let deleted = state
        .rules
        .soft_delete(organization_id, id)
        .await
        .map_err(EngineError::from)?;
    if !deleted {
        return Err(ApiRejection::not_found("rule not found"));
    }
    Ok(Json(json!({"deleted": id})))
}

async fn execute_rule(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    let triggered_by = optional_user(&headers)?;
    let summary = state
        .engine
        .execute(organization_id, id, triggered_by, TriggerSource::Manual)
        .await?;
    Ok(Json(summary))
}

async fn execute_all(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    let triggered_by = optional_user(&headers)?;
    let summary = state
        .engine
        .execute_all(organization_id, triggered_by, TriggerSource::Manual)
        .await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<i64>,
}

async fn list_logs(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    let limit = query
        .limit
        .unwrap_or(state.log_list_limit)
        .clamp(1, MAX_LOG_LIST_LIMIT);
    let entries = state.engine.list_logs(organization_id, id, limit).await?;
    Ok(Json(entries))
}

async fn create_account(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<NewAccount>,
) -> Result<impl IntoResponse, ApiRejection> {
    authorize(&headers, &state)?;
    let organization_id = require_org(&headers)?;
    let account = state
        .accounts
        .insert(organization_id, body)
        .await
        .map_err(EngineError::from)?;
    Ok((StatusCode::CREATED, Json(account)))
}

fn authorize(headers: &HeaderMap, state: &ApiState) -> Result<(), ApiRejection> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    match provided {
        Some(token) if bool::from(token.as_bytes().ct_eq(state.auth_token.as_bytes())) => Ok(()),
        _ => Err(ApiRejection::unauthorized()),
    }
}

fn require_org(headers: &HeaderMap) -> Result<Uuid, ApiRejection> {
    let raw = headers
        .get(ORGANIZATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiRejection::bad_request("missing x-organization-id header"))?;
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiRejection::bad_request("invalid x-organization-id header"))
}

fn optional_user(headers: &HeaderMap) -> Result<Option<Uuid>, ApiRejection> {
    match headers.get(USER_HEADER) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| ApiRejection::bad_request("invalid x-user-id header"))?;
            Uuid::parse_str(raw.trim())
                .map(Some)
                .map_err(|_| ApiRejection::bad_request("invalid x-user-id header"))
        }
    }
}

struct ApiRejection {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiRejection {
    fn unauthorized() -> Self {
        ApiRejection {
            status: StatusCode::UNAUTHORIZED,
            code: "CAD-API-401".to_string(),
            message: "unauthorized".to_string(),
        }
    }

    fn bad_request(message: &str) -> Self {
        ApiRejection {
            status: StatusCode::BAD_REQUEST,
            code: "CAD-API-400".to_string(),
            message: message.to_string(),
        }
    }

    fn not_found(message: &str) -> Self {
        ApiRejection {
            status: StatusCode::NOT_FOUND,
            code: "CAD-API-404".to_string(),
            message: message.to_string(),
        }
    }
}

impl From<EngineError> for ApiRejection {
    fn from(err: EngineError) -> Self {
        let status = match err.category {
            ErrorCategory::RuleNotFound => StatusCode::NOT_FOUND,
            ErrorCategory::InvalidTriggerConfig | ErrorCategory::UnknownTriggerType => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", err);
        }
        ApiRejection {
            status,
            code: err.code,
            message: err.message,
        }
    }
}

impl IntoResponse for ApiRejection {
    fn into_response(self) -> Response<Body> {
        let mut resp = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message
            }
        }))
        .into_response();
        *resp.status_mut() = self.status;
        resp
    }
}
