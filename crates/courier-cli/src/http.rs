//! HTTP surface: receipt ingress plus the producer API.
//!
//! Every `/api` route requires `Authorization: Bearer <key>`. In development
//! mode requests coming from localhost skip the check.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use courier_core::app::{CampaignRequest, CampaignSummary, Pipeline, PipelineStatus, ReceiptSubmission};
use courier_core::domain::customer::CustomerOperation;
use courier_core::domain::errors::{ErrorKind, PipelineError, StoreError};
use courier_core::domain::rule::Rule;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{error, instrument, warn};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub auth: Arc<AuthConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub allow_local_bypass: bool,
}

impl AuthConfig {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        if self.allow_local_bypass && is_local_request(headers) {
            return true;
        }
        let Some(expected) = self.api_key.as_deref() else {
            return false;
        };
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token.trim() == expected)
    }
}

/// Referer or Host pointing at localhost / 127.0.0.1.
fn is_local_request(headers: &HeaderMap) -> bool {
    [header::REFERER, header::HOST]
        .iter()
        .filter_map(|name| headers.get(name).and_then(|v| v.to_str().ok()))
        .any(|value| is_local_host(host_of(value)))
}

fn host_of(value: &str) -> &str {
    let rest = value.split_once("://").map_or(value, |(_, rest)| rest);
    let authority = rest.split('/').next().unwrap_or(rest);
    if let Some(v6) = authority.strip_prefix('[') {
        return v6.split(']').next().unwrap_or(v6);
    }
    authority.split(':').next().unwrap_or(authority)
}

fn is_local_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1"
}

pub enum ApiError {
    Unauthorized,
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Pipeline(err) => match err.kind() {
                ErrorKind::Validation => (StatusCode::BAD_REQUEST, err.to_string()),
                _ if matches!(err, PipelineError::Store(StoreError::Duplicate(_))) => {
                    (StatusCode::CONFLICT, err.to_string())
                }
                _ => {
                    error!(error = %err, "request failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/delivery-receipt", post(delivery_receipt))
        .route("/segments", post(submit_segment))
        .route("/segments/preview", post(preview_segment))
        .route("/campaigns", post(run_campaign))
        .route("/customers", post(submit_customer_operation))
        .route("/status", get(status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.auth.authorize(request.headers()) {
        next.run(request).await
    } else {
        warn!(path = %request.uri().path(), "rejected unauthenticated request");
        ApiError::Unauthorized.into_response()
    }
}

async fn health() -> &'static str {
    "OK"
}

#[instrument(skip_all)]
async fn delivery_receipt(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let submission = match body {
        Value::Array(items) => ReceiptSubmission::Batch(items),
        other => ReceiptSubmission::Single(other),
    };
    let queued = state.pipeline.ingress().submit(submission).await?;
    Ok(Json(json!({
        "message": format!("{queued} receipt(s) queued"),
        "queued": queued,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentBody {
    segment_id: String,
    message: String,
    rules: Vec<Rule>,
    #[serde(default)]
    campaign_id: Option<String>,
}

#[instrument(skip_all)]
async fn submit_segment(
    State(state): State<AppState>,
    Json(body): Json<SegmentBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let filter = state
        .pipeline
        .submit_segment(&body.segment_id, &body.message, &body.rules, body.campaign_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true, "filter": filter }))))
}

#[derive(Debug, Deserialize)]
struct PreviewBody {
    rules: Vec<Rule>,
}

#[instrument(skip_all)]
async fn preview_segment(
    State(state): State<AppState>,
    Json(body): Json<PreviewBody>,
) -> Result<Json<Value>, ApiError> {
    let count = state.pipeline.preview(&body.rules).await?;
    Ok(Json(json!({ "count": count.count, "degraded": count.degraded })))
}

#[instrument(skip_all)]
async fn run_campaign(
    State(state): State<AppState>,
    Json(request): Json<CampaignRequest>,
) -> Result<Json<CampaignSummary>, ApiError> {
    Ok(Json(state.pipeline.run_campaign(request).await?))
}

#[instrument(skip_all)]
async fn submit_customer_operation(
    State(state): State<AppState>,
    Json(op): Json<CustomerOperation>,
) -> Result<StatusCode, ApiError> {
    state.pipeline.submit_customer_operation(&op).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn status(State(state): State<AppState>) -> Result<Json<PipelineStatus>, ApiError> {
    Ok(Json(state.pipeline.status().await?))
}
