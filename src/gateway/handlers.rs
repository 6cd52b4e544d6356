//! Admin background-job handlers and the provider webhook ingress.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::AppState;
use super::types::{ApiResponse, error_codes};
use crate::jobs::{
    JobError, JobRunRecord, JobStatusSnapshot, SchedulerStatsSnapshot, TriggerOutcome,
};
use crate::reconcile;
use crate::webhook::{WebhookOutcome, WebhookStatsSnapshot};

/// Header carrying the provider's HMAC signature over the raw body
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Health check response data
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_u64)]
    pub timestamp_ms: u64,
    /// Crate version and git build hash
    #[schema(example = "0.1.0 (abc1234)")]
    pub build: String,
}

/// Combined background-processing stats
#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub scheduler: SchedulerStatsSnapshot,
    pub webhooks: WebhookStatsSnapshot,
}

#[derive(Serialize, ToSchema)]
pub struct TriggerResponse {
    pub outcome: TriggerOutcome,
}

#[derive(Serialize, ToSchema)]
pub struct LifecycleResponse {
    /// Whether this call changed the scheduler state
    pub changed: bool,
    pub armed: bool,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse)
    ),
    tag = "System"
)]
pub async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    Json(ApiResponse::success(HealthResponse {
        timestamp_ms: now_ms,
        build: format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH")),
    }))
}

/// Per-job armed/running state
#[utoipa::path(
    get,
    path = "/api/v1/admin/background-jobs/status",
    responses(
        (status = 200, description = "Per-job status", body = Vec<JobStatusSnapshot>),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "Background Jobs"
)]
pub async fn jobs_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<JobStatusSnapshot>>> {
    Json(ApiResponse::success(state.scheduler.jobs_status()))
}

/// Aggregate run counters across retained history, plus webhook counters.
///
/// Always answers, regardless of underlying job health: a failing
/// reconciliation job is visible here, not hidden.
#[utoipa::path(
    get,
    path = "/api/v1/admin/background-jobs/stats",
    responses(
        (status = 200, description = "Aggregate stats", body = StatsResponse),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "Background Jobs"
)]
pub async fn jobs_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsResponse>> {
    Json(ApiResponse::success(StatsResponse {
        scheduler: state.scheduler.stats(),
        webhooks: state.webhooks.stats(),
    }))
}

/// Trigger a reconciliation run immediately, outside the regular cadence
#[utoipa::path(
    post,
    path = "/api/v1/admin/background-jobs/reconcile-now",
    responses(
        (status = 202, description = "Run started", body = TriggerResponse),
        (status = 409, description = "A run is already in progress", body = TriggerResponse),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "Background Jobs"
)]
pub async fn reconcile_now(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ApiResponse<TriggerResponse>>), (StatusCode, Json<ApiResponse<()>>)>
{
    match state.scheduler.trigger_now(reconcile::JOB_NAME) {
        Ok(TriggerOutcome::Triggered) => Ok((
            StatusCode::ACCEPTED,
            Json(ApiResponse::success(TriggerResponse {
                outcome: TriggerOutcome::Triggered,
            })),
        )),
        Ok(TriggerOutcome::Busy) => Ok((
            StatusCode::CONFLICT,
            Json(ApiResponse {
                code: error_codes::JOB_BUSY,
                msg: "a run is already in progress".to_string(),
                data: Some(TriggerResponse {
                    outcome: TriggerOutcome::Busy,
                }),
            }),
        )),
        Err(JobError::UnknownJob(name)) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                error_codes::JOB_NOT_FOUND,
                format!("unknown job: {}", name),
            )),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(
                error_codes::INTERNAL_ERROR,
                e.to_string(),
            )),
        )),
    }
}

/// Recent run records for the reconciliation job, newest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/background-jobs/reconciliation-history",
    responses(
        (status = 200, description = "Retained run records", body = Vec<JobRunRecord>),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "Background Jobs"
)]
pub async fn reconciliation_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<JobRunRecord>>>, (StatusCode, Json<ApiResponse<()>>)> {
    match state.scheduler.history(reconcile::JOB_NAME) {
        Ok(records) => Ok(Json(ApiResponse::success(records))),
        Err(e) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                error_codes::JOB_NOT_FOUND,
                e.to_string(),
            )),
        )),
    }
}

/// Arm the periodic timers
#[utoipa::path(
    post,
    path = "/api/v1/admin/background-jobs/start",
    responses(
        (status = 200, description = "Scheduler state", body = LifecycleResponse),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "Background Jobs"
)]
pub async fn scheduler_start(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<LifecycleResponse>> {
    let changed = state.scheduler.start().await;
    Json(ApiResponse::success(LifecycleResponse {
        changed,
        armed: state.scheduler.is_armed(),
    }))
}

/// Disarm the timers; an in-progress run completes first
#[utoipa::path(
    post,
    path = "/api/v1/admin/background-jobs/stop",
    responses(
        (status = 200, description = "Scheduler state", body = LifecycleResponse),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "Background Jobs"
)]
pub async fn scheduler_stop(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<LifecycleResponse>> {
    let changed = state.scheduler.stop().await;
    Json(ApiResponse::success(LifecycleResponse {
        changed,
        armed: state.scheduler.is_armed(),
    }))
}

/// Provider webhook ingress.
///
/// Authenticated by the provider signature over the raw body, not by the
/// admin token. A 5xx answer tells the provider to redeliver.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment",
    request_body = String,
    responses(
        (status = 200, description = "Event applied (or duplicate)"),
        (status = 400, description = "Unverifiable or malformed event"),
        (status = 500, description = "Transient processing failure; provider should redeliver")
    ),
    tag = "Webhooks"
)]
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.webhooks.process(&body, signature).await {
        WebhookOutcome::Applied => (
            StatusCode::OK,
            Json(ApiResponse {
                code: error_codes::SUCCESS,
                msg: "ok".to_string(),
                data: None,
            }),
        ),
        WebhookOutcome::Rejected(reason) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(error_codes::WEBHOOK_REJECTED, reason)),
        ),
        WebhookOutcome::ProcessingFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(
                error_codes::WEBHOOK_FAILED,
                "processing failed, please redeliver",
            )),
        ),
    }
}
