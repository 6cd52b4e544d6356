//! Admin gateway and webhook ingress.
//!
//! Administrative endpoints require an authenticated administrator
//! identity (the bearer token the platform's auth layer issues); the
//! webhook ingress is authenticated by provider signature instead.

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use openapi::ApiDoc;
use state::AppState;
use types::{ApiResponse, error_codes};

/// Axum middleware guarding the admin routes.
///
/// Stands in for the platform's auth collaborator: the token it issues
/// to administrators is checked against configuration here.
async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let bearer = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match bearer {
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(
                error_codes::MISSING_AUTH,
                "missing administrator token",
            )),
        )
            .into_response(),
        Some(token) if token != state.admin_token || state.admin_token.is_empty() => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(
                error_codes::AUTH_FAILED,
                "invalid administrator token",
            )),
        )
            .into_response(),
        Some(_) => next.run(request).await,
    }
}

/// Build the gateway router
pub fn build_router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/background-jobs/status", get(handlers::jobs_status))
        .route("/background-jobs/stats", get(handlers::jobs_stats))
        .route(
            "/background-jobs/reconcile-now",
            post(handlers::reconcile_now),
        )
        .route(
            "/background-jobs/reconciliation-history",
            get(handlers::reconciliation_history),
        )
        .route("/background-jobs/start", post(handlers::scheduler_start))
        .route("/background-jobs/stop", post(handlers::scheduler_stop))
        .route_layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/v1/health", get(handlers::health_check))
        .route("/api/v1/webhooks/payment", post(handlers::payment_webhook))
        .nest("/api/v1/admin", admin_routes)
        .with_state(state)
}

/// Bind and serve the gateway until the process exits
pub async fn serve(state: Arc<AppState>, config: &GatewayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API docs: http://{}/docs", addr);
    tracing::info!("Webhook ingress: POST /api/v1/webhooks/payment");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
