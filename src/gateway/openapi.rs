//! OpenAPI / Swagger UI documentation.
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::{
    HealthResponse, LifecycleResponse, StatsResponse, TriggerResponse,
};
use crate::jobs::{
    JobRunRecord, JobStatsSnapshot, JobStatusSnapshot, RunOutcome, SchedulerStatsSnapshot,
    TriggerOutcome,
};
use crate::webhook::WebhookStatsSnapshot;

/// Admin bearer-token security scheme (issued by the platform's auth layer)
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Administrator bearer token: Bearer {token}",
                ))),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Faxina Background Jobs API",
        version = "1.0.0",
        description = "Operational surface of the booking platform's background job and payment reconciliation core.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        crate::gateway::handlers::jobs_status,
        crate::gateway::handlers::jobs_stats,
        crate::gateway::handlers::reconcile_now,
        crate::gateway::handlers::reconciliation_history,
        crate::gateway::handlers::scheduler_start,
        crate::gateway::handlers::scheduler_stop,
        crate::gateway::handlers::payment_webhook,
    ),
    components(
        schemas(
            HealthResponse,
            StatsResponse,
            TriggerResponse,
            LifecycleResponse,
            JobStatusSnapshot,
            JobStatsSnapshot,
            JobRunRecord,
            RunOutcome,
            SchedulerStatsSnapshot,
            TriggerOutcome,
            WebhookStatsSnapshot,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "System", description = "Health and service metadata"),
        (name = "Background Jobs", description = "Scheduler lifecycle, stats and history"),
        (name = "Webhooks", description = "Provider-signed payment events")
    )
)]
pub struct ApiDoc;
