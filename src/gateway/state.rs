use std::sync::Arc;

use crate::jobs::JobScheduler;
use crate::webhook::WebhookProcessor;

/// Gateway application state (shared).
///
/// Components are constructed once at startup and passed in; handlers
/// never reach for globals.
#[derive(Clone)]
pub struct AppState {
    /// Background job scheduler (reconciliation, reminders)
    pub scheduler: Arc<JobScheduler>,
    /// Provider webhook processor
    pub webhooks: Arc<WebhookProcessor>,
    /// Token the external auth layer issues to administrators
    pub admin_token: String,
}

impl AppState {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        webhooks: Arc<WebhookProcessor>,
        admin_token: String,
    ) -> Self {
        Self {
            scheduler,
            webhooks,
            admin_token,
        }
    }
}
