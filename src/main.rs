//! Faxina Core service entry point.
//!
//! Wiring order: config -> logging -> database -> cache -> settlement ->
//! jobs -> gateway. Every component is constructed once here and passed
//! down; nothing reaches for globals.

use std::sync::Arc;

use tracing::info;

use faxina_core::cache::CacheStore;
use faxina_core::cache::memory::MemoryBackend;
use faxina_core::config::AppConfig;
use faxina_core::db::Database;
use faxina_core::gateway::{self, state::AppState};
use faxina_core::jobs::JobScheduler;
use faxina_core::jobs::reminder::{LogReminderSink, ReminderJob};
use faxina_core::ledger::{LedgerAccessor, LedgerStore, PgLedgerStore};
use faxina_core::logging;
use faxina_core::provider::{HttpProviderClient, PaymentProviderClient};
use faxina_core::reconcile::ReconciliationEngine;
use faxina_core::settlement::Settler;
use faxina_core::webhook::WebhookProcessor;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env);
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }

    let _log_guard = logging::init_logging(&config);
    info!(env = %env, "Starting faxina-core");

    let postgres_url = config
        .postgres_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("postgres_url must be configured"))?;
    let db = Database::connect(&postgres_url).await?;
    db.health_check().await?;

    let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(db.pool().clone()));
    let ledger = LedgerAccessor::new(store.clone());
    let cache = Arc::new(CacheStore::new(
        Arc::new(MemoryBackend::new()),
        &config.cache,
    ));
    let settler = Settler::new(ledger, cache);

    let provider: Arc<dyn PaymentProviderClient> =
        Arc::new(HttpProviderClient::new(&config.provider)?);

    let mut scheduler = JobScheduler::new(config.jobs.history_limit);
    scheduler.register(Arc::new(ReconciliationEngine::new(
        settler.clone(),
        provider,
        &config.jobs.reconcile,
    )));
    scheduler.register(Arc::new(ReminderJob::new(
        store,
        Arc::new(LogReminderSink),
        &config.jobs.reminders,
    )));
    let scheduler = Arc::new(scheduler);

    if config.jobs.autostart {
        scheduler.start().await;
    } else {
        info!("Scheduler not auto-started; arm it via POST /api/v1/admin/background-jobs/start");
    }

    let webhooks = Arc::new(WebhookProcessor::new(
        settler,
        &config.provider,
        &config.jobs.webhook,
    ));

    let state = Arc::new(AppState::new(
        scheduler,
        webhooks,
        config.gateway.admin_token.clone(),
    ));

    gateway::serve(state, &config.gateway).await
}
