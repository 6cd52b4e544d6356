use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the booking/payment ledger
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Token the external auth layer hands to authenticated administrators
    pub admin_token: String,
}

/// Cache TTLs per entity class.
///
/// Catalog-like data (services, staff, public reviews) changes rarely and
/// gets a long TTL; per-user data is cheap to recompute and gets a short one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    pub catalog_ttl_secs: u64,
    pub per_user_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            catalog_ttl_secs: 1800,
            per_user_ttl_secs: 300,
        }
    }
}

/// External payment provider endpoint and webhook verification settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub webhook_secret: String,
    pub request_timeout_secs: u64,
    /// Max clock skew accepted on signed webhook timestamps
    pub signature_tolerance_secs: i64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            api_key: String::new(),
            webhook_secret: String::new(),
            request_timeout_secs: 10,
            signature_tolerance_secs: 300,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobsConfig {
    /// Arm the scheduler at startup
    pub autostart: bool,
    /// Most-recent run records retained per job
    pub history_limit: usize,
    pub reconcile: ReconcileConfig,
    pub reminders: ReminderConfig,
    pub webhook: WebhookConfig,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            history_limit: 50,
            reconcile: ReconcileConfig::default(),
            reminders: ReminderConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconcileConfig {
    pub interval_secs: u64,
    /// Attempts younger than this are left for the provider to report first
    pub grace_secs: i64,
    /// Scan bound per run; the remainder is picked up on the next tick
    pub batch_limit: i64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            grace_secs: 120,
            batch_limit: 100,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReminderConfig {
    pub interval_secs: u64,
    /// Bookings starting within this window get a reminder
    pub lookahead_secs: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            lookahead_secs: 24 * 3600,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Overall per-event deadline
    pub deadline_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 20,
            max_attempts: 3,
            backoff_base_ms: 200,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cache = CacheConfig::default();
        assert!(cache.catalog_ttl_secs > cache.per_user_ttl_secs);

        let jobs = JobsConfig::default();
        assert!(jobs.history_limit > 0);
        assert!(jobs.reconcile.grace_secs > 0);
        assert!(jobs.webhook.max_attempts > 0);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "faxina.log"
use_json: false
rotation: "daily"
enable_tracing: true
gateway:
  host: "127.0.0.1"
  port: 8080
  admin_token: "dev-admin"
postgres_url: null
"#;
        let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.gateway.port, 8080);
        // Omitted sections fall back to defaults
        assert_eq!(cfg.jobs.reconcile.interval_secs, 60);
        assert_eq!(cfg.cache.per_user_ttl_secs, 300);
    }
}
