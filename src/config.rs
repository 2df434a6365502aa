use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_audit_log: bool,
    #[serde(default)]
    pub lock: LockConfig,
    /// PostgreSQL connection URL for the persistent stores
    #[serde(default)]
    pub postgres_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LockConfig {
    /// Upper bound on waiting for a contended per-user lock, in milliseconds
    pub acquire_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 5_000,
        }
    }
}

impl LockConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
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
    fn test_lock_config_default_timeout() {
        let lock = LockConfig::default();
        assert_eq!(lock.acquire_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_parse_with_defaults() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "txn-core.log"
use_json: false
rotation: "daily"
enable_audit_log: true
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.lock.acquire_timeout_ms, 5_000);
        assert!(config.postgres_url.is_none());
    }
}
