//! scalecheck.toml configuration parser.
//!
//! Every field has a default tuned for the stock scale-to-zero
//! scenario, so a config file is optional. The queue connection
//! credential is deliberately not part of the file: it is read from
//! the environment only, so it never lands in version control.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Environment variable holding the queue connection credential.
pub const CREDENTIAL_ENV: &str = "SERVICEBUS_CONNECTION_STRING";

/// Harness configuration, normally read from `scalecheck.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Scenario base name; all resource names derive from it.
    pub scenario: String,
    /// Container image for the target workload.
    pub workload_image: String,
    /// Messages injected to trigger scale-up.
    pub message_count: u32,
    /// Poll interval for replica-count assertions, in seconds.
    pub poll_interval_secs: u64,
    /// Deadline for each replica-count assertion, in seconds.
    pub max_wait_secs: u64,
    /// Scaler polling interval handed to the scaling policy, seconds.
    pub trigger_polling_interval_secs: u32,
    /// Scaler cooldown handed to the scaling policy, seconds.
    pub trigger_cooldown_secs: u32,
    /// Lower replica bound for the scaling policy.
    pub min_replicas: u32,
    /// Upper replica bound for the scaling policy.
    pub max_replicas: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scenario: "test-azure-service-bus-topic".to_string(),
            workload_image: "nginxinc/nginx-unprivileged".to_string(),
            message_count: 5,
            poll_interval_secs: 1,
            max_wait_secs: 60,
            trigger_polling_interval_secs: 5,
            trigger_cooldown_secs: 10,
            min_replicas: 0,
            max_replicas: 1,
        }
    }
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Load from the given path, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Read the queue connection credential from the environment.
    pub fn credential_from_env() -> ConfigResult<String> {
        std::env::var(CREDENTIAL_ENV)
            .map_err(|_| ConfigError::MissingCredential(CREDENTIAL_ENV.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_scale_to_zero_run() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.message_count, 5);
        assert_eq!(cfg.min_replicas, 0);
        assert_eq!(cfg.max_replicas, 1);
        assert_eq!(cfg.max_wait(), Duration::from_secs(60));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn parse_partial_file_keeps_defaults() {
        let toml_str = r#"
scenario = "my-run"
message_count = 12
"#;
        let cfg: HarnessConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.scenario, "my-run");
        assert_eq!(cfg.message_count, 12);
        assert_eq!(cfg.max_wait_secs, 60);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = HarnessConfig::load(Path::new("/nonexistent/scalecheck.toml")).unwrap();
        assert_eq!(cfg.scenario, "test-azure-service-bus-topic");
    }

    // One test for both the missing and the set case, since the
    // variable is process-global.
    #[test]
    fn credential_comes_only_from_the_environment() {
        unsafe { std::env::remove_var(CREDENTIAL_ENV) };
        assert!(matches!(
            HarnessConfig::credential_from_env(),
            Err(ConfigError::MissingCredential(_)),
        ));

        unsafe { std::env::set_var(CREDENTIAL_ENV, "Endpoint=sb://x;SharedAccessKey=y") };
        assert_eq!(
            HarnessConfig::credential_from_env().unwrap(),
            "Endpoint=sb://x;SharedAccessKey=y",
        );
        unsafe { std::env::remove_var(CREDENTIAL_ENV) };
    }
}
