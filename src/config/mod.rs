//! # HemoScan Configuration System
//!
//! Layered configuration: built-in defaults, then an optional TOML file (plus an
//! environment-specific overlay next to it), then `HEMOSCAN_*` environment
//! variables. Loading always ends with [`HemoscanConfig::validate`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hemoscan_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let base_url = &manager.config().backend.base_url;
//! let wait = manager.config().classification.wait_policy();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring hemoscan.toml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HemoscanConfig {
    /// Document framework connection
    pub backend: BackendConfig,

    /// Navigation and feedback timing
    pub workflow: WorkflowConfig,

    /// Classification dispatch and completion wait
    pub classification: ClassificationConfig,

    /// Approval transition and notification
    pub approval: ApprovalConfig,

    pub logging: LoggingConfig,
}

impl HemoscanConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "backend.base_url",
                &self.backend.base_url,
                "must not be empty",
            ));
        }
        if let Err(e) = url::Url::parse(&self.backend.base_url) {
            return Err(ConfigurationError::invalid_value(
                "backend.base_url",
                &self.backend.base_url,
                e.to_string(),
            ));
        }
        if self.backend.max_retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "backend.max_retries",
                "0",
                "at least one attempt is required",
            ));
        }
        if self.backend.api_key.is_some() != self.backend.api_secret.is_some() {
            return Err(ConfigurationError::invalid_value(
                "backend.api_key",
                "<redacted>",
                "api_key and api_secret must be set together",
            ));
        }
        if self.classification.max_concurrent_classifications == 0 {
            return Err(ConfigurationError::invalid_value(
                "classification.max_concurrent_classifications",
                "0",
                "must be at least 1",
            ));
        }
        if self.approval.pending_state.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "approval.pending_state",
                &self.approval.pending_state,
                "must not be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the framework site (e.g. "<http://localhost:8000>")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Attempts for idempotent reads; remote operations are sent once
    pub max_retries: u32,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
            max_retries: 3,
            api_key: None,
            api_secret: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Pause between the success message and navigation
    pub redirect_delay_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            redirect_delay_ms: 2_000,
        }
    }
}

impl WorkflowConfig {
    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

/// How the Classify action reaches the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// One `classify_image` call per extracted cell, completion by counting replies
    PerRecord,
    /// One background job, completion signalled on the push channel
    #[default]
    Queued,
}

/// How long to wait for a completion event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    Indefinite,
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub mode: ClassificationMode,
    /// Concurrent `classify_image` calls in per-record mode
    pub max_concurrent_classifications: usize,
    /// Completion wait in queued mode; 0 waits indefinitely
    pub wait_timeout_ms: u64,
    /// Workflow action applied to the detection image once classification completes
    pub completion_workflow_action: Option<String>,
    /// Poll interval of the store-backed completion watcher
    pub poll_interval_ms: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            mode: ClassificationMode::Queued,
            max_concurrent_classifications: 4,
            wait_timeout_ms: 600_000,
            completion_workflow_action: Some("Complete Classification".to_string()),
            poll_interval_ms: 5_000,
        }
    }
}

impl ClassificationConfig {
    pub fn wait_policy(&self) -> WaitPolicy {
        match self.wait_timeout_ms {
            0 => WaitPolicy::Indefinite,
            ms => WaitPolicy::Timeout(Duration::from_millis(ms)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// What happens to persisted approver fields when the approval transition fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationPolicy {
    /// Leave the fields in place and report a partial approval
    #[default]
    RetainFields,
    /// Clear the fields again with a compensating write
    Revert,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Workflow state in which approval also triggers a transition
    pub pending_state: String,
    /// Workflow action applied from `pending_state`
    pub approve_action: String,
    pub send_email_on_approval: bool,
    pub compensation: CompensationPolicy,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            pending_state: "Pending Approval".to_string(),
            approve_action: "Approve".to_string(),
            send_email_on_approval: true,
            compensation: CompensationPolicy::RetainFields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive; falls back to the environment default
    pub level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HemoscanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workflow.redirect_delay(), Duration::from_secs(2));
        assert_eq!(config.classification.mode, ClassificationMode::Queued);
        assert_eq!(
            config.classification.wait_policy(),
            WaitPolicy::Timeout(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_zero_timeout_waits_indefinitely() {
        let config = ClassificationConfig {
            wait_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.wait_policy(), WaitPolicy::Indefinite);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = HemoscanConfig::default();
        config.backend.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = HemoscanConfig::default();
        config.classification.max_concurrent_classifications = 0;
        assert!(config.validate().is_err());

        let mut config = HemoscanConfig::default();
        config.backend.api_key = Some("key".to_string());
        assert!(config.validate().is_err());
    }
}
