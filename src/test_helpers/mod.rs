// Test Helpers Module - Workflow Testing Infrastructure
//
// In-memory stand-ins for the document framework and the UI so the resolver,
// invoker and finalizer can be exercised without a running server.

pub mod in_memory_framework;
pub mod recording_presenter;

pub use in_memory_framework::{InMemoryFramework, SimulatedFailure, REPORT_INITIAL_STATE};
pub use recording_presenter::{PresenterEvent, RecordingPresenter};

use crate::config::HemoscanConfig;

/// Configuration for tests: no redirect delay, short classification wait
pub fn test_config() -> HemoscanConfig {
    let mut config = HemoscanConfig::default();
    config.workflow.redirect_delay_ms = 0;
    config.classification.wait_timeout_ms = 1_000;
    config.classification.poll_interval_ms = 10;
    config
}
