//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;

use chrono::NaiveDate;
use hemoscan_core::config::HemoscanConfig;
use hemoscan_core::events::EventPublisher;
use hemoscan_core::models::{
    BloodSmearImage, CellDetectionImage, DocStatus, ExtractedCell, MorphologyReport,
    ValidationState,
};
use hemoscan_core::orchestration::{ActionInvoker, SessionContext};
use hemoscan_core::test_helpers::{test_config, InMemoryFramework, RecordingPresenter};

pub const SMEAR: &str = "BSI-0001";
pub const DETECTION: &str = "CDI-0100";
pub const REPORT: &str = "RBC-0100";

/// Framework, presenter and invoker wired together
pub struct Harness {
    pub framework: Arc<InMemoryFramework>,
    pub presenter: Arc<RecordingPresenter>,
    pub invoker: ActionInvoker,
}

impl Harness {
    pub fn new(framework: InMemoryFramework) -> Self {
        Self::with_config(framework, &test_config())
    }

    pub fn with_config(framework: InMemoryFramework, config: &HemoscanConfig) -> Self {
        let framework = Arc::new(framework);
        let presenter = Arc::new(RecordingPresenter::new());
        let invoker = ActionInvoker::new(
            framework.clone(),
            framework.clone(),
            presenter.clone(),
            config,
        );
        Self {
            framework,
            presenter,
            invoker,
        }
    }

    /// Route completion events through `publisher`
    pub fn with_event_publisher(self, publisher: EventPublisher) -> Self {
        Self {
            invoker: self.invoker.with_event_publisher(publisher),
            framework: self.framework,
            presenter: self.presenter,
        }
    }
}

/// Harness for queued classification whose jobs publish on completion
pub fn queued_harness(framework: InMemoryFramework, config: &HemoscanConfig) -> (Harness, EventPublisher) {
    let publisher = EventPublisher::default();
    let harness = Harness::with_config(framework.with_event_publisher(publisher.clone()), config)
        .with_event_publisher(publisher.clone());
    (harness, publisher)
}

pub fn session() -> SessionContext {
    SessionContext::new("pathologist@example.com", approval_day())
}

pub fn approval_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

pub fn submitted_smear(framework: &InMemoryFramework) {
    framework.insert_smear(BloodSmearImage::new(SMEAR, DocStatus::Submitted));
}

/// Submitted smear with a detection image and cells in the given states
pub fn smear_with_cells(framework: &InMemoryFramework, states: &[&str]) {
    submitted_smear(framework);
    framework.insert_detection(CellDetectionImage::new(DETECTION, SMEAR));
    for (index, state) in states.iter().enumerate() {
        let mut cell = ExtractedCell::new(format!("EC-{:04}", index + 100), DETECTION)
            .with_primary_classification("Circular")
            .with_validation(ValidationState::from(*state));
        cell.cell_number = Some(index as u32 + 1);
        framework.insert_cell(cell);
    }
}

/// Report awaiting approval in `state`
pub fn pending_report(framework: &InMemoryFramework, state: &str) -> MorphologyReport {
    let mut report = MorphologyReport::new(REPORT, DETECTION);
    report.workflow_state = Some(state.to_string());
    framework.insert_report(report.clone());
    report
}
