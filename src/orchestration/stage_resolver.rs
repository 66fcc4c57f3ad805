//! # Stage Resolver
//!
//! Loads the records around a blood smear image and decides which single
//! workflow action it offers.
//!
//! ## Lookup Order
//!
//! 1. The blood smear image itself; an unsubmitted document stops here.
//! 2. The related cell detection image.
//! 3. Every extracted cell of that detection image.
//! 4. The morphology report of that detection image.
//!
//! The decision itself is [`crate::state_machine::resolve`]; this component
//! only gathers the [`StageSnapshot`]. Any failed lookup aborts resolution
//! with [`WorkflowError::Query`] so no action is offered on partial data.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::DocumentStore;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{BloodSmearImage, CellDetectionImage, MorphologyReport};
use crate::state_machine::{approval_available, resolve, ActionKind, StageSnapshot};

/// Outcome of resolving a blood smear image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub action: ActionKind,
    pub blood_smear: BloodSmearImage,
    pub detection_image: Option<CellDetectionImage>,
    pub report: Option<MorphologyReport>,
    /// The report exists and has no approver yet
    pub approval_available: bool,
}

impl Resolution {
    /// Document the resolved action must be invoked on
    pub fn target(&self) -> Option<&str> {
        self.target_of(self.action)
    }

    /// Document `action` applies to within this resolution
    pub fn target_of(&self, action: ActionKind) -> Option<&str> {
        match action {
            ActionKind::None => None,
            ActionKind::Detect => Some(&self.blood_smear.name),
            ActionKind::Extract | ActionKind::Classify | ActionKind::GenerateReport => {
                self.detection_image.as_ref().map(|image| image.name.as_str())
            }
            ActionKind::Approve => self
                .report
                .as_ref()
                .filter(|_| self.approval_available)
                .map(|report| report.name.as_str()),
        }
    }

    /// The action to run next: the stage action, or Approve once every stage
    /// is done and the report still awaits its approver
    pub fn next_action(&self) -> ActionKind {
        if self.action.is_none() && self.approval_available {
            ActionKind::Approve
        } else {
            self.action
        }
    }

    /// Every action currently offered: the stage action, then Approve
    pub fn actions(&self) -> Vec<ActionKind> {
        let mut actions = Vec::with_capacity(2);
        if !self.action.is_none() {
            actions.push(self.action);
        }
        if self.approval_available {
            actions.push(ActionKind::Approve);
        }
        actions
    }
}

pub struct StageResolver {
    store: Arc<dyn DocumentStore>,
}

impl StageResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, blood_smear_id: &str) -> WorkflowResult<Resolution> {
        let blood_smear = self
            .store
            .get_blood_smear(blood_smear_id)
            .await
            .map_err(|e| WorkflowError::query("loading the blood smear image", e))?;

        let mut snapshot = StageSnapshot {
            submitted: blood_smear.is_submitted(),
            ..Default::default()
        };

        if !snapshot.submitted {
            debug!(blood_smear = %blood_smear_id, "Blood smear image not submitted");
            return Ok(Resolution {
                action: ActionKind::None,
                blood_smear,
                detection_image: None,
                report: None,
                approval_available: false,
            });
        }

        let detection_image = self
            .store
            .find_detection_image(blood_smear_id)
            .await
            .map_err(|e| WorkflowError::query("checking for a cell detection image", e))?;

        let mut report = None;
        if let Some(image) = &detection_image {
            snapshot.has_detection_image = true;

            let cells = self
                .store
                .list_extracted_cells(&image.name)
                .await
                .map_err(|e| WorkflowError::query("checking the extracted cells", e))?;
            snapshot.validation_states = cells
                .into_iter()
                .map(|cell| cell.validated_classification)
                .collect();

            report = self
                .store
                .find_report(&image.name)
                .await
                .map_err(|e| WorkflowError::query("checking for a morphology report", e))?;
            snapshot.has_report = report.is_some();
        }

        let action = resolve(&snapshot);
        let approval_available = report.as_ref().is_some_and(approval_available);

        debug!(
            blood_smear = %blood_smear_id,
            action = %action,
            cells = snapshot.child_count(),
            has_report = snapshot.has_report,
            approval_available = approval_available,
            "Resolved workflow stage"
        );

        Ok(Resolution {
            action,
            blood_smear,
            detection_image,
            report,
            approval_available,
        })
    }

    /// Whether the report view offers Approve
    pub async fn approval_for(&self, report_id: &str) -> WorkflowResult<bool> {
        let report = self
            .store
            .get_report(report_id)
            .await
            .map_err(|e| WorkflowError::query("loading the morphology report", e))?;
        Ok(approval_available(&report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocStatus, ExtractedCell, ValidationState};
    use crate::test_helpers::InMemoryFramework;

    fn resolver(framework: &Arc<InMemoryFramework>) -> StageResolver {
        StageResolver::new(framework.clone())
    }

    #[tokio::test]
    async fn test_draft_blood_smear_offers_nothing() {
        let framework = Arc::new(InMemoryFramework::new());
        framework.insert_smear(BloodSmearImage::new("BSI-0001", DocStatus::Draft));

        let resolution = resolver(&framework).resolve("BSI-0001").await.unwrap();
        assert_eq!(resolution.action, ActionKind::None);
        assert!(resolution.actions().is_empty());
        assert_eq!(resolution.target(), None);
        assert_eq!(resolution.next_action(), ActionKind::None);
    }

    #[tokio::test]
    async fn test_classify_targets_detection_image() {
        let framework = Arc::new(InMemoryFramework::new());
        framework.insert_smear(BloodSmearImage::new("BSI-0001", DocStatus::Submitted));
        framework.insert_detection(CellDetectionImage::new("CDI-0001", "BSI-0001"));
        framework.insert_cell(
            ExtractedCell::new("EC-0001", "CDI-0001")
                .with_validation(ValidationState::label("Circular")),
        );
        framework.insert_cell(ExtractedCell::new("EC-0002", "CDI-0001"));

        let resolution = resolver(&framework).resolve("BSI-0001").await.unwrap();
        assert_eq!(resolution.action, ActionKind::Classify);
        assert_eq!(resolution.target(), Some("CDI-0001"));
        assert_eq!(resolution.next_action(), ActionKind::Classify);
    }

    #[tokio::test]
    async fn test_unapproved_report_offers_approve() {
        let framework = Arc::new(InMemoryFramework::new());
        framework.insert_smear(BloodSmearImage::new("BSI-0001", DocStatus::Submitted));
        framework.insert_detection(CellDetectionImage::new("CDI-0001", "BSI-0001"));
        framework.insert_cell(
            ExtractedCell::new("EC-0001", "CDI-0001")
                .with_validation(ValidationState::label("Elongated")),
        );
        framework.insert_report(MorphologyReport::new("RBC-0001", "CDI-0001"));

        let resolution = resolver(&framework).resolve("BSI-0001").await.unwrap();
        assert_eq!(resolution.action, ActionKind::None);
        assert_eq!(resolution.actions(), vec![ActionKind::Approve]);
        assert_eq!(resolution.target_of(ActionKind::Approve), Some("RBC-0001"));
        assert_eq!(resolution.next_action(), ActionKind::Approve);
        assert_eq!(resolution.target_of(resolution.next_action()), Some("RBC-0001"));
        assert!(resolver(&framework).approval_for("RBC-0001").await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_a_query_error() {
        let framework = Arc::new(InMemoryFramework::new());
        let error = resolver(&framework).resolve("BSI-missing").await.unwrap_err();
        assert!(matches!(error, WorkflowError::Query { .. }));
        assert!(error.user_message().contains("Please try again"));
    }
}
