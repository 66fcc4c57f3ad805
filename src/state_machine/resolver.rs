//! Stage resolution policy.
//!
//! Pure functions over a [`StageSnapshot`]; the store-backed variant that
//! gathers the snapshot lives in [`crate::orchestration::stage_resolver`].

use serde::{Deserialize, Serialize};

use super::states::ActionKind;
use crate::models::{MorphologyReport, ValidationState};

/// Everything the resolver needs to know about a blood smear's lifecycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub submitted: bool,
    pub has_detection_image: bool,
    /// Validation state of every extracted cell of the detection image
    pub validation_states: Vec<ValidationState>,
    pub has_report: bool,
}

impl StageSnapshot {
    pub fn child_count(&self) -> usize {
        self.validation_states.len()
    }

    /// Scans every record; a trailing unset cell counts as much as a leading one
    pub fn has_unvalidated(&self) -> bool {
        self.validation_states.iter().any(ValidationState::is_unset)
    }
}

/// Select the next action for a snapshot.
///
/// Never returns [`ActionKind::Approve`]; approval is decided per report by
/// [`approval_available`].
pub fn resolve(snapshot: &StageSnapshot) -> ActionKind {
    if !snapshot.submitted {
        ActionKind::None
    } else if !snapshot.has_detection_image {
        ActionKind::Detect
    } else if snapshot.child_count() == 0 {
        ActionKind::Extract
    } else if snapshot.has_unvalidated() {
        ActionKind::Classify
    } else if !snapshot.has_report {
        ActionKind::GenerateReport
    } else {
        ActionKind::None
    }
}

/// Approve is offered while the report has no approver
pub fn approval_available(report: &MorphologyReport) -> bool {
    !report.is_approved()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(states: &[&str], has_report: bool) -> StageSnapshot {
        StageSnapshot {
            submitted: true,
            has_detection_image: true,
            validation_states: states.iter().map(|s| ValidationState::from(*s)).collect(),
            has_report,
        }
    }

    #[test]
    fn test_unsubmitted_document_has_no_action() {
        let snapshot = StageSnapshot::default();
        assert_eq!(resolve(&snapshot), ActionKind::None);
    }

    #[test]
    fn test_missing_detection_image_selects_detect() {
        let snapshot = StageSnapshot {
            submitted: true,
            ..Default::default()
        };
        assert_eq!(resolve(&snapshot), ActionKind::Detect);
    }

    #[test]
    fn test_zero_children_selects_extract() {
        assert_eq!(resolve(&snapshot(&[], false)), ActionKind::Extract);
    }

    #[test]
    fn test_unvalidated_child_selects_classify() {
        assert_eq!(resolve(&snapshot(&["Select"], false)), ActionKind::Classify);
        assert_eq!(
            resolve(&snapshot(&["Circular", ""], false)),
            ActionKind::Classify
        );
    }

    #[test]
    fn test_unvalidated_record_after_the_first_two_is_found() {
        let snapshot = snapshot(&["A", "B", "Select"], false);
        assert_eq!(resolve(&snapshot), ActionKind::Classify);
    }

    #[test]
    fn test_fully_validated_without_report_selects_generate_report() {
        assert_eq!(
            resolve(&snapshot(&["Circular", "Elongated", "Other"], false)),
            ActionKind::GenerateReport
        );
    }

    #[test]
    fn test_complete_stage_has_no_action() {
        assert_eq!(resolve(&snapshot(&["Circular"], true)), ActionKind::None);
    }

    #[test]
    fn test_approval_availability() {
        let mut report = MorphologyReport::new("RBC-0001", "CDI-0001");
        assert!(approval_available(&report));
        report.approved_by = Some("lab@example.com".to_string());
        assert!(!approval_available(&report));
    }
}
