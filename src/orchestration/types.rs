//! Shared orchestration types.

use chrono::{Local, NaiveDate};
use serde::Serialize;

use super::presenter::Route;
use crate::models::MorphologyReport;
use crate::state_machine::ActionKind;

/// Who is acting and on which day.
///
/// Passed explicitly so approvals never read ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub user: String,
    pub today: NaiveDate,
}

impl SessionContext {
    pub fn new(user: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user: user.into(),
            today,
        }
    }

    /// Session dated with the local calendar day
    pub fn today_for(user: impl Into<String>) -> Self {
        Self::new(user, Local::now().date_naive())
    }
}

/// Result of a successfully invoked action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub action: ActionKind,
    /// Document the action was invoked on
    pub document: String,
    /// Where the user was sent afterwards
    pub route: Option<Route>,
    pub detail: OutcomeDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeDetail {
    /// The remote operation succeeded and produced `document`, if it reported one
    Completed { document: Option<String> },
    /// Per-record classification finished; `failed` lists cells whose call failed
    Classified { total: usize, failed: Vec<String> },
    /// The server signalled that queued classification finished
    ClassificationCompleted {
        workflow_state: Option<String>,
        transition_error: Option<String>,
    },
    /// There was nothing to work on
    NothingToDo,
    Approval(ApprovalOutcome),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// Approver fields persisted and, when pending, the workflow advanced
    Approved {
        report: MorphologyReport,
        transitioned: bool,
        email: Option<EmailDelivery>,
    },
    /// The report already had an approver; nothing was written
    AlreadyApproved { report: MorphologyReport },
    /// Approver fields persisted but the workflow transition failed
    PartiallyApproved {
        report: MorphologyReport,
        transition_error: String,
    },
    /// The transition failed and the approver fields were cleared again
    Reverted {
        report: MorphologyReport,
        transition_error: String,
    },
}

impl ApprovalOutcome {
    pub fn report(&self) -> &MorphologyReport {
        match self {
            Self::Approved { report, .. }
            | Self::AlreadyApproved { report }
            | Self::PartiallyApproved { report, .. }
            | Self::Reverted { report, .. } => report,
        }
    }

    /// True only when the approval went through completely
    pub fn is_fully_approved(&self) -> bool {
        matches!(self, Self::Approved { .. } | Self::AlreadyApproved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "delivery", rename_all = "snake_case")]
pub enum EmailDelivery {
    Sent { message: Option<String> },
    Failed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_approval_is_not_full() {
        let outcome = ApprovalOutcome::PartiallyApproved {
            report: MorphologyReport::new("RBC-0001", "CDI-0001"),
            transition_error: "Not permitted".to_string(),
        };
        assert!(!outcome.is_fully_approved());
        assert_eq!(outcome.report().name, "RBC-0001");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ActionOutcome {
            action: ActionKind::Classify,
            document: "CDI-0001".to_string(),
            route: Some(Route::extracted_cells("CDI-0001")),
            detail: OutcomeDetail::Classified {
                total: 3,
                failed: vec!["EC-0002".to_string()],
            },
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["action"], "classify");
        assert_eq!(value["detail"]["kind"], "classified");
        assert_eq!(value["detail"]["failed"][0], "EC-0002");
    }
}
