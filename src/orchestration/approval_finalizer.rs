//! # Approval Finalizer
//!
//! Records the approver of a morphology report and advances its workflow.
//!
//! ## Steps
//!
//! 1. Load the report. A report that already has an approver is left untouched.
//! 2. Persist `approved_by` and `approval_date`, then re-read the report and
//!    verify both fields were stored.
//! 3. When the report sits in the pending state, apply the approve action.
//! 4. On success, announce the approval and optionally send the report email.
//!
//! A failed transition suppresses the announcement and the email. What happens
//! to the already persisted approver fields is decided by
//! [`CompensationPolicy`]: they are either kept (a partial approval the caller
//! must surface) or cleared again.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::presenter::{AlertLevel, Presenter};
use super::types::{ApprovalOutcome, EmailDelivery, SessionContext};
use crate::client::{ClientError, DocumentStore, RemoteBackend, RemoteOperation, RemoteReply};
use crate::config::{ApprovalConfig, CompensationPolicy};
use crate::constants::{doctypes, messages};
use crate::error::{WorkflowError, WorkflowResult};
use crate::logging::log_error;
use crate::models::MorphologyReport;

pub struct ApprovalFinalizer {
    backend: Arc<dyn RemoteBackend>,
    store: Arc<dyn DocumentStore>,
    presenter: Arc<dyn Presenter>,
    config: ApprovalConfig,
}

impl ApprovalFinalizer {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        store: Arc<dyn DocumentStore>,
        presenter: Arc<dyn Presenter>,
        config: ApprovalConfig,
    ) -> Self {
        Self {
            backend,
            store,
            presenter,
            config,
        }
    }

    #[instrument(skip(self, session), fields(user = %session.user))]
    pub async fn approve(
        &self,
        report_id: &str,
        session: &SessionContext,
    ) -> WorkflowResult<ApprovalOutcome> {
        let report = self
            .store
            .get_report(report_id)
            .await
            .map_err(|e| WorkflowError::query("loading the morphology report", e))?;

        if report.is_approved() {
            info!(
                report = %report_id,
                approved_by = ?report.approved_by,
                "Report already approved, nothing to do"
            );
            return Ok(ApprovalOutcome::AlreadyApproved { report });
        }

        let stored = self.persist_approver(report, session).await?;

        if !stored.is_in_state(&self.config.pending_state) {
            info!(
                report = %report_id,
                workflow_state = ?stored.workflow_state,
                "Report not pending approval, skipping workflow transition"
            );
            return Ok(self.complete(stored, false).await);
        }

        let operation = RemoteOperation::apply_workflow(
            doctypes::RBC_MORPHOLOGY_ANALYSIS,
            report_id,
            &self.config.approve_action,
        );
        match self
            .backend
            .execute(&operation)
            .await
            .and_then(RemoteReply::into_workflow)
        {
            Ok(reply) => {
                let mut stored = stored;
                if reply.workflow_state.is_some() {
                    stored.workflow_state = reply.workflow_state;
                }
                Ok(self.complete(stored, true).await)
            }
            Err(e) => self.transition_failed(stored, e).await,
        }
    }

    /// Write the approver fields and confirm the stored document carries them
    async fn persist_approver(
        &self,
        report: MorphologyReport,
        session: &SessionContext,
    ) -> WorkflowResult<MorphologyReport> {
        let mut update = report;
        update.approved_by = Some(session.user.clone());
        update.approval_date = Some(session.today);

        if let Err(e) = self.store.save_report(&update).await {
            self.presenter.message(messages::APPROVAL_SAVE_FAILED);
            return Err(e.into());
        }

        let stored = self
            .store
            .get_report(&update.name)
            .await
            .map_err(|e| WorkflowError::query("verifying the approval", e))?;

        if stored.approved_by != update.approved_by || stored.approval_date != update.approval_date
        {
            self.presenter.message(messages::APPROVAL_SAVE_FAILED);
            return Err(WorkflowError::Verification {
                doctype: doctypes::RBC_MORPHOLOGY_ANALYSIS.to_string(),
                name: update.name,
                reason: format!(
                    "expected approver {:?} on {:?}, found {:?} on {:?}",
                    update.approved_by,
                    update.approval_date,
                    stored.approved_by,
                    stored.approval_date
                ),
            });
        }

        Ok(stored)
    }

    async fn complete(&self, report: MorphologyReport, transitioned: bool) -> ApprovalOutcome {
        info!(
            report = %report.name,
            approved_by = ?report.approved_by,
            transitioned = transitioned,
            "Report approved"
        );
        self.presenter.alert(messages::APPROVED, AlertLevel::Success);

        let email = if self.config.send_email_on_approval {
            Some(self.send_email(&report.name).await)
        } else {
            None
        };

        ApprovalOutcome::Approved {
            report,
            transitioned,
            email,
        }
    }

    async fn send_email(&self, report_id: &str) -> EmailDelivery {
        let operation = RemoteOperation::SendReportEmail {
            docname: report_id.to_string(),
        };
        match self
            .backend
            .execute(&operation)
            .await
            .and_then(RemoteReply::into_email)
        {
            Ok(reply) if reply.is_success() => {
                if let Some(message) = &reply.message {
                    self.presenter.message(message);
                }
                EmailDelivery::Sent {
                    message: reply.message,
                }
            }
            Ok(reply) => {
                let message = reply
                    .message
                    .unwrap_or_else(|| messages::EMAIL_FAILED.to_string());
                warn!(report = %report_id, error = %message, "Report email failed");
                self.presenter.message(&message);
                EmailDelivery::Failed { message }
            }
            Err(e) => {
                warn!(report = %report_id, error = %e, "Report email could not be requested");
                self.presenter.message(messages::EMAIL_FAILED);
                EmailDelivery::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn transition_failed(
        &self,
        report: MorphologyReport,
        error: ClientError,
    ) -> WorkflowResult<ApprovalOutcome> {
        let failure = WorkflowError::transition_failed(
            doctypes::RBC_MORPHOLOGY_ANALYSIS,
            &report.name,
            &self.config.approve_action,
            error.to_string(),
        );
        log_error(
            "approval_finalizer",
            "apply_workflow",
            &failure.to_string(),
            Some(&report.name),
        );
        self.presenter
            .alert(&failure.user_message(), AlertLevel::Warning);

        match self.config.compensation {
            CompensationPolicy::RetainFields => Ok(ApprovalOutcome::PartiallyApproved {
                report,
                transition_error: failure.to_string(),
            }),
            CompensationPolicy::Revert => {
                let mut reverted = report;
                reverted.approved_by = None;
                reverted.approval_date = None;
                let stored = self.store.save_report(&reverted).await?;
                warn!(report = %stored.name, "Cleared approver fields after failed transition");
                Ok(ApprovalOutcome::Reverted {
                    report: stored,
                    transition_error: failure.to_string(),
                })
            }
        }
    }
}
