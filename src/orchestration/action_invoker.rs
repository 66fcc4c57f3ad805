//! # Action Invoker
//!
//! Runs the action a [`super::stage_resolver::Resolution`] offers: shows
//! progress, triggers the remote operation, tracks completion and sends the
//! user to the resulting view.
//!
//! ## Classification
//!
//! Two completion strategies, selected by [`ClassificationMode`]:
//!
//! - **PerRecord**: one `classify_image` call per extracted cell, issued
//!   concurrently. Every reply, successful or not, counts towards completion;
//!   the final reply and only the final reply finishes the action.
//! - **Queued**: one background job. The invoker subscribes to the event
//!   publisher before enqueueing, then waits for the `classification_complete`
//!   event of this detection image under the configured [`WaitPolicy`].
//!
//! Remote operations are never retried. A failure leaves the documents as they
//! were and tells the user, who re-triggers the action.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::approval_finalizer::ApprovalFinalizer;
use super::presenter::{AlertLevel, Presenter, Progress, Route};
use super::types::{ActionOutcome, OutcomeDetail, SessionContext};
use crate::client::{ClientError, DocumentStore, RemoteBackend, RemoteOperation, RemoteReply};
use crate::config::{
    ClassificationConfig, ClassificationMode, HemoscanConfig, WaitPolicy, WorkflowConfig,
};
use crate::constants::{doctypes, events, fields, messages};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{EventPublisher, PublishedEvent};
use crate::logging::{log_error, log_workflow_operation};
use crate::state_machine::ActionKind;

pub struct ActionInvoker {
    backend: Arc<dyn RemoteBackend>,
    store: Arc<dyn DocumentStore>,
    presenter: Arc<dyn Presenter>,
    event_publisher: EventPublisher,
    workflow: WorkflowConfig,
    classification: ClassificationConfig,
    finalizer: ApprovalFinalizer,
}

impl ActionInvoker {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        store: Arc<dyn DocumentStore>,
        presenter: Arc<dyn Presenter>,
        config: &HemoscanConfig,
    ) -> Self {
        let finalizer = ApprovalFinalizer::new(
            backend.clone(),
            store.clone(),
            presenter.clone(),
            config.approval.clone(),
        );
        Self {
            backend,
            store,
            presenter,
            event_publisher: EventPublisher::default(),
            workflow: config.workflow.clone(),
            classification: config.classification.clone(),
            finalizer,
        }
    }

    /// Use a shared publisher, e.g. one fed by a realtime connection or a
    /// [`crate::events::ClassificationWatcher`]
    pub fn with_event_publisher(mut self, event_publisher: EventPublisher) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    pub fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    /// Invoke `action` on `document_id`.
    ///
    /// `document_id` is the action's target: the blood smear for Detect, the
    /// detection image for Extract, Classify and GenerateReport, the report for
    /// Approve.
    #[instrument(skip(self, session))]
    pub async fn invoke(
        &self,
        action: ActionKind,
        document_id: &str,
        session: &SessionContext,
    ) -> WorkflowResult<ActionOutcome> {
        let invocation_id = Uuid::new_v4().to_string();
        let action_name = action.to_string();
        log_workflow_operation(
            &action_name,
            document_id,
            Some(&invocation_id),
            "started",
            None,
        );

        let result = match action {
            ActionKind::None => Err(WorkflowError::NoActionAvailable {
                document: document_id.to_string(),
            }),
            ActionKind::Detect => self.detect(document_id).await,
            ActionKind::Extract => self.extract(document_id).await,
            ActionKind::Classify => match self.classification.mode {
                ClassificationMode::PerRecord => self.classify_each(document_id).await,
                ClassificationMode::Queued => self.classify_queued(document_id).await,
            },
            ActionKind::GenerateReport => self.generate_report(document_id).await,
            ActionKind::Approve => self
                .finalizer
                .approve(document_id, session)
                .await
                .map(|outcome| ActionOutcome {
                    action,
                    document: document_id.to_string(),
                    route: None,
                    detail: OutcomeDetail::Approval(outcome),
                }),
        };

        match &result {
            Ok(outcome) => log_workflow_operation(
                &action_name,
                document_id,
                Some(&invocation_id),
                "completed",
                outcome.route.as_ref().map(ToString::to_string).as_deref(),
            ),
            Err(e) => log_error(
                "action_invoker",
                &action_name,
                &e.to_string(),
                Some(document_id),
            ),
        }

        result
    }

    async fn detect(&self, blood_smear_id: &str) -> WorkflowResult<ActionOutcome> {
        self.presenter
            .show_progress(messages::DETECTING, Progress::Indeterminate);

        let operation = RemoteOperation::DetectCells {
            blood_smear_id: blood_smear_id.to_string(),
        };
        let reply = self
            .execute(&operation, messages::DETECTION_FAILED, RemoteReply::into_detection)
            .await?;

        let detection_image = match reply.cell_detection_image {
            Some(id) if reply.status.is_success() => id,
            _ => {
                return Err(self.fail(
                    &operation,
                    messages::DETECTION_FAILED,
                    reply.status.message,
                ))
            }
        };

        self.presenter.hide_progress();
        self.presenter.message(messages::DETECTED);
        let route = self
            .redirect(Route::form(doctypes::CELL_DETECTION_IMAGE, &detection_image))
            .await;

        Ok(ActionOutcome {
            action: ActionKind::Detect,
            document: blood_smear_id.to_string(),
            route: Some(route),
            detail: OutcomeDetail::Completed {
                document: Some(detection_image),
            },
        })
    }

    async fn extract(&self, cell_detection_image_id: &str) -> WorkflowResult<ActionOutcome> {
        self.presenter
            .show_progress(messages::EXTRACTING, Progress::Indeterminate);

        let operation = RemoteOperation::ExtractCells {
            cell_detection_image_id: cell_detection_image_id.to_string(),
        };
        let reply = self
            .execute(&operation, messages::EXTRACTION_FAILED, RemoteReply::into_extraction)
            .await?;
        if !reply.is_success() {
            return Err(self.fail(&operation, messages::EXTRACTION_FAILED, reply.message));
        }

        self.presenter.hide_progress();
        self.presenter.message(messages::EXTRACTED);
        let route = self
            .redirect(Route::extracted_cells(cell_detection_image_id))
            .await;

        Ok(ActionOutcome {
            action: ActionKind::Extract,
            document: cell_detection_image_id.to_string(),
            route: Some(route),
            detail: OutcomeDetail::Completed { document: None },
        })
    }

    /// Classify every extracted cell with its own remote call
    async fn classify_each(&self, cell_detection_image_id: &str) -> WorkflowResult<ActionOutcome> {
        let cells = self
            .store
            .list_extracted_cells(cell_detection_image_id)
            .await
            .map_err(|e| WorkflowError::query("listing the extracted cells", e))?;

        if cells.is_empty() {
            self.presenter.message(messages::NO_CELLS_TO_CLASSIFY);
            return Ok(ActionOutcome {
                action: ActionKind::Classify,
                document: cell_detection_image_id.to_string(),
                route: None,
                detail: OutcomeDetail::NothingToDo,
            });
        }

        let total = cells.len();
        self.presenter.show_progress(
            messages::CLASSIFYING,
            Progress::Determinate {
                completed: 0,
                total,
            },
        );

        let backend = &self.backend;
        let mut replies = stream::iter(cells.into_iter().map(|cell| async move {
            let operation = RemoteOperation::ClassifyImage {
                extracted_cell_id: cell.name,
            };
            let result = backend
                .execute(&operation)
                .await
                .and_then(RemoteReply::into_classification);
            (operation, result)
        }))
        .buffer_unordered(self.classification.max_concurrent_classifications.max(1));

        let mut completed = 0;
        let mut failed = Vec::new();
        while let Some((operation, result)) = replies.next().await {
            completed += 1;
            let cell = operation.document();
            match result {
                Ok(reply) if reply.status.is_success() || reply.status.status.is_none() => {
                    debug!(
                        cell = %cell,
                        label = ?reply.validated_classification,
                        "Cell classified"
                    );
                }
                Ok(reply) => {
                    warn!(cell = %cell, error = %reply.status.detail(), "Cell classification failed");
                    failed.push(cell.to_string());
                }
                Err(e) => {
                    warn!(cell = %cell, error = %e, "Cell classification request failed");
                    failed.push(cell.to_string());
                }
            }

            self.presenter.show_progress(
                messages::CLASSIFYING,
                Progress::Determinate { completed, total },
            );
            if completed == total {
                self.presenter.hide_progress();
                self.presenter.message(messages::ALL_CLASSIFIED);
            }
        }

        if !failed.is_empty() {
            self.presenter.alert(
                &format!("{} of {total} cells could not be classified.", failed.len()),
                AlertLevel::Warning,
            );
        }

        let route = self
            .redirect(Route::extracted_cells(cell_detection_image_id))
            .await;

        Ok(ActionOutcome {
            action: ActionKind::Classify,
            document: cell_detection_image_id.to_string(),
            route: Some(route),
            detail: OutcomeDetail::Classified { total, failed },
        })
    }

    /// Enqueue one classification job and wait for its completion event
    async fn classify_queued(&self, cell_detection_image_id: &str) -> WorkflowResult<ActionOutcome> {
        // Subscribe first so a fast job cannot complete unseen
        let mut completions = self.event_publisher.subscribe();

        self.presenter
            .show_progress(messages::CLASSIFYING, Progress::Indeterminate);

        let operation = RemoteOperation::EnqueueClassification {
            cell_detection_image_id: cell_detection_image_id.to_string(),
        };
        let reply = self
            .execute(&operation, messages::CLASSIFICATION_FAILED, RemoteReply::into_enqueue)
            .await?;
        if !reply.is_queued() {
            return Err(self.fail(&operation, messages::CLASSIFICATION_FAILED, reply.message));
        }
        self.presenter
            .alert(messages::CLASSIFICATION_QUEUED, AlertLevel::Info);

        let started = Instant::now();
        let waiting = wait_for_completion(&mut completions, cell_detection_image_id);
        let waited = match self.classification.wait_policy() {
            WaitPolicy::Indefinite => waiting.await,
            WaitPolicy::Timeout(limit) => match tokio::time::timeout(limit, waiting).await {
                Ok(result) => result,
                Err(_) => Err(WorkflowError::Timeout {
                    event: events::CLASSIFICATION_COMPLETE,
                    waited_ms: started.elapsed().as_millis() as u64,
                }),
            },
        };
        if let Err(e) = waited {
            self.presenter.hide_progress();
            self.presenter.message(&e.user_message());
            return Err(e);
        }

        info!(
            cell_detection_image = %cell_detection_image_id,
            waited_ms = started.elapsed().as_millis() as u64,
            "Classification completed"
        );

        let (workflow_state, transition_error) =
            self.complete_classification(cell_detection_image_id).await;

        self.presenter.hide_progress();
        self.presenter.message(messages::ALL_CLASSIFIED);
        let route = self
            .redirect(Route::extracted_cells(cell_detection_image_id))
            .await;

        Ok(ActionOutcome {
            action: ActionKind::Classify,
            document: cell_detection_image_id.to_string(),
            route: Some(route),
            detail: OutcomeDetail::ClassificationCompleted {
                workflow_state,
                transition_error,
            },
        })
    }

    /// Apply the configured completion action to the detection image.
    ///
    /// A rejected transition is shown to the user but does not stop the
    /// redirect; classification itself already finished.
    async fn complete_classification(
        &self,
        cell_detection_image_id: &str,
    ) -> (Option<String>, Option<String>) {
        let Some(action) = &self.classification.completion_workflow_action else {
            return (None, None);
        };

        let operation = RemoteOperation::apply_workflow(
            doctypes::CELL_DETECTION_IMAGE,
            cell_detection_image_id,
            action,
        );
        match self
            .backend
            .execute(&operation)
            .await
            .and_then(RemoteReply::into_workflow)
        {
            Ok(reply) => (reply.workflow_state, None),
            Err(e) => {
                let failure = WorkflowError::transition_failed(
                    doctypes::CELL_DETECTION_IMAGE,
                    cell_detection_image_id,
                    action,
                    e.to_string(),
                );
                warn!(error = %failure, "Completion workflow action failed");
                self.presenter
                    .alert(&failure.user_message(), AlertLevel::Warning);
                (None, Some(failure.to_string()))
            }
        }
    }

    async fn generate_report(&self, cell_detection_image_id: &str) -> WorkflowResult<ActionOutcome> {
        self.presenter
            .show_progress(messages::GENERATING_REPORT, Progress::Indeterminate);

        let operation = RemoteOperation::CreateMorphologyReport {
            cell_detection_image_id: cell_detection_image_id.to_string(),
        };
        let reply = self
            .execute(&operation, messages::REPORT_FAILED, RemoteReply::into_report)
            .await?;
        if !reply.status.is_success() {
            return Err(self.fail(&operation, messages::REPORT_FAILED, reply.status.message));
        }

        self.presenter.hide_progress();
        self.presenter.message(messages::REPORT_CREATED);
        let target = match &reply.rbc_morphology_analysis {
            Some(name) => Route::form(doctypes::RBC_MORPHOLOGY_ANALYSIS, name),
            None => Route::list(
                doctypes::RBC_MORPHOLOGY_ANALYSIS,
                fields::CELL_DETECTION_IMAGE,
                cell_detection_image_id,
            ),
        };
        let route = self.redirect(target).await;

        Ok(ActionOutcome {
            action: ActionKind::GenerateReport,
            document: cell_detection_image_id.to_string(),
            route: Some(route),
            detail: OutcomeDetail::Completed {
                document: reply.rbc_morphology_analysis,
            },
        })
    }

    /// Execute once and decode; transport and protocol errors fail the action
    async fn execute<T>(
        &self,
        operation: &RemoteOperation,
        failure_message: &str,
        decode: fn(RemoteReply) -> Result<T, ClientError>,
    ) -> WorkflowResult<T> {
        match self.backend.execute(operation).await.and_then(decode) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(
                    operation = operation.name(),
                    document = %operation.document(),
                    error = %e,
                    "Remote operation request failed"
                );
                Err(self.fail(operation, failure_message, None))
            }
        }
    }

    /// Hide progress, tell the user, and build the error.
    ///
    /// The server's own message wins over the generic one when present.
    fn fail(
        &self,
        operation: &RemoteOperation,
        failure_message: &str,
        server_message: Option<String>,
    ) -> WorkflowError {
        let message = server_message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| failure_message.to_string());
        self.presenter.hide_progress();
        self.presenter.message(&message);
        WorkflowError::OperationFailed {
            operation: operation.name(),
            message,
        }
    }

    /// Wait out the redirect delay, then navigate
    async fn redirect(&self, route: Route) -> Route {
        let delay = self.workflow.redirect_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.presenter.navigate(&route);
        route
    }
}

async fn wait_for_completion(
    completions: &mut broadcast::Receiver<PublishedEvent>,
    cell_detection_image_id: &str,
) -> WorkflowResult<()> {
    loop {
        match completions.recv().await {
            Ok(published) if published.event.completes_classification_of(cell_detection_image_id) => {
                return Ok(());
            }
            Ok(published) => {
                debug!(event = ?published.event, "Ignoring event for another document");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Event subscriber lagged, continuing to wait");
            }
            Err(RecvError::Closed) => {
                return Err(WorkflowError::Channel {
                    event: events::CLASSIFICATION_COMPLETE,
                });
            }
        }
    }
}
