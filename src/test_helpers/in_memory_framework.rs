//! In-memory document framework.
//!
//! Implements [`DocumentStore`] and [`RemoteBackend`] over concurrent maps and
//! simulates the server procedures closely enough to drive a blood smear
//! through the whole workflow: detection creates a detection image, extraction
//! creates cells, classification validates them, report generation tallies
//! them and workflow actions move documents between states.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::client::{
    ClassificationReply, ClientError, ClientResult, DetectionReply, DocumentStore,
    RemoteBackend, RemoteOperation, RemoteReply, ReportReply, StatusReply, WorkflowReply,
};
use crate::constants::{cell_classes, doctypes};
use crate::events::{EventPublisher, RealtimeEvent};
use crate::models::{
    BloodSmearImage, CellDetectionImage, ExtractedCell, MorphologyReport, MorphologySummary,
    ValidationState,
};

/// State a freshly generated report starts in
pub const REPORT_INITIAL_STATE: &str = "Pending Approval";

/// How a configured operation fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedFailure {
    /// The procedure answers with a non-success status and this message
    Status(String),
    /// The request itself fails with this HTTP status
    Transport(u16),
}

pub struct InMemoryFramework {
    smears: DashMap<String, BloodSmearImage>,
    detections: DashMap<String, CellDetectionImage>,
    cells: DashMap<String, ExtractedCell>,
    reports: DashMap<String, MorphologyReport>,
    executed: Mutex<Vec<RemoteOperation>>,
    failures: Mutex<HashMap<&'static str, SimulatedFailure>>,
    transitions: Mutex<HashMap<String, String>>,
    rejected_actions: Mutex<HashSet<String>>,
    event_publisher: Mutex<Option<EventPublisher>>,
    extraction_count: AtomicUsize,
    sequence: AtomicUsize,
    saves: AtomicUsize,
    discard_saves: AtomicBool,
    store_unavailable: AtomicBool,
    complete_queued: AtomicBool,
}

impl Default for InMemoryFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFramework {
    pub fn new() -> Self {
        let transitions = HashMap::from([
            ("Approve".to_string(), "Approved".to_string()),
            (
                "Complete Classification".to_string(),
                "Classification Completed".to_string(),
            ),
        ]);

        Self {
            smears: DashMap::new(),
            detections: DashMap::new(),
            cells: DashMap::new(),
            reports: DashMap::new(),
            executed: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            transitions: Mutex::new(transitions),
            rejected_actions: Mutex::new(HashSet::new()),
            event_publisher: Mutex::new(None),
            extraction_count: AtomicUsize::new(3),
            sequence: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            discard_saves: AtomicBool::new(false),
            store_unavailable: AtomicBool::new(false),
            complete_queued: AtomicBool::new(true),
        }
    }

    /// Number of cells `extract_cells` creates
    pub fn with_extraction_count(self, count: usize) -> Self {
        self.extraction_count.store(count, Ordering::SeqCst);
        self
    }

    /// Publish `classification_complete` here when a queued job finishes
    pub fn with_event_publisher(self, publisher: EventPublisher) -> Self {
        *self.event_publisher.lock() = Some(publisher);
        self
    }

    // Seeding

    pub fn insert_smear(&self, smear: BloodSmearImage) {
        self.smears.insert(smear.name.clone(), smear);
    }

    pub fn insert_detection(&self, detection: CellDetectionImage) {
        self.detections.insert(detection.name.clone(), detection);
    }

    pub fn insert_cell(&self, cell: ExtractedCell) {
        self.cells.insert(cell.name.clone(), cell);
    }

    pub fn insert_report(&self, report: MorphologyReport) {
        self.reports.insert(report.name.clone(), report);
    }

    pub fn set_validation(&self, cell: &str, state: ValidationState) {
        if let Some(mut cell) = self.cells.get_mut(cell) {
            cell.validated_classification = state;
        }
    }

    // Behaviour switches

    pub fn fail_operation(&self, operation: &'static str, failure: SimulatedFailure) {
        self.failures.lock().insert(operation, failure);
    }

    /// Reject every `apply_workflow` call for `action`
    pub fn reject_workflow_action(&self, action: impl Into<String>) {
        self.rejected_actions.lock().insert(action.into());
    }

    /// Accept report saves without storing them
    pub fn discard_saves(&self, discard: bool) {
        self.discard_saves.store(discard, Ordering::SeqCst);
    }

    /// Make every store read fail with a 503
    pub fn set_store_unavailable(&self, unavailable: bool) {
        self.store_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Whether queued classification jobs finish on their own
    pub fn complete_queued_classification(&self, complete: bool) {
        self.complete_queued.store(complete, Ordering::SeqCst);
    }

    // Inspection

    pub fn executed(&self) -> Vec<RemoteOperation> {
        self.executed.lock().clone()
    }

    /// Executed operations with the given name, in order
    pub fn executed_named(&self, name: &str) -> Vec<RemoteOperation> {
        self.executed
            .lock()
            .iter()
            .filter(|operation| operation.name() == name)
            .cloned()
            .collect()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn report(&self, name: &str) -> Option<MorphologyReport> {
        self.reports.get(name).map(|report| report.clone())
    }

    pub fn detection(&self, name: &str) -> Option<CellDetectionImage> {
        self.detections.get(name).map(|detection| detection.clone())
    }

    pub fn cells_of(&self, detection_image: &str) -> Vec<ExtractedCell> {
        let mut cells: Vec<ExtractedCell> = self
            .cells
            .iter()
            .filter(|cell| cell.cell_detection_image == detection_image)
            .map(|cell| cell.clone())
            .collect();
        cells.sort_by(|a, b| a.cell_number.cmp(&b.cell_number).then(a.name.cmp(&b.name)));
        cells
    }

    fn next_name(&self, prefix: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n:04}")
    }

    fn check_available(&self) -> ClientResult<()> {
        if self.store_unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::api_error(503, "Service Unavailable"));
        }
        Ok(())
    }

    fn simulate(&self, operation: &RemoteOperation) -> ClientResult<RemoteReply> {
        match operation {
            RemoteOperation::DetectCells { blood_smear_id } => {
                if !self.smears.contains_key(blood_smear_id) {
                    return Ok(RemoteReply::CellsDetected(DetectionReply {
                        status: StatusReply::failed(format!(
                            "Blood Smear Image {blood_smear_id} not found"
                        )),
                        cell_detection_image: None,
                    }));
                }
                let name = self.next_name("CDI");
                self.insert_detection(CellDetectionImage::new(&name, blood_smear_id));
                Ok(RemoteReply::CellsDetected(DetectionReply {
                    status: StatusReply::success("Cells detected"),
                    cell_detection_image: Some(name),
                }))
            }
            RemoteOperation::ExtractCells {
                cell_detection_image_id,
            } => {
                let classes = [
                    cell_classes::CIRCULAR,
                    cell_classes::ELONGATED,
                    cell_classes::OTHER,
                ];
                let count = self.extraction_count.load(Ordering::SeqCst);
                for index in 0..count {
                    let mut cell = ExtractedCell::new(self.next_name("EC"), cell_detection_image_id)
                        .with_primary_classification(classes[index % classes.len()]);
                    cell.cell_number = Some(index as u32 + 1);
                    self.insert_cell(cell);
                }
                Ok(RemoteReply::CellsExtracted(StatusReply::success(format!(
                    "{count} cells extracted"
                ))))
            }
            RemoteOperation::ClassifyImage { extracted_cell_id } => {
                let label = self.validate_cell(extracted_cell_id)?;
                Ok(RemoteReply::ImageClassified(ClassificationReply {
                    status: StatusReply::success("Classified"),
                    validated_classification: Some(label),
                    xai_image: None,
                }))
            }
            RemoteOperation::EnqueueClassification {
                cell_detection_image_id,
            } => {
                if self.complete_queued.load(Ordering::SeqCst) {
                    for cell in self.cells_of(cell_detection_image_id) {
                        self.validate_cell(&cell.name)?;
                    }
                    if let Some(publisher) = self.event_publisher.lock().as_ref() {
                        publisher.publish(RealtimeEvent::classification_complete(
                            cell_detection_image_id,
                        ));
                    }
                }
                Ok(RemoteReply::ClassificationQueued(StatusReply::queued()))
            }
            RemoteOperation::CreateMorphologyReport {
                cell_detection_image_id,
            } => {
                let cells = self.cells_of(cell_detection_image_id);
                let summary = MorphologySummary::from_cells(&cells);
                let name = self.next_name("RBC");
                let mut report =
                    MorphologyReport::from_summary(&name, cell_detection_image_id, &summary);
                report.workflow_state = Some(REPORT_INITIAL_STATE.to_string());
                self.insert_report(report);
                Ok(RemoteReply::ReportCreated(ReportReply {
                    status: StatusReply::success("Report created"),
                    rbc_morphology_analysis: Some(name),
                }))
            }
            RemoteOperation::ApplyWorkflow {
                doctype,
                name,
                action,
            } => self.apply_workflow(doctype, name, action),
            RemoteOperation::SendReportEmail { docname } => {
                if !self.reports.contains_key(docname) {
                    return Ok(RemoteReply::EmailSent(StatusReply::failed(format!(
                        "Report {docname} not found"
                    ))));
                }
                Ok(RemoteReply::EmailSent(StatusReply::success(
                    "Email sent to patient",
                )))
            }
        }
    }

    fn validate_cell(&self, name: &str) -> ClientResult<String> {
        let mut cell = self
            .cells
            .get_mut(name)
            .ok_or_else(|| ClientError::not_found(doctypes::EXTRACTED_CELL, name))?;
        let label = cell
            .primary_classification
            .clone()
            .unwrap_or_else(|| cell_classes::OTHER.to_string());
        cell.validated_classification = ValidationState::label(&label);
        Ok(label)
    }

    fn apply_workflow(&self, doctype: &str, name: &str, action: &str) -> ClientResult<RemoteReply> {
        if self.rejected_actions.lock().contains(action) {
            return Err(ClientError::api_error(
                417,
                format!("Workflow action '{action}' is not permitted"),
            ));
        }
        let next_state = self
            .transitions
            .lock()
            .get(action)
            .cloned()
            .ok_or_else(|| ClientError::api_error(417, format!("Unknown workflow action '{action}'")))?;

        let updated = match doctype {
            doctypes::RBC_MORPHOLOGY_ANALYSIS => self
                .reports
                .get_mut(name)
                .map(|mut report| report.workflow_state = Some(next_state.clone())),
            doctypes::CELL_DETECTION_IMAGE => self
                .detections
                .get_mut(name)
                .map(|mut detection| detection.workflow_state = Some(next_state.clone())),
            _ => None,
        };
        if updated.is_none() {
            return Err(ClientError::not_found(doctype, name));
        }

        Ok(RemoteReply::WorkflowApplied(WorkflowReply {
            name: Some(name.to_string()),
            workflow_state: Some(next_state),
        }))
    }
}

#[async_trait]
impl RemoteBackend for InMemoryFramework {
    async fn execute(&self, operation: &RemoteOperation) -> ClientResult<RemoteReply> {
        self.executed.lock().push(operation.clone());

        let failure = self.failures.lock().get(operation.name()).cloned();
        match failure {
            Some(SimulatedFailure::Transport(status)) => {
                Err(ClientError::api_error(status, "Simulated transport failure"))
            }
            Some(SimulatedFailure::Status(message)) => {
                let status = StatusReply::failed(message);
                let reply = match operation {
                    RemoteOperation::DetectCells { .. } => RemoteReply::CellsDetected(DetectionReply {
                        status,
                        cell_detection_image: None,
                    }),
                    RemoteOperation::ExtractCells { .. } => RemoteReply::CellsExtracted(status),
                    RemoteOperation::ClassifyImage { .. } => {
                        RemoteReply::ImageClassified(ClassificationReply {
                            status,
                            ..Default::default()
                        })
                    }
                    RemoteOperation::EnqueueClassification { .. } => {
                        RemoteReply::ClassificationQueued(status)
                    }
                    RemoteOperation::CreateMorphologyReport { .. } => {
                        RemoteReply::ReportCreated(ReportReply {
                            status,
                            rbc_morphology_analysis: None,
                        })
                    }
                    RemoteOperation::ApplyWorkflow { .. } => {
                        return Err(ClientError::api_error(417, status.detail()));
                    }
                    RemoteOperation::SendReportEmail { .. } => RemoteReply::EmailSent(status),
                };
                Ok(reply)
            }
            None => self.simulate(operation),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryFramework {
    async fn get_blood_smear(&self, name: &str) -> ClientResult<BloodSmearImage> {
        self.check_available()?;
        self.smears
            .get(name)
            .map(|smear| smear.clone())
            .ok_or_else(|| ClientError::not_found(doctypes::BLOOD_SMEAR_IMAGE, name))
    }

    async fn find_detection_image(
        &self,
        blood_smear: &str,
    ) -> ClientResult<Option<CellDetectionImage>> {
        self.check_available()?;
        Ok(self
            .detections
            .iter()
            .find(|detection| detection.blood_smear_image == blood_smear)
            .map(|detection| detection.clone()))
    }

    async fn list_extracted_cells(
        &self,
        detection_image: &str,
    ) -> ClientResult<Vec<ExtractedCell>> {
        self.check_available()?;
        Ok(self.cells_of(detection_image))
    }

    async fn find_report(&self, detection_image: &str) -> ClientResult<Option<MorphologyReport>> {
        self.check_available()?;
        Ok(self
            .reports
            .iter()
            .find(|report| report.cell_detection_image == detection_image)
            .map(|report| report.clone()))
    }

    async fn get_report(&self, name: &str) -> ClientResult<MorphologyReport> {
        self.check_available()?;
        self.report(name)
            .ok_or_else(|| ClientError::not_found(doctypes::RBC_MORPHOLOGY_ANALYSIS, name))
    }

    async fn save_report(&self, report: &MorphologyReport) -> ClientResult<MorphologyReport> {
        self.check_available()?;
        self.saves.fetch_add(1, Ordering::SeqCst);

        let mut stored = self
            .reports
            .get_mut(&report.name)
            .ok_or_else(|| ClientError::not_found(doctypes::RBC_MORPHOLOGY_ANALYSIS, &report.name))?;
        if !self.discard_saves.load(Ordering::SeqCst) {
            stored.approved_by = report.approved_by.clone();
            stored.approval_date = report.approval_date;
        }
        Ok(stored.clone())
    }
}
