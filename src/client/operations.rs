//! # Remote Operations
//!
//! Closed catalog of the server procedures the workflow triggers. Each
//! [`RemoteOperation`] variant has a fixed method path, a fixed argument shape
//! and exactly one [`RemoteReply`] variant it can produce.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::{ClientError, ClientResult};
use crate::constants::{methods, status};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum RemoteOperation {
    DetectCells {
        blood_smear_id: String,
    },
    ExtractCells {
        cell_detection_image_id: String,
    },
    ClassifyImage {
        extracted_cell_id: String,
    },
    EnqueueClassification {
        cell_detection_image_id: String,
    },
    CreateMorphologyReport {
        cell_detection_image_id: String,
    },
    ApplyWorkflow {
        doctype: String,
        name: String,
        action: String,
    },
    SendReportEmail {
        docname: String,
    },
}

impl RemoteOperation {
    pub fn apply_workflow(
        doctype: impl Into<String>,
        name: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::ApplyWorkflow {
            doctype: doctype.into(),
            name: name.into(),
            action: action.into(),
        }
    }

    /// Fully qualified method path on the server
    pub fn method(&self) -> &'static str {
        match self {
            Self::DetectCells { .. } => methods::DETECT_CELLS,
            Self::ExtractCells { .. } => methods::EXTRACT_CELLS,
            Self::ClassifyImage { .. } => methods::CLASSIFY_IMAGE,
            Self::EnqueueClassification { .. } => methods::ENQUEUE_CLASSIFICATION,
            Self::CreateMorphologyReport { .. } => methods::CREATE_MORPHOLOGY_REPORT,
            Self::ApplyWorkflow { .. } => methods::APPLY_WORKFLOW,
            Self::SendReportEmail { .. } => methods::SEND_REPORT_EMAIL,
        }
    }

    /// Short name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::DetectCells { .. } => "detect_cells",
            Self::ExtractCells { .. } => "extract_cells",
            Self::ClassifyImage { .. } => "classify_image",
            Self::EnqueueClassification { .. } => "enqueue_classification",
            Self::CreateMorphologyReport { .. } => "create_rbc_morphology_analysis_for_image",
            Self::ApplyWorkflow { .. } => "apply_workflow",
            Self::SendReportEmail { .. } => "send_rbc_report_email",
        }
    }

    /// The document the operation acts on
    pub fn document(&self) -> &str {
        match self {
            Self::DetectCells { blood_smear_id } => blood_smear_id,
            Self::ExtractCells {
                cell_detection_image_id,
            }
            | Self::EnqueueClassification {
                cell_detection_image_id,
            }
            | Self::CreateMorphologyReport {
                cell_detection_image_id,
            } => cell_detection_image_id,
            Self::ClassifyImage { extracted_cell_id } => extracted_cell_id,
            Self::ApplyWorkflow { name, .. } => name,
            Self::SendReportEmail { docname } => docname,
        }
    }

    /// Request arguments as the server expects them
    pub fn args(&self) -> Value {
        match self {
            Self::DetectCells { blood_smear_id } => json!({ "blood_smear_id": blood_smear_id }),
            Self::ExtractCells {
                cell_detection_image_id,
            }
            | Self::EnqueueClassification {
                cell_detection_image_id,
            }
            | Self::CreateMorphologyReport {
                cell_detection_image_id,
            } => json!({ "cell_detection_image_id": cell_detection_image_id }),
            Self::ClassifyImage { extracted_cell_id } => {
                json!({ "extracted_cell_id": extracted_cell_id })
            }
            Self::ApplyWorkflow {
                doctype,
                name,
                action,
            } => json!({
                "doc": { "doctype": doctype, "name": name },
                "action": action,
            }),
            Self::SendReportEmail { docname } => json!({ "docname": docname }),
        }
    }
}

/// Generic `{status, message}` reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Some(status::SUCCESS.to_string()),
            message: Some(message.into()),
        }
    }

    pub fn queued() -> Self {
        Self {
            status: Some(status::QUEUED.to_string()),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some("failed".to_string()),
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(status::SUCCESS)
    }

    pub fn is_queued(&self) -> bool {
        self.status.as_deref() == Some(status::QUEUED)
    }

    /// Server-provided explanation, or the raw status when there is none
    pub fn detail(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.status.as_ref().map(|s| format!("status '{s}'")))
            .unwrap_or_else(|| "no status returned".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionReply {
    #[serde(flatten)]
    pub status: StatusReply,
    #[serde(default)]
    pub cell_detection_image: Option<String>,
}

impl DetectionReply {
    /// Success needs both the status and the id of the created record
    pub fn is_success(&self) -> bool {
        self.status.is_success() && self.cell_detection_image.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReply {
    #[serde(flatten)]
    pub status: StatusReply,
    #[serde(default)]
    pub validated_classification: Option<String>,
    #[serde(default)]
    pub xai_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportReply {
    #[serde(flatten)]
    pub status: StatusReply,
    #[serde(default)]
    pub rbc_morphology_analysis: Option<String>,
}

/// Document returned by a workflow action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReply {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteReply {
    CellsDetected(DetectionReply),
    CellsExtracted(StatusReply),
    ImageClassified(ClassificationReply),
    ClassificationQueued(StatusReply),
    ReportCreated(ReportReply),
    WorkflowApplied(WorkflowReply),
    EmailSent(StatusReply),
}

impl RemoteReply {
    /// Decode the unwrapped `message` payload of `operation`'s response
    pub fn decode(operation: &RemoteOperation, message: Value) -> ClientResult<Self> {
        // Fire-and-forget procedures may answer with nothing at all
        let message = if message.is_null() {
            Value::Object(Default::default())
        } else {
            message
        };

        let reply = match operation {
            RemoteOperation::DetectCells { .. } => {
                Self::CellsDetected(serde_json::from_value(message)?)
            }
            RemoteOperation::ExtractCells { .. } => {
                Self::CellsExtracted(serde_json::from_value(message)?)
            }
            RemoteOperation::ClassifyImage { .. } => {
                Self::ImageClassified(serde_json::from_value(message)?)
            }
            RemoteOperation::EnqueueClassification { .. } => {
                Self::ClassificationQueued(serde_json::from_value(message)?)
            }
            RemoteOperation::CreateMorphologyReport { .. } => {
                Self::ReportCreated(serde_json::from_value(message)?)
            }
            RemoteOperation::ApplyWorkflow { .. } => {
                Self::WorkflowApplied(serde_json::from_value(message)?)
            }
            RemoteOperation::SendReportEmail { .. } => {
                Self::EmailSent(serde_json::from_value(message)?)
            }
        };
        Ok(reply)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::CellsDetected(_) => "cells_detected",
            Self::CellsExtracted(_) => "cells_extracted",
            Self::ImageClassified(_) => "image_classified",
            Self::ClassificationQueued(_) => "classification_queued",
            Self::ReportCreated(_) => "report_created",
            Self::WorkflowApplied(_) => "workflow_applied",
            Self::EmailSent(_) => "email_sent",
        }
    }

    fn mismatch(self, expected: &str) -> ClientError {
        ClientError::invalid_response(
            "reply",
            format!("expected {expected}, got {}", self.kind()),
        )
    }

    pub fn into_detection(self) -> ClientResult<DetectionReply> {
        match self {
            Self::CellsDetected(reply) => Ok(reply),
            other => Err(other.mismatch("cells_detected")),
        }
    }

    pub fn into_extraction(self) -> ClientResult<StatusReply> {
        match self {
            Self::CellsExtracted(reply) => Ok(reply),
            other => Err(other.mismatch("cells_extracted")),
        }
    }

    pub fn into_classification(self) -> ClientResult<ClassificationReply> {
        match self {
            Self::ImageClassified(reply) => Ok(reply),
            other => Err(other.mismatch("image_classified")),
        }
    }

    pub fn into_enqueue(self) -> ClientResult<StatusReply> {
        match self {
            Self::ClassificationQueued(reply) => Ok(reply),
            other => Err(other.mismatch("classification_queued")),
        }
    }

    pub fn into_report(self) -> ClientResult<ReportReply> {
        match self {
            Self::ReportCreated(reply) => Ok(reply),
            other => Err(other.mismatch("report_created")),
        }
    }

    pub fn into_workflow(self) -> ClientResult<WorkflowReply> {
        match self {
            Self::WorkflowApplied(reply) => Ok(reply),
            other => Err(other.mismatch("workflow_applied")),
        }
    }

    pub fn into_email(self) -> ClientResult<StatusReply> {
        match self {
            Self::EmailSent(reply) => Ok(reply),
            other => Err(other.mismatch("email_sent")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_paths() {
        let op = RemoteOperation::CreateMorphologyReport {
            cell_detection_image_id: "CDI-0001".to_string(),
        };
        assert_eq!(
            op.method(),
            "medical_imaging.api.report.create_rbc_morphology_analysis_for_image"
        );
        assert_eq!(op.args(), json!({"cell_detection_image_id": "CDI-0001"}));
        assert_eq!(op.document(), "CDI-0001");
    }

    #[test]
    fn test_apply_workflow_args() {
        let op = RemoteOperation::apply_workflow("RBC Morphology Analysis", "RBC-0001", "Approve");
        assert_eq!(
            op.args(),
            json!({
                "doc": {"doctype": "RBC Morphology Analysis", "name": "RBC-0001"},
                "action": "Approve"
            })
        );
    }

    #[test]
    fn test_detection_reply_requires_record_id() {
        let op = RemoteOperation::DetectCells {
            blood_smear_id: "BSI-0001".to_string(),
        };
        let reply = RemoteReply::decode(
            &op,
            json!({"status": "success", "cell_detection_image": "CDI-0001"}),
        )
        .unwrap()
        .into_detection()
        .unwrap();
        assert!(reply.is_success());

        // The server reports failures inside a truthy message body
        let failed = RemoteReply::decode(&op, json!({"status": "failed", "message": "Error: boom"}))
            .unwrap()
            .into_detection()
            .unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.status.detail(), "Error: boom");
    }

    #[test]
    fn test_null_reply_for_fire_and_forget() {
        let op = RemoteOperation::ClassifyImage {
            extracted_cell_id: "EC-0001".to_string(),
        };
        let reply = RemoteReply::decode(&op, Value::Null)
            .unwrap()
            .into_classification()
            .unwrap();
        assert!(!reply.status.is_success());
        assert_eq!(reply.status.detail(), "no status returned");
    }

    #[test]
    fn test_reply_mismatch_is_invalid_response() {
        let error = RemoteReply::EmailSent(StatusReply::success("sent"))
            .into_report()
            .unwrap_err();
        assert!(matches!(error, ClientError::InvalidResponse { .. }));
    }
}
