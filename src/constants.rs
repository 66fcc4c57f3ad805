//! # System Constants
//!
//! Doctype names, field names, remote method paths and user-facing texts shared
//! across the workflow. The document framework owns these identifiers, so they
//! live in one place instead of being spelled out at call sites.

/// Doctype names as registered in the document framework
pub mod doctypes {
    pub const BLOOD_SMEAR_IMAGE: &str = "Blood Smear Image";
    pub const CELL_DETECTION_IMAGE: &str = "Cell Detection Image";
    pub const EXTRACTED_CELL: &str = "Extracted Cell";
    pub const RBC_MORPHOLOGY_ANALYSIS: &str = "RBC Morphology Analysis";
}

/// Link fields used to filter related records
pub mod fields {
    pub const BLOOD_SMEAR_IMAGE: &str = "blood_smear_image";
    pub const CELL_DETECTION_IMAGE: &str = "cell_detection_image";
}

/// Fully qualified remote procedure names
pub mod methods {
    pub const DETECT_CELLS: &str = "medical_imaging.api.cell_detection.detect_cells";
    pub const EXTRACT_CELLS: &str = "medical_imaging.api.cell_extraction.extract_cells";
    pub const CLASSIFY_IMAGE: &str = "medical_imaging.api.classification.classify_image";
    pub const ENQUEUE_CLASSIFICATION: &str =
        "medical_imaging.api.classification.enqueue_classification";
    pub const CREATE_MORPHOLOGY_REPORT: &str =
        "medical_imaging.api.report.create_rbc_morphology_analysis_for_image";
    pub const APPLY_WORKFLOW: &str = "frappe.model.workflow.apply_workflow";
    pub const SEND_REPORT_EMAIL: &str = "medical_imaging.api.send_mail.send_rbc_report_email";
}

/// Status values carried in remote operation replies
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const QUEUED: &str = "queued";
}

/// Push-notification event names
pub mod events {
    pub const CLASSIFICATION_COMPLETE: &str = "classification_complete";
}

/// Placeholder value the framework stores for an unset select field
pub const UNSET_SELECT_VALUE: &str = "Select";

/// Primary classification labels produced by cell detection
pub mod cell_classes {
    pub const CIRCULAR: &str = "Circular";
    pub const ELONGATED: &str = "Elongated";
    pub const OTHER: &str = "Other";
}

/// Texts shown to the user during each action
pub mod messages {
    pub const DETECTING: &str = "Detecting Cells...";
    pub const DETECTED: &str = "Cells Detected Successfully! Redirecting you to the results...";
    pub const DETECTION_FAILED: &str = "Cell Detection Failed!";

    pub const EXTRACTING: &str = "Extracting Cells...";
    pub const EXTRACTED: &str = "Cells Extracted Successfully! Redirecting you to the results...";
    pub const EXTRACTION_FAILED: &str = "Cell Extraction Failed!";

    pub const CLASSIFYING: &str = "Classifying Cells...";
    pub const NO_CELLS_TO_CLASSIFY: &str = "No extracted cells found for classification.";
    pub const CLASSIFICATION_QUEUED: &str =
        "Classification queued. You will be redirected when it completes.";
    pub const ALL_CLASSIFIED: &str = "All cells classified successfully! Redirecting...";
    pub const CLASSIFICATION_FAILED: &str = "Cell Classification Failed!";

    pub const GENERATING_REPORT: &str = "Generating Report...";
    pub const REPORT_CREATED: &str = "RBC Morphology Analysis record created successfully.";
    pub const REPORT_FAILED: &str = "Report Generation Failed!";

    pub const APPROVED: &str = "Document approved successfully!";
    pub const APPROVAL_SAVE_FAILED: &str = "Approval could not be saved.";
    pub const EMAIL_FAILED: &str = "Report email could not be sent.";
}
