use serde::{Deserialize, Serialize};

use super::blood_smear_image::DocStatus;

/// CellDetectionImage holds the detection result for one blood smear and is the
/// parent of the extracted cells
/// Maps to the `Cell Detection Image` doctype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDetectionImage {
    pub name: String,
    pub blood_smear_image: String,
    #[serde(default)]
    pub docstatus: DocStatus,
    #[serde(default)]
    pub workflow_state: Option<String>,
}

impl CellDetectionImage {
    pub fn new(name: impl Into<String>, blood_smear_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blood_smear_image: blood_smear_image.into(),
            docstatus: DocStatus::Submitted,
            workflow_state: None,
        }
    }
}
