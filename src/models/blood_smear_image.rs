use serde::{Deserialize, Serialize};
use std::fmt;

/// Framework document lifecycle flag (`docstatus` 0/1/2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DocStatus {
    #[default]
    Draft,
    Submitted,
    Cancelled,
}

impl DocStatus {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted)
    }
}

impl TryFrom<u8> for DocStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Draft),
            1 => Ok(Self::Submitted),
            2 => Ok(Self::Cancelled),
            other => Err(format!("Invalid docstatus: {other}")),
        }
    }
}

impl From<DocStatus> for u8 {
    fn from(status: DocStatus) -> Self {
        match status {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Submitted => write!(f, "submitted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// BloodSmearImage is the uploaded smear that starts the workflow
/// Maps to the `Blood Smear Image` doctype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodSmearImage {
    pub name: String,
    #[serde(default)]
    pub docstatus: DocStatus,
    #[serde(default)]
    pub patient: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl BloodSmearImage {
    pub fn new(name: impl Into<String>, docstatus: DocStatus) -> Self {
        Self {
            name: name.into(),
            docstatus,
            patient: None,
            image: None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.docstatus.is_submitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docstatus_from_framework_integer() {
        let doc: BloodSmearImage =
            serde_json::from_value(serde_json::json!({"name": "BSI-0001", "docstatus": 1}))
                .unwrap();
        assert!(doc.is_submitted());

        let draft: BloodSmearImage =
            serde_json::from_value(serde_json::json!({"name": "BSI-0002"})).unwrap();
        assert_eq!(draft.docstatus, DocStatus::Draft);
    }

    #[test]
    fn test_invalid_docstatus_rejected() {
        let result: Result<BloodSmearImage, _> =
            serde_json::from_value(serde_json::json!({"name": "BSI-0003", "docstatus": 7}));
        assert!(result.is_err());
    }
}
