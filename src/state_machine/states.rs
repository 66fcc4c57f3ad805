use serde::{Deserialize, Serialize};
use std::fmt;

/// The single action a document currently offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Nothing to do at this stage
    #[default]
    None,
    /// Run cell detection on a submitted blood smear
    Detect,
    /// Crop individual cells out of the detection image
    Extract,
    /// Classify extracted cells
    Classify,
    /// Create the RBC morphology analysis
    GenerateReport,
    /// Approve the morphology analysis
    Approve,
}

impl ActionKind {
    /// Button label shown for this action
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Detect => "Detect Cells",
            Self::Extract => "Extract Cells",
            Self::Classify => "Classify Extracted Cells",
            Self::GenerateReport => "Generate Report",
            Self::Approve => "Approve",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Actions that run a long remote operation on the server
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Detect | Self::Extract | Self::Classify | Self::GenerateReport
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Detect => write!(f, "detect"),
            Self::Extract => write!(f, "extract"),
            Self::Classify => write!(f, "classify"),
            Self::GenerateReport => write!(f, "generate_report"),
            Self::Approve => write!(f, "approve"),
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "detect" => Ok(Self::Detect),
            "extract" => Ok(Self::Extract),
            "classify" => Ok(Self::Classify),
            "generate_report" => Ok(Self::GenerateReport),
            "approve" => Ok(Self::Approve),
            _ => Err(format!("Invalid action: {s}")),
        }
    }
}
