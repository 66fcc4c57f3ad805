use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::UNSET_SELECT_VALUE;

/// Validation state of an extracted cell's classification
///
/// The framework stores an unset select field as null, an empty string or the
/// literal `"Select"`; all three read as [`ValidationState::Unset`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ValidationState {
    #[default]
    Unset,
    Label(String),
}

impl ValidationState {
    pub fn label(value: impl Into<String>) -> Self {
        Self::from(Some(value.into()))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Label(label) => Some(label),
            Self::Unset => None,
        }
    }
}

impl From<Option<String>> for ValidationState {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(label) if !label.trim().is_empty() && label != UNSET_SELECT_VALUE => {
                Self::Label(label)
            }
            _ => Self::Unset,
        }
    }
}

impl From<&str> for ValidationState {
    fn from(value: &str) -> Self {
        Self::from(Some(value.to_string()))
    }
}

impl From<ValidationState> for Option<String> {
    fn from(state: ValidationState) -> Self {
        match state {
            ValidationState::Label(label) => Some(label),
            ValidationState::Unset => None,
        }
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(label) => write!(f, "{label}"),
            Self::Unset => write!(f, "{UNSET_SELECT_VALUE}"),
        }
    }
}

/// ExtractedCell is one cell cropped out of a detection image
/// Maps to the `Extracted Cell` doctype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedCell {
    pub name: String,
    pub cell_detection_image: String,
    #[serde(default)]
    pub cell_number: Option<u32>,
    /// Label assigned by the detector
    #[serde(default)]
    pub primary_classification: Option<String>,
    /// Label assigned by the classifier
    #[serde(default)]
    pub validated_classification: ValidationState,
}

impl ExtractedCell {
    pub fn new(name: impl Into<String>, cell_detection_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell_detection_image: cell_detection_image.into(),
            cell_number: None,
            primary_classification: None,
            validated_classification: ValidationState::Unset,
        }
    }

    pub fn with_primary_classification(mut self, label: impl Into<String>) -> Self {
        self.primary_classification = Some(label.into());
        self
    }

    pub fn with_validation(mut self, state: ValidationState) -> Self {
        self.validated_classification = state;
        self
    }

    pub fn is_validated(&self) -> bool {
        !self.validated_classification.is_unset()
    }
}
