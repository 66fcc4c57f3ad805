//! # Presenter
//!
//! The UI seam. The workflow reports progress, shows messages and requests
//! navigation through [`Presenter`]; rendering is left to the host (a form
//! view, the CLI, a test recorder).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{doctypes, fields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Progress {
    /// Duration unknown
    Indeterminate,
    /// `completed` of `total` units done
    Determinate { completed: usize, total: usize },
}

/// Navigation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Route {
    Form {
        doctype: String,
        name: String,
    },
    List {
        doctype: String,
        filter_field: String,
        filter_value: String,
    },
}

impl Route {
    pub fn form(doctype: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Form {
            doctype: doctype.into(),
            name: name.into(),
        }
    }

    pub fn list(
        doctype: impl Into<String>,
        filter_field: impl Into<String>,
        filter_value: impl Into<String>,
    ) -> Self {
        Self::List {
            doctype: doctype.into(),
            filter_field: filter_field.into(),
            filter_value: filter_value.into(),
        }
    }

    /// The extracted cells of a detection image
    pub fn extracted_cells(cell_detection_image: impl Into<String>) -> Self {
        Self::list(
            doctypes::EXTRACTED_CELL,
            fields::CELL_DETECTION_IMAGE,
            cell_detection_image,
        )
    }

    pub fn doctype(&self) -> &str {
        match self {
            Self::Form { doctype, .. } | Self::List { doctype, .. } => doctype,
        }
    }
}

/// Desk-style path, e.g. `/app/extracted-cell?cell_detection_image=CDI-0001`
impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = self.doctype().to_lowercase().replace(' ', "-");
        match self {
            Self::Form { name, .. } => write!(f, "/app/{slug}/{name}"),
            Self::List {
                filter_field,
                filter_value,
                ..
            } => write!(f, "/app/{slug}?{filter_field}={filter_value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Feedback surface for a running action
pub trait Presenter: Send + Sync {
    fn show_progress(&self, title: &str, progress: Progress);

    fn hide_progress(&self);

    /// Message that stays until dismissed
    fn message(&self, text: &str);

    /// Transient notification
    fn alert(&self, text: &str, level: AlertLevel);

    fn navigate(&self, route: &Route);
}

/// Presenter for terminals: feedback on stderr, routes on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn show_progress(&self, title: &str, progress: Progress) {
        match progress {
            Progress::Indeterminate => eprintln!("... {title}"),
            Progress::Determinate { completed, total } => {
                eprintln!("... {title} {completed}/{total}")
            }
        }
    }

    fn hide_progress(&self) {}

    fn message(&self, text: &str) {
        eprintln!("{text}");
    }

    fn alert(&self, text: &str, level: AlertLevel) {
        match level {
            AlertLevel::Info | AlertLevel::Success => eprintln!("{text}"),
            AlertLevel::Warning => eprintln!("warning: {text}"),
            AlertLevel::Error => eprintln!("error: {text}"),
        }
    }

    fn navigate(&self, route: &Route) {
        println!("{route}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths() {
        assert_eq!(
            Route::form(doctypes::CELL_DETECTION_IMAGE, "CDI-0001").to_string(),
            "/app/cell-detection-image/CDI-0001"
        );
        assert_eq!(
            Route::extracted_cells("CDI-0001").to_string(),
            "/app/extracted-cell?cell_detection_image=CDI-0001"
        );
    }

    #[test]
    fn test_route_serialization() {
        let value = serde_json::to_value(Route::extracted_cells("CDI-0001")).unwrap();
        assert_eq!(value["view"], "list");
        assert_eq!(value["doctype"], "Extracted Cell");
        assert_eq!(value["filter_field"], "cell_detection_image");
    }
}
