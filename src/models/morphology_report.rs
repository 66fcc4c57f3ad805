use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::extracted_cell::ExtractedCell;
use crate::constants::cell_classes;

/// MorphologyReport is the RBC morphology analysis produced for a detection image
/// Maps to the `RBC Morphology Analysis` doctype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphologyReport {
    pub name: String,
    pub cell_detection_image: String,
    #[serde(default)]
    pub patient: Option<String>,
    #[serde(default)]
    pub cells_examined: u32,
    #[serde(default)]
    pub normal_cell_count: u32,
    #[serde(default)]
    pub sickle_cell_count: u32,
    #[serde(default)]
    pub other_cell_count: u32,
    #[serde(default)]
    pub normal_cells_percentage: f64,
    #[serde(default)]
    pub sickle_cells_percentage: f64,
    #[serde(default)]
    pub other_cells_percentage: f64,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approval_date: Option<NaiveDate>,
    #[serde(default)]
    pub workflow_state: Option<String>,
}

impl MorphologyReport {
    pub fn new(name: impl Into<String>, cell_detection_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell_detection_image: cell_detection_image.into(),
            patient: None,
            cells_examined: 0,
            normal_cell_count: 0,
            sickle_cell_count: 0,
            other_cell_count: 0,
            normal_cells_percentage: 0.0,
            sickle_cells_percentage: 0.0,
            other_cells_percentage: 0.0,
            approved_by: None,
            approval_date: None,
            workflow_state: None,
        }
    }

    /// Build a report carrying the counts of `summary`
    pub fn from_summary(
        name: impl Into<String>,
        cell_detection_image: impl Into<String>,
        summary: &MorphologySummary,
    ) -> Self {
        let mut report = Self::new(name, cell_detection_image);
        report.cells_examined = summary.cells_examined;
        report.normal_cell_count = summary.normal_cell_count;
        report.sickle_cell_count = summary.sickle_cell_count;
        report.other_cell_count = summary.other_cell_count;
        report.normal_cells_percentage = summary.normal_cells_percentage;
        report.sickle_cells_percentage = summary.sickle_cells_percentage;
        report.other_cells_percentage = summary.other_cells_percentage;
        report
    }

    pub fn is_approved(&self) -> bool {
        self.approved_by
            .as_deref()
            .is_some_and(|approver| !approver.trim().is_empty())
    }

    pub fn is_in_state(&self, state: &str) -> bool {
        self.workflow_state.as_deref() == Some(state)
    }
}

/// Cell counts by primary classification with two-decimal percentages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MorphologySummary {
    pub cells_examined: u32,
    pub normal_cell_count: u32,
    pub sickle_cell_count: u32,
    pub other_cell_count: u32,
    pub normal_cells_percentage: f64,
    pub sickle_cells_percentage: f64,
    pub other_cells_percentage: f64,
}

impl MorphologySummary {
    /// Tally primary classification labels.
    ///
    /// Unrecognised or missing labels count towards `cells_examined` only.
    pub fn tally<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut summary = Self::default();
        for label in labels {
            summary.cells_examined += 1;
            match label {
                Some(cell_classes::CIRCULAR) => summary.normal_cell_count += 1,
                Some(cell_classes::ELONGATED) => summary.sickle_cell_count += 1,
                Some(cell_classes::OTHER) => summary.other_cell_count += 1,
                _ => {}
            }
        }

        summary.normal_cells_percentage =
            percentage(summary.normal_cell_count, summary.cells_examined);
        summary.sickle_cells_percentage =
            percentage(summary.sickle_cell_count, summary.cells_examined);
        summary.other_cells_percentage =
            percentage(summary.other_cell_count, summary.cells_examined);
        summary
    }

    pub fn from_cells(cells: &[ExtractedCell]) -> Self {
        Self::tally(cells.iter().map(|cell| cell.primary_classification.as_deref()))
    }
}

fn percentage(count: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(count) / f64::from(total) * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_rounds_to_two_decimals() {
        let summary = MorphologySummary::tally([
            Some("Circular"),
            Some("Elongated"),
            Some("Other"),
        ]);
        assert_eq!(summary.cells_examined, 3);
        assert_eq!(summary.normal_cell_count, 1);
        assert_eq!(summary.normal_cells_percentage, 33.33);
        assert_eq!(summary.sickle_cells_percentage, 33.33);
        assert_eq!(summary.other_cells_percentage, 33.33);
    }

    #[test]
    fn test_unknown_labels_only_count_as_examined() {
        let summary = MorphologySummary::tally([Some("Circular"), None, Some("Spherocyte")]);
        assert_eq!(summary.cells_examined, 3);
        assert_eq!(summary.normal_cell_count, 1);
        assert_eq!(summary.sickle_cell_count, 0);
        assert_eq!(summary.other_cell_count, 0);
    }

    #[test]
    fn test_empty_tally() {
        let summary = MorphologySummary::tally(std::iter::empty());
        assert_eq!(summary, MorphologySummary::default());
    }

    #[test]
    fn test_report_approval_flags() {
        let mut report = MorphologyReport::new("RBC-0001", "CDI-0001");
        assert!(!report.is_approved());
        report.approved_by = Some("  ".to_string());
        assert!(!report.is_approved());
        report.approved_by = Some("pathologist@example.com".to_string());
        assert!(report.is_approved());
    }

    #[test]
    fn test_report_date_deserialization() {
        let report: MorphologyReport = serde_json::from_value(serde_json::json!({
            "name": "RBC-0002",
            "cell_detection_image": "CDI-0002",
            "approval_date": "2025-03-14",
            "approved_by": "lab@example.com",
            "workflow_state": "Approved"
        }))
        .unwrap();
        assert_eq!(
            report.approval_date,
            NaiveDate::from_ymd_opt(2025, 3, 14)
        );
        assert!(report.is_in_state("Approved"));
    }
}
