//! # Document Models
//!
//! Typed views of the framework documents the workflow reads and writes. The
//! framework owns these records; the crate only deserializes what it needs and
//! persists changes through [`crate::client::DocumentStore`].

pub mod blood_smear_image;
pub mod cell_detection_image;
pub mod extracted_cell;
pub mod morphology_report;

pub use blood_smear_image::{BloodSmearImage, DocStatus};
pub use cell_detection_image::CellDetectionImage;
pub use extracted_cell::{ExtractedCell, ValidationState};
pub use morphology_report::{MorphologyReport, MorphologySummary};
