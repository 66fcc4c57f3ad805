//! # Client Seams
//!
//! The workflow talks to the document framework through two interfaces: a
//! document store for reads and approval writes, and a remote backend that
//! executes the typed operation catalog. The HTTP client implements both; tests
//! use the in-memory framework from [`crate::test_helpers`].

use async_trait::async_trait;

use super::error::ClientResult;
use super::operations::{RemoteOperation, RemoteReply};
use crate::models::{BloodSmearImage, CellDetectionImage, ExtractedCell, MorphologyReport};

/// Executes server procedures
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Run one operation and decode its reply.
    ///
    /// A non-success status inside the reply is still `Ok`; only transport and
    /// protocol problems are errors.
    async fn execute(&self, operation: &RemoteOperation) -> ClientResult<RemoteReply>;
}

/// Reads workflow documents and persists approval fields
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_blood_smear(&self, name: &str) -> ClientResult<BloodSmearImage>;

    /// The detection record created for a blood smear, if any
    async fn find_detection_image(
        &self,
        blood_smear: &str,
    ) -> ClientResult<Option<CellDetectionImage>>;

    async fn list_extracted_cells(&self, detection_image: &str)
        -> ClientResult<Vec<ExtractedCell>>;

    /// The morphology report created for a detection image, if any
    async fn find_report(&self, detection_image: &str) -> ClientResult<Option<MorphologyReport>>;

    async fn get_report(&self, name: &str) -> ClientResult<MorphologyReport>;

    /// Persist the report's approval fields and return the stored document
    async fn save_report(&self, report: &MorphologyReport) -> ClientResult<MorphologyReport>;
}
