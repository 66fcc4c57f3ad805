//! # Framework Client
//!
//! Everything the workflow needs from the document framework:
//!
//! - **operations**: the typed catalog of remote procedures and their replies
//! - **traits**: the [`RemoteBackend`] and [`DocumentStore`] seams
//! - **frappe_client**: the HTTP implementation of both seams
//! - **error**: transport and protocol errors

pub mod error;
pub mod frappe_client;
pub mod operations;
pub mod traits;

// Re-export main types for easy access
pub use error::{ClientError, ClientResult};
pub use frappe_client::FrappeClient;
pub use operations::{
    ClassificationReply, DetectionReply, RemoteOperation, RemoteReply, ReportReply, StatusReply,
    WorkflowReply,
};
pub use traits::{DocumentStore, RemoteBackend};
