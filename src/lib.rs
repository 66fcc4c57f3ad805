#![allow(clippy::doc_markdown)] // Allow technical terms like doctype names in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # HemoScan Core
//!
//! Workflow engine for blood smear analysis on a document framework.
//!
//! ## Overview
//!
//! A blood smear image moves through a fixed sequence of server-side stages:
//!
//! ```text
//! Blood Smear Image -> Cell Detection Image -> Extracted Cells
//!   -> classification -> RBC Morphology Analysis -> approval -> email
//! ```
//!
//! The heavy lifting (detection, classification, tallying) happens on the
//! server behind named remote procedures. This crate decides which stage a
//! document is in, triggers the next procedure, tracks its completion and
//! finalizes the approval of the resulting report.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Stage resolution policy and the action catalog
//! - [`orchestration`] - Stage resolver, action invoker, approval finalizer, presenter seam
//! - [`client`] - Typed remote operations, store/backend traits and the HTTP client
//! - [`events`] - Completion events and the store-backed completion watcher
//! - [`models`] - Workflow documents
//! - [`config`] - Layered configuration
//! - [`error`] - Workflow error taxonomy
//! - [`logging`] - Structured logging setup
//! - [`test_helpers`] - In-memory framework and recording presenter
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hemoscan_core::client::FrappeClient;
//! use hemoscan_core::config::ConfigManager;
//! use hemoscan_core::orchestration::{
//!     ActionInvoker, ConsolePresenter, SessionContext, StageResolver,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let client = Arc::new(FrappeClient::new(manager.config().backend.clone())?);
//!
//! let resolution = StageResolver::new(client.clone()).resolve("BSI-0001").await?;
//! if let Some(target) = resolution.target() {
//!     let invoker = ActionInvoker::new(
//!         client.clone(),
//!         client.clone(),
//!         Arc::new(ConsolePresenter),
//!         manager.config(),
//!     );
//!     let session = SessionContext::today_for("pathologist@example.com");
//!     invoker.invoke(resolution.action, target, &session).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod test_helpers;

pub use client::{ClientError, DocumentStore, FrappeClient, RemoteBackend, RemoteOperation};
pub use config::{ConfigManager, HemoscanConfig};
pub use error::{Result, WorkflowError, WorkflowResult};
pub use events::{ClassificationWatcher, EventPublisher, RealtimeEvent};
pub use models::{
    BloodSmearImage, CellDetectionImage, DocStatus, ExtractedCell, MorphologyReport,
    MorphologySummary, ValidationState,
};
pub use orchestration::{
    ActionInvoker, ActionOutcome, ApprovalFinalizer, ApprovalOutcome, Presenter, Resolution,
    SessionContext, StageResolver,
};
pub use state_machine::{resolve, ActionKind, StageSnapshot};
