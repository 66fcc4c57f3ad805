//! # Orchestration
//!
//! Drives a blood smear image through its analysis workflow.
//!
//! ## Core Components
//!
//! - **StageResolver**: gathers the related records and picks the one action
//!   the document offers now
//! - **ActionInvoker**: runs that action against the remote backend, tracks its
//!   completion and navigates to the result
//! - **ApprovalFinalizer**: records the approver of a morphology report and
//!   advances its workflow, with an explicit outcome for partial failures
//! - **Presenter**: the UI seam used for progress, messages and navigation
//!
//! ## Flow
//!
//! ```text
//! resolve -> offer action -> invoke -> remote operation -> (wait) -> navigate
//!    ^                                                                  |
//!    +------------------------------------------------------------------+
//! ```

pub mod action_invoker;
pub mod approval_finalizer;
pub mod presenter;
pub mod stage_resolver;
pub mod types;

// Re-export core types and components for easy access
pub use action_invoker::ActionInvoker;
pub use approval_finalizer::ApprovalFinalizer;
pub use presenter::{AlertLevel, ConsolePresenter, Presenter, Progress, Route};
pub use stage_resolver::{Resolution, StageResolver};
pub use types::{ActionOutcome, ApprovalOutcome, EmailDelivery, OutcomeDetail, SessionContext};
