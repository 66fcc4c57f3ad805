//! # Workflow Errors
//!
//! Error taxonomy for stage resolution, remote operations and approval.
//! Every variant is terminal: nothing here is retried automatically and the
//! user re-triggers the action from the UI.

use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigurationError;

pub type Result<T> = std::result::Result<T, WorkflowError>;
pub type WorkflowResult<T> = Result<T>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A lookup against the document store failed
    #[error("Query failed while {context}: {source}")]
    Query {
        context: String,
        #[source]
        source: ClientError,
    },

    /// A remote operation answered with a non-success status or could not be reached
    #[error("Remote operation {operation} failed: {message}")]
    OperationFailed {
        operation: &'static str,
        message: String,
    },

    /// A workflow action was rejected by the document framework
    #[error("Workflow action '{action}' on {doctype} {name} failed: {message}")]
    TransitionFailed {
        doctype: String,
        name: String,
        action: String,
        message: String,
    },

    #[error("Timed out after {waited_ms}ms waiting for {event}")]
    Timeout { event: &'static str, waited_ms: u64 },

    #[error("Event channel closed while waiting for {event}")]
    Channel { event: &'static str },

    #[error("No action is available for {document}")]
    NoActionAvailable { document: String },

    /// A write was accepted but the stored document does not reflect it
    #[error("Verification failed for {doctype} {name}: {reason}")]
    Verification {
        doctype: String,
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl WorkflowError {
    pub fn query(context: impl Into<String>, source: ClientError) -> Self {
        Self::Query {
            context: context.into(),
            source,
        }
    }

    pub fn transition_failed(
        doctype: impl Into<String>,
        name: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TransitionFailed {
            doctype: doctype.into(),
            name: name.into(),
            action: action.into(),
            message: message.into(),
        }
    }

    /// Text suitable for showing to the person who triggered the action
    pub fn user_message(&self) -> String {
        match self {
            Self::Query { context, .. } => {
                format!("Unable to complete the check while {context}. Please try again.")
            }
            Self::OperationFailed { message, .. } => message.clone(),
            Self::TransitionFailed { action, message, .. } => {
                format!("Could not apply '{action}': {message}")
            }
            Self::Timeout { .. } => {
                "The operation is taking longer than expected. Reload the document later to check its progress.".to_string()
            }
            Self::Channel { .. } => {
                "Lost the connection to the notification channel. Reload the document to check its progress.".to_string()
            }
            Self::NoActionAvailable { .. } => "There is nothing to do for this document.".to_string(),
            Self::Verification { reason, .. } => format!("The change was not saved: {reason}"),
            Self::Configuration(e) => e.to_string(),
            Self::Client(e) => e.to_string(),
        }
    }
}
