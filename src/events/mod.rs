pub mod completion_watcher;
pub mod publisher;

// Re-export key types for convenience
pub use completion_watcher::ClassificationWatcher;
pub use publisher::{EventPublisher, PublishError, PublishedEvent, RealtimeEvent};
