//! Store-backed source of `classification_complete` events.
//!
//! Clients that cannot hold the framework's realtime socket (the CLI, batch
//! jobs) run this watcher next to the invoker. It polls the extracted cells of
//! one detection image and publishes the completion event once every cell has
//! a validated classification.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::publisher::{EventPublisher, RealtimeEvent};
use crate::client::{ClientResult, DocumentStore};

pub struct ClassificationWatcher {
    store: Arc<dyn DocumentStore>,
    publisher: EventPublisher,
    interval: Duration,
}

impl ClassificationWatcher {
    pub fn new(store: Arc<dyn DocumentStore>, publisher: EventPublisher, interval: Duration) -> Self {
        Self {
            store,
            publisher,
            interval,
        }
    }

    /// Watch in a background task; abort the handle to stop early
    pub fn spawn(self, cell_detection_image_id: impl Into<String>) -> JoinHandle<ClientResult<()>> {
        let id = cell_detection_image_id.into();
        tokio::spawn(async move { self.watch(&id).await })
    }

    /// Poll until every cell is validated, then publish the completion event.
    ///
    /// Recoverable store errors are logged and polling continues.
    pub async fn watch(&self, cell_detection_image_id: &str) -> ClientResult<()> {
        loop {
            tokio::time::sleep(self.interval).await;

            let cells = match self.store.list_extracted_cells(cell_detection_image_id).await {
                Ok(cells) => cells,
                Err(e) if e.is_recoverable() => {
                    warn!(
                        cell_detection_image = %cell_detection_image_id,
                        error = %e,
                        "Classification watcher poll failed, will retry"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            let pending = cells.iter().filter(|cell| !cell.is_validated()).count();
            debug!(
                cell_detection_image = %cell_detection_image_id,
                total = cells.len(),
                pending = pending,
                "Classification watcher poll"
            );

            if !cells.is_empty() && pending == 0 {
                let receivers = self
                    .publisher
                    .publish(RealtimeEvent::classification_complete(cell_detection_image_id));
                info!(
                    cell_detection_image = %cell_detection_image_id,
                    receivers = receivers,
                    "All cells classified, published completion event"
                );
                return Ok(());
            }
        }
    }
}
