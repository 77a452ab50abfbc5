use anyhow::Result;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

use crate::storage::PersistentStore;

use super::state::TrackerState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistCommand {
    Save(TrackerState),
    Remove,
}

/// Applies tracker snapshots to the store in the order they were produced. Failures are
/// logged and the next command is processed anyway, the in-memory state stays authoritative.
pub struct PersistenceWorker {
    receiver: UnboundedReceiver<PersistCommand>,
    store: Box<dyn PersistentStore>,
    key: String,
}

impl PersistenceWorker {
    pub fn new(
        receiver: UnboundedReceiver<PersistCommand>,
        store: Box<dyn PersistentStore>,
        key: String,
    ) -> Self {
        Self {
            receiver,
            store,
            key,
        }
    }

    async fn apply(&self, command: &PersistCommand) -> Result<()> {
        match command {
            PersistCommand::Save(state) => {
                self.store
                    .set(&self.key, serde_json::to_string(state)?)
                    .await
            }
            PersistCommand::Remove => self.store.remove(&self.key).await,
        }
    }

    /// Runs until every sender is gone and the queue is drained.
    pub async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            debug!("Persisting {:?}", command);
            match self.apply(&command).await {
                Ok(_) => debug!("Persisted {:?}", command),
                Err(e) => error!("Failed to persist {:?}: {e:?}", command),
            }
        }
        info!("Persistence worker finished");
    }
}
