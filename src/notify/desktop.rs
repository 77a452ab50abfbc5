use std::{collections::HashMap, sync::Mutex};

use anyhow::{anyhow, Result};
use notify_rust::{Hint, Notification, NotificationHandle, Timeout};
use tracing::{debug, instrument};

use super::Notifier;

/// Freedesktop notifications. Handles are kept so that the same bubble is updated every tick
/// instead of stacking new ones.
pub struct DesktopNotifier {
    handles: Mutex<HashMap<u32, NotificationHandle>>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    #[instrument(skip(self))]
    fn schedule(&self, id: u32, title: &str, body: &str) -> Result<()> {
        let mut handles = self
            .handles
            .lock()
            .map_err(|e| anyhow!("Failed to lock notification handles: {e}"))?;

        if let Some(handle) = handles.get_mut(&id) {
            handle.summary(title).body(body);
            handle.update();
            return Ok(());
        }

        let handle = Notification::new()
            .summary(title)
            .body(body)
            .hint(Hint::Resident(true))
            .timeout(Timeout::Never)
            .show()?;
        debug!("Showing notification {id} as {}", handle.id());
        handles.insert(id, handle);
        Ok(())
    }

    #[instrument(skip(self))]
    fn cancel(&self, id: u32) -> Result<()> {
        let handle = self
            .handles
            .lock()
            .map_err(|e| anyhow!("Failed to lock notification handles: {e}"))?
            .remove(&id);
        if let Some(handle) = handle {
            handle.close();
        }
        Ok(())
    }
}
