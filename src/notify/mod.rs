//! Ongoing notification shown while the timer runs. Support depends on the platform, so the
//! tracker only talks to a [Notifier] and treats every failure as non fatal.

#[cfg(all(feature = "notify", unix, not(target_os = "macos")))]
pub mod desktop;

use anyhow::Result;
use tracing::info;

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync + 'static {
    /// Shows the notification `id`, or updates it in place when it is already shown.
    fn schedule(&self, id: u32, title: &str, body: &str) -> Result<()>;

    fn cancel(&self, id: u32) -> Result<()>;
}

/// Used where notifications aren't available.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn schedule(&self, _id: u32, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    fn cancel(&self, _id: u32) -> Result<()> {
        Ok(())
    }
}

/// Writes notifications into the log. Handy when running without a desktop.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn schedule(&self, id: u32, title: &str, body: &str) -> Result<()> {
        info!("Notification {id}: {title} {body}");
        Ok(())
    }

    fn cancel(&self, id: u32) -> Result<()> {
        info!("Notification {id} cancelled");
        Ok(())
    }
}

/// Picks the best notifier compiled into this build.
pub fn platform_notifier() -> Box<dyn Notifier> {
    cfg_if::cfg_if! {
        if #[cfg(all(feature = "notify", unix, not(target_os = "macos")))] {
            Box::new(desktop::DesktopNotifier::new())
        } else {
            Box::new(LogNotifier)
        }
    }
}
