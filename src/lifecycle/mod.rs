//! Sources of foreground/background transitions. The tracker subscribes once when it is
//! initialized and releases the [Subscription] when it is disposed.

pub mod idle;
#[cfg(unix)]
pub mod signal;

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Foreground,
    Background,
}

impl LifecycleEvent {
    /// Maps the `isActive` flag delivered by app state change events.
    pub fn from_active(is_active: bool) -> Self {
        if is_active {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

pub type LifecycleHandler = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

pub trait LifecycleSource {
    fn subscribe(&self, handler: LifecycleHandler) -> Result<Subscription>;
}

/// Live subscription to a [LifecycleSource]. Released on [Subscription::unsubscribe] or when
/// dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Subscription backed by a background task that stops once `token` is cancelled.
    pub fn from_token(token: CancellationToken) -> Self {
        Self::new(move || token.cancel())
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

/// Source whose events are pushed by the owner through [ManualLifecycle::emit]. Handlers run
/// synchronously on the emitting thread.
#[derive(Clone, Default)]
pub struct ManualLifecycle {
    handlers: Arc<Mutex<BTreeMap<u64, LifecycleHandler>>>,
    next_id: Arc<AtomicU64>,
}

impl ManualLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: LifecycleEvent) {
        debug!("Emitting {event:?}");
        // Handlers are cloned out so that one may unsubscribe while being called.
        let handlers = match self.handlers.lock() {
            Ok(handlers) => handlers.values().cloned().collect::<Vec<_>>(),
            Err(e) => {
                error!("Failed to lock lifecycle handlers {e}");
                return;
            }
        };
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().map(|v| v.len()).unwrap_or_default()
    }
}

impl LifecycleSource for ManualLifecycle {
    fn subscribe(&self, handler: LifecycleHandler) -> Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .map_err(|e| anyhow!("Failed to lock lifecycle handlers: {e}"))?
            .insert(id, handler);

        let handlers = Arc::downgrade(&self.handlers);
        Ok(Subscription::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                if let Ok(mut handlers) = handlers.lock() {
                    handlers.remove(&id);
                }
            }
        }))
    }
}

/// Combines several sources behind one subscription.
pub struct CombinedLifecycle {
    sources: Vec<Box<dyn LifecycleSource>>,
}

impl CombinedLifecycle {
    pub fn new(sources: Vec<Box<dyn LifecycleSource>>) -> Self {
        Self { sources }
    }
}

impl LifecycleSource for CombinedLifecycle {
    fn subscribe(&self, handler: LifecycleHandler) -> Result<Subscription> {
        let subscriptions = self
            .sources
            .iter()
            .map(|source| source.subscribe(handler.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Subscription::new(move || drop(subscriptions)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;

    use super::{
        CombinedLifecycle, LifecycleEvent, LifecycleHandler, LifecycleSource, ManualLifecycle,
    };

    fn recording_handler() -> (LifecycleHandler, Arc<Mutex<Vec<LifecycleEvent>>>) {
        let events = Arc::new(Mutex::new(vec![]));
        let sink = events.clone();
        let handler: LifecycleHandler = Arc::new(move |event| sink.lock().unwrap().push(event));
        (handler, events)
    }

    #[test]
    fn test_manual_lifecycle_delivers_until_unsubscribed() -> Result<()> {
        let lifecycle = ManualLifecycle::new();
        let (handler, events) = recording_handler();

        let subscription = lifecycle.subscribe(handler)?;
        lifecycle.emit(LifecycleEvent::Background);
        lifecycle.emit(LifecycleEvent::Foreground);
        subscription.unsubscribe();
        lifecycle.emit(LifecycleEvent::Background);

        assert_eq!(
            *events.lock().unwrap(),
            vec![LifecycleEvent::Background, LifecycleEvent::Foreground]
        );
        assert_eq!(lifecycle.subscriber_count(), 0);
        Ok(())
    }

    #[test]
    fn test_dropping_subscription_releases_it() -> Result<()> {
        let lifecycle = ManualLifecycle::new();
        let (handler, events) = recording_handler();
        {
            let _subscription = lifecycle.subscribe(handler)?;
            assert_eq!(lifecycle.subscriber_count(), 1);
        }
        lifecycle.emit(LifecycleEvent::Background);
        assert!(events.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn test_combined_lifecycle_releases_every_source() -> Result<()> {
        let first = ManualLifecycle::new();
        let second = ManualLifecycle::new();
        let combined =
            CombinedLifecycle::new(vec![Box::new(first.clone()), Box::new(second.clone())]);
        let (handler, events) = recording_handler();

        let subscription = combined.subscribe(handler)?;
        first.emit(LifecycleEvent::Background);
        second.emit(LifecycleEvent::Foreground);
        assert_eq!(first.subscriber_count(), 1);
        assert_eq!(second.subscriber_count(), 1);

        subscription.unsubscribe();
        assert_eq!(first.subscriber_count(), 0);
        assert_eq!(second.subscriber_count(), 0);
        assert_eq!(events.lock().unwrap().len(), 2);
        Ok(())
    }

    #[test]
    fn test_from_active() {
        assert_eq!(LifecycleEvent::from_active(true), LifecycleEvent::Foreground);
        assert_eq!(LifecycleEvent::from_active(false), LifecycleEvent::Background);
    }
}
