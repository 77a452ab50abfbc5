//! Screen time bookkeeping. [ScreenTimeTracker] owns the [TrackerState] and derives the elapsed
//! time on demand, [init] wires it to a store, a lifecycle source and a notifier.
//!
//! Every mutation happens under one lock, so `resumed_at_ms` and `accumulated_seconds` are
//! never observed half updated. Persistence is queued while the lock is held, which keeps the
//! stored order equal to the mutation order, and written by a [PersistenceWorker] without
//! blocking the caller.

pub mod persistence;
pub mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use persistence::{PersistCommand, PersistenceWorker};
use state::{DowntimePolicy, TrackerState, TrackerStatus};
use tokio::{
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    lifecycle::{LifecycleEvent, LifecycleHandler, LifecycleSource, Subscription},
    notify::Notifier,
    storage::{entities::parse_tracker_state, PersistentStore},
    utils::{clock::Clock, time::format_clock},
};

pub const DEFAULT_STORAGE_KEY: &str = "screen_time_data";
pub const DEFAULT_NOTIFICATION_ID: u32 = 1;
pub const DEFAULT_NOTIFICATION_TITLE: &str = "Screen Time";

#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub storage_key: String,
    pub downtime_policy: DowntimePolicy,
    pub notification_id: u32,
    pub notification_title: String,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.into(),
            downtime_policy: DowntimePolicy::default(),
            notification_id: DEFAULT_NOTIFICATION_ID,
            notification_title: DEFAULT_NOTIFICATION_TITLE.into(),
        }
    }
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    clock: Arc<dyn Clock>,
    notifier: Box<dyn Notifier>,
    persistence: Mutex<Option<UnboundedSender<PersistCommand>>>,
    options: TrackerOptions,
}

/// Cheap to clone, all clones share the same state.
#[derive(Clone)]
pub struct ScreenTimeTracker {
    inner: Arc<TrackerInner>,
}

impl ScreenTimeTracker {
    /// Tracker with default state that isn't connected to any store. Mutations only live in
    /// memory until persistence is attached by [init].
    pub fn detached(
        clock: Arc<dyn Clock>,
        notifier: Box<dyn Notifier>,
        options: TrackerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState::default()),
                clock,
                notifier,
                persistence: Mutex::new(None),
                options,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        // The state is plain data that is never left half written, so a poisoned lock is
        // still usable.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    /// Queues a command for the persistence worker. Must be called with the state lock held.
    fn persist(&self, command: PersistCommand) {
        let persistence = self
            .inner
            .persistence
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match persistence.as_ref() {
            Some(sender) => {
                if let Err(e) = sender.send(command) {
                    warn!("Persistence worker is gone, dropping {:?}", e.0);
                }
            }
            None => debug!("Persistence is closed, keeping {command:?} in memory only"),
        }
    }

    /// Applies `update` and persists the result when it changed anything.
    fn mutate(&self, action: &str, update: impl FnOnce(&mut TrackerState, i64)) -> TrackerState {
        let mut state = self.lock_state();
        let now = self.now_ms();
        let before = *state;
        update(&mut *state, now);
        let after = *state;
        if before != after {
            debug!("{action}: {before:?} -> {after:?}");
            self.persist(PersistCommand::Save(after));
        }
        after
    }

    pub fn start(&self) {
        info!("Starting timer");
        self.mutate("start", TrackerState::start);
        self.refresh_notification();
    }

    pub fn stop(&self) {
        info!("Stopping timer");
        self.mutate("stop", TrackerState::stop);
        self.cancel_notification();
    }

    /// Clears everything and purges the stored state. Storage failures are only logged.
    pub fn reset(&self) {
        info!("Resetting timer");
        {
            let mut state = self.lock_state();
            *state = TrackerState::default();
            self.persist(PersistCommand::Remove);
        }
        self.cancel_notification();
    }

    /// Seconds counted so far, including the open segment. Never mutates.
    pub fn elapsed(&self) -> u64 {
        let now = self.now_ms();
        self.lock_state().elapsed(now)
    }

    pub fn on_foreground(&self) {
        let state = self.mutate("foreground", TrackerState::resume);
        if state.is_active {
            self.refresh_notification();
        }
    }

    pub fn on_background(&self) {
        let state = self.mutate("background", TrackerState::pause);
        if state.is_active {
            self.refresh_notification();
        }
    }

    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Foreground => self.on_foreground(),
            LifecycleEvent::Background => self.on_background(),
        }
    }

    pub fn snapshot(&self) -> TrackerState {
        *self.lock_state()
    }

    pub fn status(&self) -> TrackerStatus {
        self.lock_state().status()
    }

    /// Shows or updates the ongoing notification with the current elapsed time. Does nothing
    /// while the timer is stopped.
    pub fn refresh_notification(&self) {
        let now = self.now_ms();
        let (state, elapsed) = {
            let state = self.lock_state();
            (*state, state.elapsed(now))
        };
        if !state.is_active {
            return;
        }

        let mut body = format_clock(elapsed);
        if state.is_paused {
            body.push_str(" (paused)");
        }
        let options = &self.inner.options;
        if let Err(e) =
            self.inner
                .notifier
                .schedule(options.notification_id, &options.notification_title, &body)
        {
            warn!("Failed to show notification {e:?}");
        }
    }

    fn cancel_notification(&self) {
        if let Err(e) = self
            .inner
            .notifier
            .cancel(self.inner.options.notification_id)
        {
            warn!("Failed to cancel notification {e:?}");
        }
    }

    /// Replaces the state with one read from the store and reconciles a timer that was
    /// running when the process exited.
    fn restore(&self, blob: &str) {
        let Some(mut loaded) = parse_tracker_state(blob) else {
            return;
        };
        let now = self.now_ms();
        loaded.reconcile(now, self.inner.options.downtime_policy);
        info!("Restored tracker state {loaded:?}");

        let mut state = self.lock_state();
        *state = loaded;
        self.persist(PersistCommand::Save(loaded));
    }

    fn attach_persistence(&self, sender: UnboundedSender<PersistCommand>) {
        *self
            .inner
            .persistence
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    /// Drops the queue sender so that the worker finishes once the queue is drained.
    fn close_persistence(&self) {
        self.inner
            .persistence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Owns everything [init] acquired. Call [TrackerSession::dispose] to release it.
pub struct TrackerSession {
    tracker: ScreenTimeTracker,
    subscription: Option<Subscription>,
    worker: JoinHandle<()>,
}

impl TrackerSession {
    pub fn tracker(&self) -> &ScreenTimeTracker {
        &self.tracker
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Releases the lifecycle subscription and waits until queued writes reach the store.
    pub async fn dispose(self) {
        let TrackerSession {
            tracker,
            subscription,
            worker,
        } = self;
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        tracker.close_persistence();
        if let Err(e) = worker.await {
            error!("Persistence worker failed {e:?}");
        }
        debug!("Tracker disposed");
    }
}

/// Loads the tracker from `store`, starts persisting into it and subscribes to `lifecycle`.
/// Storage and subscription failures are logged, the tracker then works from defaults or
/// without lifecycle events.
pub async fn init(
    store: Box<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    lifecycle: &dyn LifecycleSource,
    notifier: Box<dyn Notifier>,
    options: TrackerOptions,
) -> TrackerSession {
    let key = options.storage_key.clone();
    let tracker = ScreenTimeTracker::detached(clock, notifier, options);

    let stored = store.get(&key).await.unwrap_or_else(|e| {
        error!("Failed to load saved timer data {e:?}");
        None
    });

    let (sender, receiver) = mpsc::unbounded_channel();
    tracker.attach_persistence(sender);
    let worker = tokio::spawn(PersistenceWorker::new(receiver, store, key).run());

    if let Some(blob) = stored {
        tracker.restore(&blob);
        tracker.refresh_notification();
    }

    let handle = tracker.clone();
    let handler: LifecycleHandler = Arc::new(move |event| handle.handle_lifecycle(event));
    let subscription = lifecycle
        .subscribe(handler)
        .inspect_err(|e| error!("Failed to subscribe to lifecycle events {e:?}"))
        .ok();

    TrackerSession {
        tracker,
        subscription,
        worker,
    }
}
