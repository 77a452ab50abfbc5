use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{idle_api::IdleSource, utils::clock::Clock};

use super::{LifecycleEvent, LifecycleHandler, LifecycleSource, Subscription};

pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(60 * 2);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct AfkEvaluator {
    threshold_ms: u32,
}

impl AfkEvaluator {
    pub fn from_duration(threshold: Duration) -> Self {
        Self {
            threshold_ms: u32::try_from(threshold.as_millis()).unwrap_or(u32::MAX),
        }
    }

    pub fn is_afk(&self, idle_time: u32) -> bool {
        self.threshold_ms < idle_time
    }
}

/// Treats the user as backgrounded while they haven't touched the keyboard or mouse for
/// longer than the threshold. Polls the [IdleSource] on a background task per subscription.
pub struct IdleLifecycle {
    source: Arc<Mutex<Box<dyn IdleSource>>>,
    clock: Arc<dyn Clock>,
    threshold: Duration,
    poll_interval: Duration,
}

impl IdleLifecycle {
    pub fn new(
        source: Box<dyn IdleSource>,
        clock: Arc<dyn Clock>,
        threshold: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            clock,
            threshold,
            poll_interval,
        }
    }
}

impl LifecycleSource for IdleLifecycle {
    fn subscribe(&self, handler: LifecycleHandler) -> Result<Subscription> {
        let token = CancellationToken::new();
        let poller = IdlePoller {
            source: self.source.clone(),
            clock: self.clock.clone(),
            evaluator: AfkEvaluator::from_duration(self.threshold),
            poll_interval: self.poll_interval,
            shutdown: token.clone(),
            handler,
        };
        tokio::spawn(poller.run());
        Ok(Subscription::from_token(token))
    }
}

struct IdlePoller {
    source: Arc<Mutex<Box<dyn IdleSource>>>,
    clock: Arc<dyn Clock>,
    evaluator: AfkEvaluator,
    poll_interval: Duration,
    shutdown: CancellationToken,
    handler: LifecycleHandler,
}

impl IdlePoller {
    fn poll_afk(&self) -> Result<bool> {
        let idle_ms = self
            .source
            .lock()
            .map_err(|e| anyhow!("Failed to lock idle source: {e}"))?
            .get_idle_time()?;
        Ok(self.evaluator.is_afk(idle_ms))
    }

    /// Executes the polling loop. Only transitions are reported, the user is assumed to be
    /// present when polling starts.
    async fn run(self) {
        let mut was_afk = false;
        let mut poll_point = self.clock.instant();
        loop {
            poll_point += self.poll_interval;
            match self.poll_afk() {
                Ok(afk) if afk != was_afk => {
                    was_afk = afk;
                    let event = LifecycleEvent::from_active(!afk);
                    info!("User idle state changed, emitting {event:?}");
                    (self.handler)(event);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Encountered an error during idle polling {:?}", e)
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Idle polling stopped");
                    return
                }
                _ = self.clock.sleep_until(poll_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::{anyhow, Result};

    use crate::{
        idle_api::MockIdleSource,
        lifecycle::{LifecycleEvent, LifecycleHandler, LifecycleSource},
        utils::{clock::DefaultClock, logging::TEST_LOGGING},
    };

    use super::{AfkEvaluator, IdleLifecycle};

    fn recording_handler() -> (LifecycleHandler, Arc<Mutex<Vec<LifecycleEvent>>>) {
        let events = Arc::new(Mutex::new(vec![]));
        let sink = events.clone();
        let handler: LifecycleHandler = Arc::new(move |event| sink.lock().unwrap().push(event));
        (handler, events)
    }

    #[test]
    fn test_afk_evaluator() {
        let evaluator = AfkEvaluator::from_duration(Duration::from_secs(120));
        assert!(!evaluator.is_afk(0));
        assert!(!evaluator.is_afk(120_000));
        assert!(evaluator.is_afk(120_001));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_lifecycle_emits_transitions_only() -> Result<()> {
        *TEST_LOGGING;
        let mut idle_values = vec![0, 500, 5_000, 6_000, 7_000, 100, 200].into_iter();
        let mut source = MockIdleSource::new();
        source.expect_get_idle_time().returning(move || {
            idle_values
                .next()
                .ok_or_else(|| anyhow!("no more idle values"))
        });

        let lifecycle = IdleLifecycle::new(
            Box::new(source),
            Arc::new(DefaultClock),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let (handler, events) = recording_handler();
        let subscription = lifecycle.subscribe(handler)?;

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        subscription.unsubscribe();

        assert_eq!(
            *events.lock().unwrap(),
            vec![LifecycleEvent::Background, LifecycleEvent::Foreground]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_lifecycle_stops_polling_after_unsubscribe() -> Result<()> {
        let polls = Arc::new(Mutex::new(0));
        let counter = polls.clone();
        let mut source = MockIdleSource::new();
        source.expect_get_idle_time().returning(move || {
            *counter.lock().unwrap() += 1;
            Ok(0)
        });

        let lifecycle = IdleLifecycle::new(
            Box::new(source),
            Arc::new(DefaultClock),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let (handler, _) = recording_handler();
        let subscription = lifecycle.subscribe(handler)?;

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        subscription.unsubscribe();
        let polled = *polls.lock().unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*polls.lock().unwrap(), polled);
        assert!(polled >= 2);
        Ok(())
    }
}
