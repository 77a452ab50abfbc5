use std::{io::Write, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    idle_api::GenericIdleSource,
    lifecycle::{
        idle::{IdleLifecycle, DEFAULT_POLL_INTERVAL},
        CombinedLifecycle, LifecycleSource,
    },
    notify::{platform_notifier, NoopNotifier, Notifier},
    storage::file_store::FileStore,
    tracker::{init, state::TrackerStatus, ScreenTimeTracker, TrackerOptions},
    utils::clock::{Clock, DefaultClock},
};

use super::{output::render_status, shutdown::detect_shutdown};

const DISPLAY_TICK: Duration = Duration::from_secs(1);

pub struct WatchConfig {
    pub store_dir: PathBuf,
    pub options: TrackerOptions,
    pub idle_threshold: Duration,
    pub notify: bool,
    pub keep_running: bool,
    pub colored: bool,
}

/// Runs the tracker in the foreground until Ctrl-C. The timer is started on launch and, unless
/// `keep_running` is set, stopped on exit.
pub async fn run_watch(config: WatchConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let lifecycle = watch_lifecycle(clock.clone(), config.idle_threshold);
    let notifier: Box<dyn Notifier> = if config.notify {
        platform_notifier()
    } else {
        Box::new(NoopNotifier)
    };

    let session = init(
        Box::new(FileStore::new(config.store_dir)?),
        clock.clone(),
        &lifecycle,
        notifier,
        config.options,
    )
    .await;
    if !session.is_subscribed() {
        warn!("Running without lifecycle events, idle time will be counted");
    }

    let tracker = session.tracker().clone();
    // Whoever launched the watch is at the machine right now.
    match tracker.status() {
        TrackerStatus::Stopped => tracker.start(),
        TrackerStatus::Paused => tracker.on_foreground(),
        TrackerStatus::Running => {}
    }

    let shutdown = CancellationToken::new();
    let mut stdout = std::io::stdout();
    tokio::join!(
        detect_shutdown(shutdown.clone()),
        display_loop(
            &tracker,
            clock.as_ref(),
            &shutdown,
            &mut stdout,
            config.colored
        ),
    );

    if !config.keep_running {
        tracker.stop();
    }
    println!();
    println!("{}", render_status(tracker.status(), tracker.elapsed(), config.colored));
    session.dispose().await;
    Ok(())
}

/// Collects the lifecycle sources available in this build. Missing sources are logged and
/// skipped.
fn watch_lifecycle(clock: Arc<dyn Clock>, idle_threshold: Duration) -> CombinedLifecycle {
    let mut sources: Vec<Box<dyn LifecycleSource>> = vec![];
    match GenericIdleSource::new() {
        Ok(source) => sources.push(Box::new(IdleLifecycle::new(
            Box::new(source),
            clock,
            idle_threshold,
            DEFAULT_POLL_INTERVAL,
        ))),
        Err(e) => warn!("Idle detection is unavailable {e:?}"),
    }
    #[cfg(unix)]
    {
        use crate::lifecycle::signal::SignalLifecycle;
        info!("Send SIGUSR1 to pause and SIGUSR2 to resume the timer");
        sources.push(Box::new(SignalLifecycle));
    }
    CombinedLifecycle::new(sources)
}

/// Redraws the readout once per tick. The tick only reads the tracker; while the timer isn't
/// running the readout is drawn once per status change and the notification is left alone.
async fn display_loop(
    tracker: &ScreenTimeTracker,
    clock: &dyn Clock,
    shutdown: &CancellationToken,
    out: &mut impl Write,
    colored: bool,
) {
    let mut last_status = None;
    let mut tick = clock.instant();
    loop {
        tick += DISPLAY_TICK;
        let status = tracker.status();
        if status == TrackerStatus::Running || last_status != Some(status) {
            let line = render_status(status, tracker.elapsed(), colored);
            if let Err(e) = write!(out, "\r{line}\u{1b}[K").and_then(|_| out.flush()) {
                error!("Failed to draw status {e:?}");
            }
            if status == TrackerStatus::Running {
                tracker.refresh_notification();
            }
            last_status = Some(status);
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Display loop stopped");
                return
            }
            _ = clock.sleep_until(tick) => ()
        }
    }
}
