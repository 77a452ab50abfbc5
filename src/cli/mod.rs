pub mod output;
pub mod shutdown;
pub mod watch;

use std::{io::IsTerminal, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use output::{render_overlay, render_status};
use tracing::level_filters::LevelFilter;
use watch::{run_watch, WatchConfig};

use crate::{
    lifecycle::{idle::DEFAULT_IDLE_THRESHOLD, ManualLifecycle},
    notify::NoopNotifier,
    overlay::{Opacity, OverlayPosition, OverlaySettings},
    storage::file_store::FileStore,
    tracker::{init, state::DowntimePolicy, ScreenTimeTracker, TrackerOptions},
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, WATCH_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Flowtimer", version, long_about = None)]
#[command(about = "Screen time tracker that pauses while you are away", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Print logs to the console")]
    log: bool,
    #[arg(long = "log-filter", help = "Log level, defaults to $RUST_LOG or debug")]
    log_filter: Option<LevelFilter>,
    #[arg(
        long,
        help = "Application directory. By default uses $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        help = "When a timer was left running, don't count the time flowtimer wasn't running"
    )]
    discard_downtime: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start the timer")]
    Start,
    #[command(about = "Stop the timer, keeping the counted time")]
    Stop,
    #[command(about = "Stop the timer and forget the counted time")]
    Reset,
    #[command(about = "Show the timer")]
    Status,
    #[command(about = "Pause a running timer, as if the user went away")]
    Background,
    #[command(about = "Resume a paused timer, as if the user came back")]
    Foreground,
    #[command(
        about = "Track in the foreground. Pauses while the user is idle, SIGUSR1/SIGUSR2 pause and resume"
    )]
    Watch {
        #[arg(
            long = "idle-threshold",
            default_value_t = DEFAULT_IDLE_THRESHOLD.as_secs(),
            help = "Seconds without input after which the user is considered away"
        )]
        idle_threshold: u64,
        #[arg(long, help = "Show an ongoing desktop notification")]
        notify: bool,
        #[arg(long = "keep-running", help = "Leave the timer running on exit")]
        keep_running: bool,
    },
    #[command(about = "Show or change the floating overlay settings")]
    Overlay {
        #[arg(long, help = "Move the overlay to the next corner clockwise")]
        cycle: bool,
        #[arg(long, value_enum)]
        position: Option<OverlayPosition>,
        #[arg(long, help = "Opacity in percent, 20 to 100 in steps of 5")]
        opacity: Option<Opacity>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;

    let prefix = match args.commands {
        Commands::Watch { .. } => WATCH_PREFIX,
        _ => CLI_PREFIX,
    };
    let logging_level = match (args.log, args.log_filter) {
        (_, Some(level)) => Some(level),
        (true, None) => Some(LevelFilter::TRACE),
        (false, None) => None,
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    let store_dir = app_dir.join("store");
    let options = TrackerOptions {
        downtime_policy: if args.discard_downtime {
            DowntimePolicy::Discard
        } else {
            DowntimePolicy::Count
        },
        ..Default::default()
    };
    let colored = std::io::stdout().is_terminal();

    match args.commands {
        Commands::Start => run_action(store_dir, options, colored, ScreenTimeTracker::start).await,
        Commands::Stop => run_action(store_dir, options, colored, ScreenTimeTracker::stop).await,
        Commands::Reset => run_action(store_dir, options, colored, ScreenTimeTracker::reset).await,
        Commands::Status => run_action(store_dir, options, colored, |_| {}).await,
        Commands::Background => {
            run_action(store_dir, options, colored, ScreenTimeTracker::on_background).await
        }
        Commands::Foreground => {
            run_action(store_dir, options, colored, ScreenTimeTracker::on_foreground).await
        }
        Commands::Watch {
            idle_threshold,
            notify,
            keep_running,
        } => {
            run_watch(WatchConfig {
                store_dir,
                options,
                idle_threshold: Duration::from_secs(idle_threshold),
                notify,
                keep_running,
                colored,
            })
            .await
        }
        Commands::Overlay {
            cycle,
            position,
            opacity,
        } => run_overlay(store_dir, options, colored, cycle, position, opacity).await,
    }
}

/// Loads the tracker, applies `action`, prints the result and waits for the write to land.
async fn run_action(
    store_dir: PathBuf,
    options: TrackerOptions,
    colored: bool,
    action: impl FnOnce(&ScreenTimeTracker),
) -> Result<()> {
    let session = init(
        Box::new(FileStore::new(store_dir)?),
        Arc::new(DefaultClock),
        &ManualLifecycle::new(),
        Box::new(NoopNotifier),
        options,
    )
    .await;

    let tracker = session.tracker();
    action(tracker);
    println!(
        "{}",
        render_status(tracker.status(), tracker.elapsed(), colored)
    );

    session.dispose().await;
    Ok(())
}

/// Changes the overlay settings and draws the readout with them.
async fn run_overlay(
    store_dir: PathBuf,
    options: TrackerOptions,
    colored: bool,
    cycle: bool,
    position: Option<OverlayPosition>,
    opacity: Option<Opacity>,
) -> Result<()> {
    let store = FileStore::new(store_dir.clone())?;
    let mut settings = OverlaySettings::load(&store).await;

    if cycle {
        settings.position = settings.position.next();
    }
    if let Some(position) = position {
        settings.position = position;
    }
    if let Some(opacity) = opacity {
        settings.opacity = opacity;
    }
    if cycle || position.is_some() || opacity.is_some() {
        settings.save(&store).await?;
    }

    let session = init(
        Box::new(FileStore::new(store_dir)?),
        Arc::new(DefaultClock),
        &ManualLifecycle::new(),
        Box::new(NoopNotifier),
        options,
    )
    .await;
    println!(
        "{}",
        render_overlay(&settings, session.tracker().elapsed(), colored)
    );
    session.dispose().await;

    println!("position\t{}", settings.position);
    println!("opacity\t\t{}", settings.opacity);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Args, Commands};

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_watch() {
        let args = Args::parse_from(["flowtimer", "--discard-downtime", "watch", "--notify"]);
        assert!(args.discard_downtime);
        assert!(matches!(
            args.commands,
            Commands::Watch {
                idle_threshold: 120,
                notify: true,
                keep_running: false
            }
        ));
    }

    #[test]
    fn test_parse_overlay() {
        let args = Args::parse_from([
            "flowtimer",
            "overlay",
            "--position",
            "bottom-left",
            "--opacity",
            "47%",
        ]);
        let Commands::Overlay {
            cycle,
            position,
            opacity,
        } = args.commands
        else {
            panic!("expected overlay command");
        };
        assert!(!cycle);
        assert_eq!(position, Some(crate::overlay::OverlayPosition::BottomLeft));
        assert_eq!(opacity.map(|v| *v), Some(45));
    }
}
