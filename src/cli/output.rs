use ansi_term::Colour;

use crate::{
    overlay::OverlaySettings,
    tracker::{state::TrackerStatus, DEFAULT_NOTIFICATION_TITLE},
    utils::time::{format_clock, format_compact, format_summary},
};

/// Greyscale ramp of the 256 colour palette, darkest first.
const GREYSCALE_START: u8 = 232;
const GREYSCALE_LEVELS: u8 = 24;

fn status_text(status: TrackerStatus) -> &'static str {
    match status {
        TrackerStatus::Stopped => "Stopped",
        TrackerStatus::Running => "Active",
        TrackerStatus::Paused => "Paused",
    }
}

fn status_colour(status: TrackerStatus) -> Colour {
    match status {
        TrackerStatus::Stopped => Colour::Red,
        TrackerStatus::Running => Colour::Green,
        TrackerStatus::Paused => Colour::Yellow,
    }
}

/// One line readout such as `Active 01:02:03 (1h 2m)`.
pub fn render_status(status: TrackerStatus, elapsed: u64, colored: bool) -> String {
    let text = status_text(status);
    let label = if colored {
        status_colour(status).bold().paint(text).to_string()
    } else {
        text.to_string()
    };
    format!(
        "{label} {} ({})",
        format_clock(elapsed),
        format_summary(elapsed)
    )
}

/// Small readout like `Screen Time 01:02`. A lower opacity draws it in a darker grey.
pub fn render_overlay(settings: &OverlaySettings, elapsed: u64, colored: bool) -> String {
    let line = format!("{DEFAULT_NOTIFICATION_TITLE} {}", format_compact(elapsed));
    if !colored {
        return line;
    }
    let shade = (f64::from(GREYSCALE_LEVELS - 1) * settings.opacity.as_fraction()).round() as u8;
    Colour::Fixed(GREYSCALE_START + shade).paint(line).to_string()
}
