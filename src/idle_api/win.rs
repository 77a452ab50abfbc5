use anyhow::{anyhow, Result};
use tracing::error;
use windows::Win32::{
    System::SystemInformation::GetTickCount64,
    UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO},
};

use super::IdleSource;

pub fn get_idle_time() -> Result<u32> {
    let mut last: LASTINPUTINFO = LASTINPUTINFO {
        cbSize: size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    let is_success = unsafe { GetLastInputInfo(&mut last) };
    if !is_success.as_bool() {
        return Err(anyhow!("Failed to retrieve user idle time"));
    }

    // dwTime is the low 32 bits of the tick count, so compare in the same width.
    let tick_count = unsafe { GetTickCount64() } as u32;
    Ok(tick_count.wrapping_sub(last.dwTime))
}

pub struct WindowsIdleSource {}

impl WindowsIdleSource {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for WindowsIdleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleSource for WindowsIdleSource {
    fn get_idle_time(&mut self) -> Result<u32> {
        get_idle_time().inspect_err(|e| error!("Failed to get idle time {e:?}"))
    }
}
