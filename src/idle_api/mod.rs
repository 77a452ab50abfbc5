//! Contains logic for reading user idle time in different environments.
//! [GenericIdleSource] is the main artifact of this module that abstracts the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;

/// Intended to serve as a contract windows and linux systems must implement.
#[cfg_attr(test, mockall::automock)]
pub trait IdleSource: Send {
    /// Retrieve amount of time user has been inactive in milliseconds
    fn get_idle_time(&mut self) -> Result<u32>;
}

/// Serves as a cross-compatible IdleSource implementation.
pub struct GenericIdleSource {
    inner: Box<dyn IdleSource>,
}

impl GenericIdleSource {
    /// Fails when no idle backend was compiled in, callers are expected to continue without
    /// idle detection.
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsIdleSource;
                Ok(Self {
                    inner: Box::new(WindowsIdleSource::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::X11IdleSource;
                Ok(Self {
                    inner: Box::new(X11IdleSource::new()?),
                })
            }
            else {
                Err(anyhow::anyhow!("No idle source was compiled in, enable the `x11` or `win` feature"))
            }
        }
    }
}

impl IdleSource for GenericIdleSource {
    fn get_idle_time(&mut self) -> Result<u32> {
        self.inner.get_idle_time()
    }
}
