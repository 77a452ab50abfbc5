use anyhow::{anyhow, Result};
use tracing::instrument;
use xcb::{
    screensaver::{QueryInfo, QueryInfoReply},
    x::{Drawable, Window},
    Connection,
};

use super::IdleSource;

/// Reads idle time through the X11 screensaver extension.
pub struct X11IdleSource {
    connection: Connection,
    root: Window,
}

impl X11IdleSource {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) =
            Connection::connect_with_extensions(None, &[xcb::Extension::ScreenSaver], &[])?;
        // Currently the application only supports 1 x11 screen.
        let root = connection
            .get_setup()
            .roots()
            .nth(preferred_screen.max(0) as usize)
            .ok_or_else(|| anyhow!("X11 screen {preferred_screen} is missing"))?
            .root();
        Ok(Self { connection, root })
    }
}

impl IdleSource for X11IdleSource {
    #[instrument(skip(self))]
    fn get_idle_time(&mut self) -> Result<u32> {
        let idle = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(self.root),
        });
        let reply: QueryInfoReply = self.connection.wait_for_reply(idle)?;
        Ok(reply.ms_since_user_input())
    }
}
