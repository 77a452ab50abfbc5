use anyhow::Result;
use tokio::{
    select,
    signal::unix::{signal, Signal, SignalKind},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{LifecycleEvent, LifecycleHandler, LifecycleSource, Subscription};

/// Lets other programs (screen lockers, window manager hooks) report transitions.
/// `SIGUSR1` means the user went away, `SIGUSR2` means they came back.
pub struct SignalLifecycle;

impl LifecycleSource for SignalLifecycle {
    fn subscribe(&self, handler: LifecycleHandler) -> Result<Subscription> {
        let background = signal(SignalKind::user_defined1())?;
        let foreground = signal(SignalKind::user_defined2())?;
        let token = CancellationToken::new();
        tokio::spawn(listen(background, foreground, handler, token.clone()));
        Ok(Subscription::from_token(token))
    }
}

async fn listen(
    mut background: Signal,
    mut foreground: Signal,
    handler: LifecycleHandler,
    cancellation: CancellationToken,
) {
    loop {
        let event = select! {
            _ = cancellation.cancelled() => return,
            Some(_) = background.recv() => LifecycleEvent::Background,
            Some(_) = foreground.recv() => LifecycleEvent::Foreground,
            else => return,
        };
        info!("Received signal for {event:?}");
        handler(event);
    }
}
