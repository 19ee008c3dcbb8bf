use crate::channel::{ChannelEvent, ChannelHandle};
use crate::config::{ClientConfig, ConfigError, CONSOLE_PATH};
use crate::poller::StatusPoller;
use crate::session::SessionHandle;
use crate::sink::SinkHandle;
use opcon_core::transcript::LineClass;
use tokio::sync::watch;
use tracing::info;

const CONNECTED_NOTICE: &str = "[Console Channel Connected]";
const CLOSED_NOTICE: &str = "[Console Channel Closed]";

/// The always-open passive feed of server log output. Opened once per
/// session; when it closes, the task ends without reconnecting.
///
/// While the latest status snapshot shows no running server process, each
/// incoming line triggers a status refresh so the view catches the
/// process appearing.
pub async fn run_console_feed(
    cfg: ClientConfig,
    session: SessionHandle,
    sink: SinkHandle,
    poller: StatusPoller,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConfigError> {
    let query = format!("token={}", session.token_query().await);
    let url = cfg.channel_url(CONSOLE_PATH, &query)?;
    info!(event = "console_feed_connecting", url = %url);
    let (handle, mut events) = ChannelHandle::open(url);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    handle.close();
                    break;
                }
            }
            event = events.recv() => {
                if apply_feed_event(event, &sink, &poller).await {
                    return Ok(());
                }
            }
        }
    }

    // Drain until the closed notice lands.
    loop {
        let event = events.recv().await;
        if apply_feed_event(event, &sink, &poller).await {
            return Ok(());
        }
    }
}

/// Apply one feed event to the sink and poller. Returns true once the
/// feed is closed.
pub async fn apply_feed_event(
    event: Option<ChannelEvent>,
    sink: &SinkHandle,
    poller: &StatusPoller,
) -> bool {
    match event {
        Some(ChannelEvent::Opened) => {
            sink.append(CONNECTED_NOTICE, LineClass::Info).await;
            false
        }
        Some(ChannelEvent::Message(text)) => {
            sink.append(text, LineClass::Info).await;
            let snapshot = poller.snapshot();
            if let Some(status) = snapshot.status {
                if !status.process_running() {
                    poller.refresh().await;
                }
            }
            false
        }
        Some(ChannelEvent::Closed) | None => {
            sink.append(CLOSED_NOTICE, LineClass::Info).await;
            info!(event = "console_feed_closed");
            true
        }
    }
}
