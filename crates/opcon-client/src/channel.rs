use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The handshake succeeded. Not emitted when the connection never
    /// opens; the failure is reported as `Closed` alone.
    Opened,
    /// One inbound text frame, in arrival order.
    Message(String),
    /// The connection is gone. Exactly one per handle, graceful or not.
    Closed,
}

/// Owns one streaming connection. Dropping the handle or calling
/// [`ChannelHandle::close`] tears the connection down; `close` is
/// idempotent.
#[derive(Debug)]
pub struct ChannelHandle {
    shutdown: watch::Sender<bool>,
}

impl ChannelHandle {
    /// Spawn the connection task. Events arrive on the returned receiver;
    /// the task ends after it emits `Closed`.
    pub fn open(url: Url) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run_connection(url, events_tx, shutdown_rx));
        (
            Self {
                shutdown: shutdown_tx,
            },
            events_rx,
        )
    }

    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Resolves once a close has been requested or the handle is gone.
async fn close_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn run_connection(
    url: Url,
    events: mpsc::Sender<ChannelEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let connected = tokio::select! {
        () = close_requested(&mut shutdown) => None,
        result = connect_async(url.as_str()) => Some(result),
    };

    match connected {
        None => {}
        Some(Ok((mut ws, _))) => {
            let _ = events.send(ChannelEvent::Opened).await;
            loop {
                tokio::select! {
                    () = close_requested(&mut shutdown) => break,
                    frame = ws.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                let _ = events.send(ChannelEvent::Message(text)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {
                                // Binary and control frames carry nothing
                                // for the console.
                            }
                            Some(Err(err)) => {
                                warn!(event = "channel_read_error", error = %err);
                                break;
                            }
                        }
                    }
                }
            }
            let _ = ws.close(None).await;
        }
        Some(Err(err)) => {
            warn!(event = "channel_connect_error", url = %url, error = %err);
        }
    }
    debug!(event = "channel_closed", url = %url);
    let _ = events.send(ChannelEvent::Closed).await;
}
