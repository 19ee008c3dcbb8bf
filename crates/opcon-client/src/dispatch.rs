use crate::api::ApiClient;
use crate::channel::{ChannelEvent, ChannelHandle};
use crate::config::{ClientConfig, CONTROL_PATH};
use crate::poller::StatusPoller;
use crate::sink::SinkHandle;
use chrono::Local;
use opcon_core::coordinator::{Coordinator, DispatchAction};
use opcon_core::protocol::ControlFrame;
use opcon_core::transcript::ConsoleLine;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

/// One operator submission. `send_text` is only consulted by the second
/// phase of the `send` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    pub send_text: String,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            send_text: String::new(),
        }
    }

    pub fn with_text(command: impl Into<String>, send_text: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            send_text: send_text.into(),
        }
    }
}

/// Runtime half of the command coordinator. Owns at most one live
/// command channel or one outstanding synchronous call, mirroring the
/// state machine's single busy slot 1:1. Runs as its own task so a
/// submission arriving mid-command is rejected immediately instead of
/// queued behind the in-flight work.
pub struct CommandDispatcher {
    coordinator: Coordinator,
    api: ApiClient,
    cfg: ClientConfig,
    sink: SinkHandle,
    poller: StatusPoller,
    command_channel: Option<(ChannelHandle, mpsc::Receiver<ChannelEvent>)>,
    sync_pending: Option<oneshot::Receiver<Result<ControlFrame, String>>>,
}

impl CommandDispatcher {
    pub fn new(api: ApiClient, cfg: ClientConfig, sink: SinkHandle, poller: StatusPoller) -> Self {
        Self {
            coordinator: Coordinator::new(),
            api,
            cfg,
            sink,
            poller,
            command_channel: None,
            sync_pending: None,
        }
    }

    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<CommandRequest>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                request = requests.recv() => {
                    match request {
                        Some(request) => self.on_request(request).await,
                        None => break,
                    }
                }
                event = next_channel_event(&mut self.command_channel),
                    if self.command_channel.is_some() =>
                {
                    self.on_channel_event(event).await;
                }
                result = next_sync_result(&mut self.sync_pending),
                    if self.sync_pending.is_some() =>
                {
                    self.on_sync_result(result).await;
                }
            }
        }

        if let Some((handle, _)) = self.command_channel.take() {
            handle.close();
        }
    }

    async fn on_request(&mut self, request: CommandRequest) {
        let submission =
            self.coordinator
                .submit(&request.command, &request.send_text, Local::now());
        self.emit(submission.lines).await;

        match submission.action {
            None => {}
            Some(DispatchAction::OpenChannel {
                command,
                wire_command,
            }) => {
                let query = format!(
                    "websocket=1&command={}&token={}",
                    wire_command,
                    self.api.session().token_query().await
                );
                match self.cfg.channel_url(CONTROL_PATH, &query) {
                    Ok(url) => {
                        debug!(event = "command_channel_opening", command = %command);
                        self.command_channel = Some(ChannelHandle::open(url));
                    }
                    Err(err) => {
                        // No connection ever existed; surface the failure
                        // and synthesize the terminal transition so the
                        // slot is released.
                        warn!(event = "command_url_error", command = %command, error = %err);
                        let outcome = self.coordinator.handle_open_failure(&err.to_string());
                        self.emit(outcome.lines).await;
                    }
                }
            }
            Some(DispatchAction::CallSync { command }) => {
                let api = self.api.clone();
                let (tx, rx) = oneshot::channel();
                tokio::spawn(async move {
                    let result = api
                        .control(&command)
                        .await
                        .map_err(|err| err.to_string());
                    let _ = tx.send(result);
                });
                self.sync_pending = Some(rx);
            }
        }
    }

    async fn on_channel_event(&mut self, event: Option<ChannelEvent>) {
        match event {
            Some(ChannelEvent::Opened) => {
                debug!(event = "command_channel_open");
            }
            Some(ChannelEvent::Message(text)) => {
                let lines = self.coordinator.handle_frame(&text);
                self.emit(lines).await;
            }
            Some(ChannelEvent::Closed) | None => {
                if let Some((handle, _)) = self.command_channel.take() {
                    handle.close();
                }
                let outcome = self.coordinator.handle_close();
                self.emit(outcome.lines).await;
            }
        }
    }

    async fn on_sync_result(
        &mut self,
        received: Result<Result<ControlFrame, String>, oneshot::error::RecvError>,
    ) {
        self.sync_pending = None;
        let result = match received {
            Ok(result) => result,
            Err(err) => Err(err.to_string()),
        };
        let outcome = self.coordinator.handle_sync_result(result);
        self.emit(outcome.lines).await;
        if outcome.refresh_status {
            self.poller.refresh().await;
        }
    }

    async fn emit(&self, lines: Vec<ConsoleLine>) {
        for line in lines {
            self.sink.append(line.text, line.class).await;
        }
    }
}

async fn next_channel_event(
    slot: &mut Option<(ChannelHandle, mpsc::Receiver<ChannelEvent>)>,
) -> Option<ChannelEvent> {
    match slot {
        Some((_, events)) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_sync_result(
    slot: &mut Option<oneshot::Receiver<Result<ControlFrame, String>>>,
) -> Result<Result<ControlFrame, String>, oneshot::error::RecvError> {
    match slot {
        Some(receiver) => receiver.await,
        None => std::future::pending().await,
    }
}
