use crate::protocol::{parse_envelope, ControlFrame};
use crate::transcript::{ConsoleLine, LineClass};
use chrono::{DateTime, Local, Timelike};

/// Command name that is dispatched as a single request/response pair
/// instead of a streaming channel.
pub const SYNC_COMMAND: &str = "status";
/// Command name that uses the two-phase arm/dispatch protocol.
pub const SEND_COMMAND: &str = "send";

const COMPLETE_NOTICE: &str = "[Command Complete]";
const GENERIC_FAILURE: &str = "API Call Failure.";

/// The single in-flight command slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub name: String,
    /// `HH:MM:SS ` prefix captured once at submission and reused for every
    /// line of this command's lifecycle.
    pub stamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    /// Two-phase `send` armed, waiting for the text argument.
    AwaitingArgument,
    Busy(PendingCommand),
}

/// What the runtime must do to carry out an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    /// Open a streaming command channel. `wire_command` is the composed
    /// command string for the connect URL (arguments included).
    OpenChannel {
        command: String,
        wire_command: String,
    },
    /// Issue the synchronous control call.
    CallSync { command: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub lines: Vec<ConsoleLine>,
    pub action: Option<DispatchAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub lines: Vec<ConsoleLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub lines: Vec<ConsoleLine>,
    pub refresh_status: bool,
}

pub fn format_stamp(now: DateTime<Local>) -> String {
    format!("{:02}:{:02}:{:02} ", now.hour(), now.minute(), now.second())
}

/// The command/console session coordinator.
///
/// Owns the at-most-one-command-in-flight invariant: a submission while
/// `Busy` is rejected with a danger line, never queued. Pure state
/// machine; the runtime executes the returned [`DispatchAction`]s and
/// feeds channel frames, the close event and the synchronous result back
/// in.
#[derive(Debug, Default)]
pub struct Coordinator {
    state: DispatchState,
}

impl Default for DispatchState {
    fn default() -> Self {
        DispatchState::Idle
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, DispatchState::Busy(_))
    }

    /// Submit a command. `send_text` is only consulted for the second
    /// phase of the `send` command.
    pub fn submit(&mut self, command: &str, send_text: &str, now: DateTime<Local>) -> Submission {
        if let DispatchState::Busy(pending) = &self.state {
            return Submission {
                lines: vec![ConsoleLine::new(
                    format!("Waiting for {} to complete.", pending.name),
                    LineClass::Danger,
                )],
                action: None,
            };
        }

        if command == SEND_COMMAND {
            return self.submit_send(send_text, now);
        }

        // A non-send submission abandons an armed send.
        let stamp = format_stamp(now);
        let pending = PendingCommand {
            name: command.to_string(),
            stamp,
        };
        let action = if command == SYNC_COMMAND {
            DispatchAction::CallSync {
                command: command.to_string(),
            }
        } else {
            DispatchAction::OpenChannel {
                command: command.to_string(),
                wire_command: command.to_string(),
            }
        };
        self.state = DispatchState::Busy(pending);
        Submission {
            lines: Vec::new(),
            action: Some(action),
        }
    }

    /// Two-phase send. `submit` has already rejected the busy case, so
    /// the only states left are `Idle` (arm) and `AwaitingArgument`
    /// (dispatch or abort).
    fn submit_send(&mut self, send_text: &str, now: DateTime<Local>) -> Submission {
        if !matches!(self.state, DispatchState::AwaitingArgument) {
            // First phase arms and waits for the argument.
            self.state = DispatchState::AwaitingArgument;
            return Submission {
                lines: Vec::new(),
                action: None,
            };
        }

        if send_text.is_empty() {
            self.state = DispatchState::Idle;
            return Submission {
                lines: vec![ConsoleLine::new(
                    "Missing text to send",
                    LineClass::Danger,
                )],
                action: None,
            };
        }

        let stamp = format_stamp(now);
        self.state = DispatchState::Busy(PendingCommand {
            name: SEND_COMMAND.to_string(),
            stamp,
        });
        Submission {
            lines: Vec::new(),
            action: Some(DispatchAction::OpenChannel {
                command: SEND_COMMAND.to_string(),
                wire_command: format!("{SEND_COMMAND}&arg1={send_text}"),
            }),
        }
    }

    /// Handle one raw frame from the open command channel. Returns the
    /// lines to append; the state stays `Busy` until the close event.
    pub fn handle_frame(&mut self, raw: &str) -> Vec<ConsoleLine> {
        let DispatchState::Busy(pending) = &self.state else {
            return Vec::new();
        };

        let mut lines = Vec::new();
        match parse_envelope::<ControlFrame>(raw) {
            Ok(frame) => {
                if frame.is_ok() {
                    lines.push(ConsoleLine::new(
                        format!(
                            "{}{}>> {}",
                            pending.stamp,
                            pending.name,
                            frame.output.as_deref().unwrap_or_default()
                        ),
                        LineClass::Success,
                    ));
                }
                if frame.error.is_some() || frame.error_description.is_some() {
                    lines.push(ConsoleLine::new(
                        format!(
                            "{}{}>> ERROR: {}",
                            pending.stamp,
                            pending.name,
                            frame.error_description.as_deref().unwrap_or(GENERIC_FAILURE)
                        ),
                        LineClass::Danger,
                    ));
                }
            }
            Err(_) => {
                lines.push(ConsoleLine::new(
                    format!(
                        "{}{}>> ERROR: UNEXPECTED RESPONSE FORMAT: {raw}",
                        pending.stamp, pending.name
                    ),
                    LineClass::Danger,
                ));
            }
        }
        lines
    }

    /// Handle the command channel close event. The sole terminal signal
    /// for a streaming command; transitions back to `Idle` exactly once.
    pub fn handle_close(&mut self) -> CloseOutcome {
        let DispatchState::Busy(pending) = &self.state else {
            return CloseOutcome { lines: Vec::new() };
        };
        let line = ConsoleLine::new(
            format!("{}{}>> {COMPLETE_NOTICE}", pending.stamp, pending.name),
            LineClass::Success,
        );
        self.state = DispatchState::Idle;
        CloseOutcome { lines: vec![line] }
    }

    /// Abort a streaming command whose channel never opened. The failure
    /// surfaces as a danger line, then the slot is released exactly as a
    /// normal close would release it.
    pub fn handle_open_failure(&mut self, reason: &str) -> CloseOutcome {
        let DispatchState::Busy(pending) = &self.state else {
            return CloseOutcome { lines: Vec::new() };
        };
        let failure = ConsoleLine::new(
            format!("{}{}>> ERROR: {reason}", pending.stamp, pending.name),
            LineClass::Danger,
        );
        let mut outcome = self.handle_close();
        outcome.lines.insert(0, failure);
        outcome
    }

    /// Handle the result of the synchronous control call. Always returns
    /// to `Idle` and requests a status refresh, success or not.
    pub fn handle_sync_result(&mut self, result: Result<ControlFrame, String>) -> SyncOutcome {
        let DispatchState::Busy(pending) = &self.state else {
            return SyncOutcome {
                lines: Vec::new(),
                refresh_status: false,
            };
        };

        let line = match result {
            Ok(frame) => match frame.output {
                Some(output) => ConsoleLine::new(
                    format!(
                        "{}{}>> {}",
                        pending.stamp,
                        pending.name,
                        output.strip_suffix('\n').unwrap_or(&output)
                    ),
                    LineClass::Success,
                ),
                None => ConsoleLine::new(
                    format!(
                        "{}{}>> ERROR: {}",
                        pending.stamp,
                        pending.name,
                        frame.error_description.as_deref().unwrap_or(GENERIC_FAILURE)
                    ),
                    LineClass::Danger,
                ),
            },
            Err(_) => ConsoleLine::new(
                format!(
                    "{}{}>> ERROR: {GENERIC_FAILURE}",
                    pending.stamp, pending.name
                ),
                LineClass::Danger,
            ),
        };

        self.state = DispatchState::Idle;
        SyncOutcome {
            lines: vec![line],
            refresh_status: true,
        }
    }
}
