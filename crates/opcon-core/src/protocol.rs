use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Every HTTP body and control frame the server emits is wrapped in a
/// single-key `{"response": ...}` object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiEnvelope<T> {
    pub response: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthRequest {
    pub auth: AuthCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// One structured frame on the command channel, or the body of a
/// synchronous control call. A stream is zero or more `CONTINUE` frames
/// followed by one terminal frame, then a close.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ControlFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// `status == "CONTINUE"`: more frames follow before the close.
    Progress,
    /// `status == "OK"`: the last frame of the stream.
    Terminal,
    /// An error field is present.
    Error,
    /// None of the known fields matched.
    Unrecognized,
}

impl ControlFrame {
    pub fn classify(&self) -> FrameKind {
        if self.error.is_some() || self.error_description.is_some() {
            return FrameKind::Error;
        }
        match self.status.as_deref() {
            Some("CONTINUE") => FrameKind::Progress,
            Some("OK") => FrameKind::Terminal,
            _ => FrameKind::Unrecognized,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status.as_deref(), Some("OK") | Some("CONTINUE"))
    }
}

/// Server status snapshot, replaced wholesale on each poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerStatus {
    #[serde(default)]
    pub server_pid: Option<i64>,
    #[serde(default)]
    pub num_accounts: i64,
    #[serde(default)]
    pub account: Option<AccountInfo>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl ServerStatus {
    pub fn process_running(&self) -> bool {
        self.server_pid.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountInfo {
    #[serde(default)]
    pub admin_level: i64,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

/// Server configuration document. The config tree itself is opaque to the
/// console; only the error passthrough fields are interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigDocument {
    #[serde(default)]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRequest {
    pub account: Value,
}

/// Acknowledgement shape shared by config PUT and account POST.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MutationAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Parse an enveloped payload out of raw frame text.
pub fn parse_envelope<T: DeserializeOwned>(raw: &str) -> Result<T, ProtocolError> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_str(raw).map_err(|err| ProtocolError::Malformed(err.to_string()))?;
    Ok(envelope.response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frame_classifies_continue_and_ok() {
        let progress: ControlFrame =
            serde_json::from_str(r#"{"status":"CONTINUE","output":"step1"}"#).expect("parse");
        assert_eq!(progress.classify(), FrameKind::Progress);
        assert!(progress.is_ok());

        let terminal: ControlFrame =
            serde_json::from_str(r#"{"status":"OK","output":"done"}"#).expect("parse");
        assert_eq!(terminal.classify(), FrameKind::Terminal);
    }

    #[test]
    fn control_frame_error_fields_win_over_status() {
        let frame: ControlFrame = serde_json::from_str(
            r#"{"status":"OK","error":"E1","error_description":"broken pipe"}"#,
        )
        .expect("parse");
        assert_eq!(frame.classify(), FrameKind::Error);
    }

    #[test]
    fn parse_envelope_unwraps_response_key() {
        let frame: ControlFrame =
            parse_envelope(r#"{"response":{"status":"OK","output":"5 accounts\n"}}"#)
                .expect("parse");
        assert_eq!(frame.output.as_deref(), Some("5 accounts\n"));
    }

    #[test]
    fn parse_envelope_rejects_bare_payload() {
        let result = parse_envelope::<ControlFrame>(r#"{"status":"OK"}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn server_status_tolerates_missing_fields_and_keeps_extras() {
        let status: ServerStatus = serde_json::from_str(
            r#"{"num_accounts":2,"account":{"admin_level":15},"uptime":"3h"}"#,
        )
        .expect("parse");
        assert!(!status.process_running());
        assert_eq!(status.num_accounts, 2);
        assert_eq!(
            status.account.as_ref().map(|a| a.admin_level),
            Some(15)
        );
        assert_eq!(status.extra.get("uptime"), Some(&Value::from("3h")));
    }

    #[test]
    fn auth_request_serializes_nested_auth_object() {
        let request = AuthRequest {
            auth: AuthCredentials {
                username: "admin".to_string(),
                password: "secret".to_string(),
            },
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["auth"]["username"], "admin");
        assert_eq!(json["auth"]["password"], "secret");
    }
}
