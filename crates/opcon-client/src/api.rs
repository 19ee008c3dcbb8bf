use crate::config::{ClientConfig, ConfigError};
use crate::session::SessionHandle;
use opcon_core::protocol::{
    ApiEnvelope, AuthCredentials, AuthRequest, AuthResponse, ConfigDocument, ControlFrame,
    MutationAck, ServerStatus,
};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request rejected: unauthorized")]
    Unauthorized,
    #[error("authentication rejected by server")]
    AuthRejected,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    server_status: ServerStatus,
}

/// Client for the synchronous request/response half of the admin API.
/// Attaches the session token to every request; a 401 tears the session
/// down before surfacing the error.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    cfg: ClientConfig,
    session: SessionHandle,
}

impl ApiClient {
    pub fn new(cfg: ClientConfig, session: SessionHandle) -> Self {
        Self {
            http: Client::new(),
            cfg,
            session,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let request = match self.session.bearer().await {
            Some(token) => request.header(header::AUTHORIZATION, token),
            None => request,
        };
        let response = request.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(event = "api_unauthorized");
            self.session.invalidate().await;
            return Err(ApiError::Unauthorized);
        }
        let envelope: ApiEnvelope<T> = response.json().await?;
        Ok(envelope.response)
    }

    /// POST `/api/auth`; on success the session holds the issued token.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let body = AuthRequest {
            auth: AuthCredentials {
                username: username.to_string(),
                password: password.to_string(),
            },
        };
        let url = self.cfg.api_url("/api/auth")?;
        let result: Result<AuthResponse, ApiError> =
            self.send(self.http.post(url).json(&body)).await;
        match result {
            Ok(AuthResponse { token: Some(token) }) => {
                self.session.authenticate(username, &token).await;
                Ok(())
            }
            Ok(AuthResponse { token: None }) => {
                self.session.invalidate().await;
                Err(ApiError::AuthRejected)
            }
            Err(err) => {
                self.session.invalidate().await;
                Err(err)
            }
        }
    }

    pub async fn config(&self) -> Result<ConfigDocument, ApiError> {
        let url = self.cfg.api_url("/api/config")?;
        self.send(self.http.get(url)).await
    }

    pub async fn update_config(&self, config: Value) -> Result<MutationAck, ApiError> {
        let url = self.cfg.api_url("/api/config")?;
        let body = serde_json::json!({ "config": config });
        self.send(self.http.put(url).json(&body)).await
    }

    pub async fn status(&self) -> Result<ServerStatus, ApiError> {
        let url = self.cfg.api_url("/api/status")?;
        let response: StatusResponse = self.send(self.http.get(url)).await?;
        Ok(response.server_status)
    }

    /// Synchronous command path: GET `/api/control?command=<cmd>`.
    pub async fn control(&self, command: &str) -> Result<ControlFrame, ApiError> {
        let url = self.cfg.api_url("/api/control")?;
        debug!(event = "control_sync_call", command = command);
        self.send(self.http.get(url).query(&[("command", command)]))
            .await
    }

    pub async fn account(&self) -> Result<Value, ApiError> {
        let url = self.cfg.api_url("/api/account")?;
        self.send(self.http.get(url)).await
    }

    pub async fn add_account(&self, account: Value) -> Result<MutationAck, ApiError> {
        let url = self.cfg.api_url("/api/account")?;
        let body = serde_json::json!({ "account": account });
        self.send(self.http.post(url).json(&body)).await
    }
}
