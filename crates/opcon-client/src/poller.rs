use crate::api::ApiClient;
use opcon_core::protocol::ServerStatus;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Latest poll result. The error string is sticky: it stays set until a
/// later refresh succeeds, and a failed refresh keeps the previous
/// status value rather than clearing it.
#[derive(Clone, Debug, Default)]
pub struct StatusSnapshot {
    pub status: Option<ServerStatus>,
    pub error: Option<String>,
}

/// Fetches server status on demand and publishes the snapshot over a
/// watch channel. Never retries on its own; callers decide when to
/// re-invoke.
#[derive(Clone)]
pub struct StatusPoller {
    api: ApiClient,
    tx: Arc<watch::Sender<StatusSnapshot>>,
}

impl StatusPoller {
    pub fn new(api: ApiClient) -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self {
            api,
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    /// Fetch once. Failures surface in the snapshot, never as an error.
    pub async fn refresh(&self) -> StatusSnapshot {
        let snapshot = match self.api.status().await {
            Ok(status) => {
                debug!(
                    event = "status_refreshed",
                    server_pid = status.server_pid.unwrap_or_default(),
                    num_accounts = status.num_accounts,
                );
                StatusSnapshot {
                    status: Some(status),
                    error: None,
                }
            }
            Err(err) => {
                warn!(event = "status_refresh_failed", error = %err);
                StatusSnapshot {
                    status: self.tx.borrow().status.clone(),
                    error: Some(format!("/api/status call failed: {err}")),
                }
            }
        };
        self.tx.send_replace(snapshot.clone());
        snapshot
    }
}
