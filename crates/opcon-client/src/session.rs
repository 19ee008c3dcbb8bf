use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Token value attached to requests when nobody is authenticated.
pub const ANONYMOUS_TOKEN: &str = "none";

#[derive(Debug, Default)]
struct Session {
    username: Option<String>,
    token: Option<String>,
}

/// Shared authentication context, cloned into every task that issues
/// requests or opens channels. Only [`SessionHandle::authenticate`] and
/// [`SessionHandle::invalidate`] mutate it.
#[derive(Clone, Debug, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn authenticate(&self, username: &str, token: &str) {
        let mut session = self.inner.write().await;
        session.username = Some(username.to_string());
        session.token = Some(token.to_string());
        info!(event = "session_authenticated", username = username);
    }

    pub async fn invalidate(&self) {
        let mut session = self.inner.write().await;
        let had_user = session.username.take().is_some();
        session.token = None;
        if had_user {
            info!(event = "session_invalidated");
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.token.is_some()
    }

    pub async fn username(&self) -> Option<String> {
        self.inner.read().await.username.clone()
    }

    /// Raw token for the Authorization header, if any.
    pub async fn bearer(&self) -> Option<String> {
        self.inner.read().await.token.clone()
    }

    /// Token value for channel connect URLs; unauthenticated sessions
    /// connect with the literal `"none"`.
    pub async fn token_query(&self) -> String {
        self.inner
            .read()
            .await
            .token
            .clone()
            .unwrap_or_else(|| ANONYMOUS_TOKEN.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unauthenticated_session_queries_as_none() {
        let session = SessionHandle::new();
        assert!(!session.is_authenticated().await);
        assert_eq!(session.token_query().await, "none");
        assert!(session.bearer().await.is_none());
    }

    #[tokio::test]
    async fn authenticate_then_invalidate_round_trip() {
        let session = SessionHandle::new();
        session.authenticate("admin", "tok-123").await;
        assert!(session.is_authenticated().await);
        assert_eq!(session.username().await.as_deref(), Some("admin"));
        assert_eq!(session.token_query().await, "tok-123");

        session.invalidate().await;
        assert!(!session.is_authenticated().await);
        assert_eq!(session.token_query().await, "none");
    }
}
