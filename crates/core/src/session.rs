//! Time-windowed login cache for backends that need a session.
//!
//! The cache remembers whether the last verification or login succeeded and
//! for how long that answer may be trusted. The network work itself is
//! provided by the backend through [`LoginFlow`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::BackendError;
use crate::metrics::LOGIN_ATTEMPTS;

/// Site-specific login steps.
#[async_trait]
pub trait LoginFlow: Send + Sync {
    /// Whether credentials are configured at all.
    fn has_credentials(&self) -> bool;

    /// Cheap request against an authenticated-only page.
    async fn verify(&self) -> Result<bool, BackendError>;

    /// Submit the login form.
    async fn login(&self) -> Result<(), BackendError>;
}

/// Snapshot of the cached session status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub authenticated: bool,
    pub last_verified_at: Option<Instant>,
}

/// Per-backend session cache.
#[derive(Debug)]
pub struct SessionCache {
    backend: String,
    validity: Duration,
    state: RwLock<SessionState>,
}

impl SessionCache {
    pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(600);

    pub fn new(backend: impl Into<String>, validity: Duration) -> Self {
        Self {
            backend: backend.into(),
            validity,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Whether a successful check happened within the validity window.
    pub async fn is_fresh(&self) -> bool {
        let state = self.state.read().await;
        match (state.authenticated, state.last_verified_at) {
            (true, Some(at)) => at.elapsed() < self.validity,
            _ => false,
        }
    }

    /// Forget the cached status.
    pub async fn invalidate(&self) {
        *self.state.write().await = SessionState::default();
    }

    /// Make sure the backend has a usable session.
    ///
    /// Uses the cached status while it is fresh. Otherwise verifies the
    /// current cookies and logs in only if verification fails.
    pub async fn ensure_logged_in<F>(&self, flow: &F) -> Result<(), BackendError>
    where
        F: LoginFlow + ?Sized,
    {
        if !flow.has_credentials() {
            return Ok(());
        }

        if self.is_fresh().await {
            debug!(backend = %self.backend, "Session still fresh, skipping verification");
            LOGIN_ATTEMPTS
                .with_label_values(&[&self.backend, "cached"])
                .inc();
            return Ok(());
        }

        match self.refresh(flow).await {
            Ok(result) => {
                self.store(true).await;
                LOGIN_ATTEMPTS
                    .with_label_values(&[&self.backend, result])
                    .inc();
                Ok(())
            }
            Err(e) => {
                self.store(false).await;
                LOGIN_ATTEMPTS
                    .with_label_values(&[&self.backend, "failed"])
                    .inc();
                warn!(backend = %self.backend, error = %e, "Login failed");
                Err(e)
            }
        }
    }

    async fn refresh<F>(&self, flow: &F) -> Result<&'static str, BackendError>
    where
        F: LoginFlow + ?Sized,
    {
        if flow.verify().await? {
            debug!(backend = %self.backend, "Existing session verified");
            return Ok("verified");
        }
        login_and_verify(flow).await?;
        info!(backend = %self.backend, "Logged in");
        Ok("logged_in")
    }

    async fn store(&self, authenticated: bool) {
        let mut state = self.state.write().await;
        *state = SessionState {
            authenticated,
            last_verified_at: authenticated.then(Instant::now),
        };
    }
}

/// Full login followed by a verification request, bypassing any cache.
pub async fn login_and_verify<F>(flow: &F) -> Result<(), BackendError>
where
    F: LoginFlow + ?Sized,
{
    flow.login().await?;
    if !flow.verify().await? {
        return Err(BackendError::Auth(
            "login failed (logout link not found)".to_string(),
        ));
    }
    Ok(())
}
