//! Authentication layer over a `Transport`.
//!
//! Every request gets the current access token. On a 401 the interceptor
//! refreshes the token pair once, no matter how many requests hit the 401
//! at the same time: the first becomes the refresh leader, the rest park in
//! a FIFO queue and are replayed with the new token when the leader
//! finishes. A failed refresh fails the whole queue and logs the session out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{ApiError, ApiRequest, Transport};
use crate::auth::SessionStore;
use crate::models::auth::RefreshRequest;
use crate::models::{unwrap_envelope, TokenPair};

/// Refresh endpoint, relative to the API base
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Default upper bound on a refresh call
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome handed to a parked request: the new access token, or why the
/// refresh failed.
type Continuation = oneshot::Sender<Result<String, String>>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    pending: VecDeque<Continuation>,
}

impl RefreshState {
    /// Resume every parked request in arrival order, then clear the flag
    fn finish(&mut self, outcome: Result<&str, &str>) -> usize {
        let resumed = self.pending.len();
        for continuation in self.pending.drain(..) {
            // A receiver that went away was cancelled by its caller
            let _ = continuation.send(outcome.map(str::to_string).map_err(str::to_string));
        }
        self.in_flight = false;
        resumed
    }
}

pub struct AuthInterceptor {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    refresh: Mutex<RefreshState>,
    refresh_timeout: Duration,
}

impl AuthInterceptor {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self {
            transport,
            session,
            refresh: Mutex::new(RefreshState::default()),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Whether a refresh call is outstanding
    pub fn is_refreshing(&self) -> bool {
        self.state().in_flight
    }

    /// Number of requests parked behind the outstanding refresh
    pub fn pending_len(&self) -> usize {
        self.state().pending.len()
    }

    /// Send `request` with the current access token, recovering from an
    /// expired token by refreshing once and replaying.
    pub async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let token = self.session.access_token();
        match self.transport.send(&request, token.as_deref()).await {
            Err(err) if err.is_unauthorized() && !request.is_retry() => {
                self.recover(request.into_retry(), err).await
            }
            other => other,
        }
    }

    async fn recover(&self, request: ApiRequest, original: ApiError) -> Result<Value, ApiError> {
        let Some(refresh_token) = self.session.refresh_token() else {
            warn!(path = request.path(), "Unauthorized with no refresh token, logging out");
            self.session.logout();
            return Err(original);
        };

        // Check and claim the refresh in one critical section
        let parked = {
            let mut state = self.state();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.pending.push_back(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = parked {
            debug!(path = request.path(), "Refresh in flight, queueing request");
            let token = match rx.await {
                Ok(Ok(token)) => token,
                Ok(Err(reason)) => return Err(ApiError::RefreshFailed(reason)),
                Err(_) => return Err(ApiError::RefreshFailed("refresh abandoned".to_string())),
            };
            return self.transport.send(&request, Some(&token)).await;
        }

        let guard = RefreshGuard {
            refresh: &self.refresh,
            armed: true,
        };
        match self.call_refresh(&refresh_token).await {
            Ok(pair) => {
                self.session
                    .set_tokens(pair.access_token.clone(), pair.refresh_token);
                let resumed = guard.complete(Ok(&pair.access_token));
                info!(resumed, "Session refreshed");
                self.transport.send(&request, Some(&pair.access_token)).await
            }
            Err(err) => {
                let failed = guard.complete(Err(&err.to_string()));
                warn!(error = %err, failed, "Session refresh failed, logging out");
                self.session.logout();
                Err(err)
            }
        }
    }

    /// Exchange the refresh token directly on the transport
    async fn call_refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let body = serde_json::to_value(RefreshRequest { refresh_token })
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let request = ApiRequest::post(REFRESH_PATH, body);

        let response = tokio::time::timeout(self.refresh_timeout, self.transport.send(&request, None))
            .await
            .map_err(|_| ApiError::RefreshTimeout(self.refresh_timeout))??;

        serde_json::from_value(unwrap_envelope(response))
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e)))
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        lock(&self.refresh)
    }
}

fn lock(refresh: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    refresh.lock().unwrap_or_else(|e| e.into_inner())
}

/// Releases the refresh claim. If the leader is dropped mid-refresh the
/// queue is failed so parked requests never wait forever.
struct RefreshGuard<'a> {
    refresh: &'a Mutex<RefreshState>,
    armed: bool,
}

impl RefreshGuard<'_> {
    fn complete(mut self, outcome: Result<&str, &str>) -> usize {
        self.armed = false;
        lock(self.refresh).finish(outcome)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.refresh).finish(Err("refresh cancelled"));
        }
    }
}
