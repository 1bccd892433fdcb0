use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::storage::SessionStorage;
use crate::api::ApiError;
use crate::models::User;

/// Storage key the session snapshot is persisted under
pub const STORAGE_KEY: &str = "makina_ops_auth";

/// Capacity of the change notification channel. Slow subscribers see
/// `RecvError::Lagged` rather than blocking mutators.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Current identity and token pair.
///
/// This is also the persisted snapshot: exactly these three fields, with
/// absent values written as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Session {
    /// Authenticated for UI gating purposes (an identity is present)
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Access token required by protected operations.
    ///
    /// A token without an identity is accepted; the transport only ever
    /// looks at the token.
    pub fn require_access(&self) -> Result<&str, ApiError> {
        self.access_token.as_deref().ok_or(ApiError::NotLoggedIn)
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Change notifications published by `SessionStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Authenticated,
    TokensRefreshed,
    LoggedOut,
}

/// Single source of truth for authentication state.
///
/// Readable synchronously through `state()`; reactive code subscribes to
/// `SessionEvent`s. Every mutator replaces the snapshot, persists it and
/// notifies while holding the write lock, so readers never observe a
/// half-applied update.
pub struct SessionStore {
    state: RwLock<Session>,
    storage: Box<dyn SessionStorage>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Open the store, loading any persisted snapshot.
    ///
    /// A missing, unreadable or corrupt snapshot yields an empty session.
    pub fn open(storage: impl SessionStorage + 'static) -> Self {
        let session = Self::load(&storage);
        debug!(
            authenticated = session.is_authenticated(),
            has_token = session.access_token.is_some(),
            "Session loaded"
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(session),
            storage: Box::new(storage),
            events,
        }
    }

    fn load(storage: &dyn SessionStorage) -> Session {
        let raw = match storage.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Session::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session, starting logged out");
                return Session::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to parse persisted session, starting logged out");
                Session::default()
            }
        }
    }

    /// Snapshot of the current session
    pub fn state(&self) -> Session {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Install a freshly logged-in identity and token pair
    pub fn set_auth(&self, user: User, access_token: String, refresh_token: String) {
        let mut state = self.write();
        *state = Session {
            user: Some(user),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
        };
        self.persist(&state);
        info!(user = ?state.user.as_ref().map(|u| u.id.to_string()), "Session established");
        self.notify(SessionEvent::Authenticated);
    }

    /// Replace the token pair after a refresh, keeping the current user
    pub fn set_tokens(&self, access_token: String, refresh_token: String) {
        let mut state = self.write();
        *state = Session {
            user: state.user.take(),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
        };
        self.persist(&state);
        debug!("Session tokens replaced");
        self.notify(SessionEvent::TokensRefreshed);
    }

    /// Clear the session and its persisted snapshot
    pub fn logout(&self) {
        let mut state = self.write();
        *state = Session::default();
        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "Failed to remove persisted session");
        }
        info!("Session cleared");
        self.notify(SessionEvent::LoggedOut);
    }

    fn persist(&self, session: &Session) {
        let contents = match serde_json::to_string(session) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "Failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.storage.write(&contents) {
            warn!(error = %e, "Failed to persist session, keeping it in memory only");
        }
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
