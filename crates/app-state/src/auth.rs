//! Authentication state
//!
//! [`AuthStore`] owns the process-wide authentication flag. It is an explicit
//! object handed to whoever needs it rather than a global, and it notifies
//! subscribers through a watch channel whenever the state changes.
//!
//! Route guards only need the boolean, so they depend on the narrow
//! [`AuthSource`] capability instead of the whole store.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{PersistenceConfig, PersistenceError, SnapshotFile};
use tokio::sync::{watch, Mutex};

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Snapshot could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Stable user id
    pub id: String,
    /// Display name
    pub name: String,
}

impl AuthUser {
    /// Create a new user
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Snapshot of the authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// Whether a user is signed in
    pub is_authenticated: bool,
    /// The signed-in user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
}

impl AuthState {
    /// State for a signed-in user
    pub fn authenticated(user: AuthUser) -> Self {
        Self { is_authenticated: true, user: Some(user) }
    }
}

/// Read-only access to the authentication flag
#[cfg_attr(test, mockall::automock)]
pub trait AuthSource: Send + Sync {
    /// Current value of the flag
    fn is_authenticated(&self) -> bool;
}

impl AuthSource for bool {
    fn is_authenticated(&self) -> bool {
        *self
    }
}

/// Authentication store
///
/// Clones share the same state and subscribers.
#[derive(Clone)]
pub struct AuthStore {
    state: Arc<RwLock<AuthState>>,
    tx: Arc<watch::Sender<AuthState>>,
    snapshot: Option<Arc<SnapshotFile<AuthState>>>,
    /// Held across compare, save and commit so writes land in call order
    write_lock: Arc<Mutex<()>>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    /// Create a signed-out, in-memory store
    pub fn new() -> Self {
        Self::with_state(AuthState::default())
    }

    /// Create an in-memory store starting from `state`
    pub fn with_state(state: AuthState) -> Self {
        let (tx, _) = watch::channel(state.clone());
        Self {
            state: Arc::new(RwLock::new(state)),
            tx: Arc::new(tx),
            snapshot: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a store backed by a snapshot file, restoring the last saved state
    pub async fn with_persistence(config: PersistenceConfig) -> Result<Self> {
        let snapshot: SnapshotFile<AuthState> = SnapshotFile::new(config);
        let state = snapshot.load().await?.unwrap_or_default();
        tracing::debug!(
            path = %snapshot.path().display(),
            is_authenticated = state.is_authenticated,
            "Restored auth state"
        );

        let mut store = Self::with_state(state);
        store.snapshot = Some(Arc::new(snapshot));
        Ok(store)
    }

    /// Whether a user is signed in
    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated
    }

    /// The signed-in user
    pub fn user(&self) -> Option<AuthUser> {
        self.state.read().user.clone()
    }

    /// Copy of the full state
    pub fn snapshot(&self) -> AuthState {
        self.state.read().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Sign a user in
    pub async fn login(&self, user: AuthUser) -> Result<()> {
        tracing::info!(user_id = %user.id, "User logged in");
        self.set(AuthState::authenticated(user)).await
    }

    /// Sign the current user out
    pub async fn logout(&self) -> Result<()> {
        if self.is_authenticated() {
            tracing::info!("User logged out");
        }
        self.set(AuthState::default()).await
    }

    /// Replace the state, persisting and notifying subscribers if it changed
    ///
    /// The snapshot is written first. When that fails the in-memory state is
    /// left as it was and nobody is notified.
    pub async fn set(&self, next: AuthState) -> Result<()> {
        let _write = self.write_lock.lock().await;

        if self.snapshot() == next {
            return Ok(());
        }

        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.save(&next).await {
                tracing::warn!(path = %snapshot.path().display(), "Failed to persist auth state: {}", e);
                return Err(e.into());
            }
        }

        *self.state.write() = next.clone();
        self.tx.send_replace(next);

        Ok(())
    }
}

impl AuthSource for AuthStore {
    fn is_authenticated(&self) -> bool {
        AuthStore::is_authenticated(self)
    }
}
