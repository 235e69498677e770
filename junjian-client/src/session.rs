//! The session store: who is logged in, kept in one place and persisted
//! across restarts.
//!
//! ```text
//! Anonymous      --login/register start-->   Authenticating
//! Authenticating --success-->                Authenticated
//! Authenticating --failure-->                previous phase
//! Authenticated  --logout / 401-->           Anonymous
//! ```
//!
//! Every transition is one update of a [`watch`] channel, so observers never
//! see a half-written session. The durable record is written after each
//! transition.

use std::{fmt, sync::Arc};

use shared::models::{AuthResponse, LoginRequest, RegisterRequest, User};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::{AuthError, AuthFlow, GatewayError},
    gateway::Gateway,
    storage::{PersistedSession, SessionStorage},
};

/// Snapshot of the authentication state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    /// Set while a login or registration is in flight. Never persisted.
    pub is_loading: bool,
}

/// Coarse view of a [`Session`] for callers that only need the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
}

impl Session {
    /// An in-flight exchange is reported as `Authenticating` even when a
    /// previous session is still live.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.is_loading {
            SessionPhase::Authenticating
        } else if self.is_authenticated {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        }
    }

    fn authenticated(user: User, token: String) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
            is_authenticated: true,
            is_loading: false,
        }
    }

    /// Drop the identity fields, keeping the loading flag. Returns whether
    /// anything changed.
    fn clear_identity(&mut self) -> bool {
        let changed = self.user.is_some() || self.token.is_some() || self.is_authenticated;
        self.user = None;
        self.token = None;
        self.is_authenticated = false;
        changed
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("is_authenticated", &self.is_authenticated)
            .field("is_loading", &self.is_loading)
            .finish()
    }
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            user: session.user.clone(),
            token: session.token.clone(),
            is_authenticated: session.is_authenticated,
        }
    }
}

impl From<PersistedSession> for Session {
    /// Records that do not describe a live session rehydrate as anonymous.
    fn from(record: PersistedSession) -> Self {
        if !record.is_live() {
            return Self::default();
        }
        Self {
            user: record.user,
            token: record.token,
            is_authenticated: true,
            is_loading: false,
        }
    }
}

struct Inner {
    gateway: Gateway,
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<Session>,
}

impl Inner {
    fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    fn persist(&self) {
        let record = PersistedSession::from(&self.snapshot());
        if let Err(err) = self.storage.save(&record) {
            warn!(error = %err, "failed to persist session");
        }
    }

    /// Write the cleared record, removing it outright when it cannot be
    /// rewritten.
    fn persist_signed_out(&self) {
        let Err(err) = self.storage.save(&PersistedSession::from(&self.snapshot())) else {
            return;
        };
        warn!(error = %err, "failed to persist signed-out session; removing record");
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "failed to remove session record");
        }
    }

    /// Called by the gateway after it purged the durable record on a 401.
    fn expire(&self) -> bool {
        let mut was_live = false;
        self.state.send_if_modified(|session| {
            was_live = session.is_authenticated;
            session.clear_identity()
        });
        if was_live {
            info!("session expired");
        }
        was_live
    }
}

/// Resets the loading flag when an exchange ends, including when its future
/// is dropped before completion.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<Session>,
}

impl<'a> LoadingGuard<'a> {
    fn acquire(state: &'a watch::Sender<Session>) -> Result<Self, AuthError> {
        let mut acquired = false;
        state.send_if_modified(|session| {
            if session.is_loading {
                return false;
            }
            session.is_loading = true;
            acquired = true;
            true
        });
        if acquired {
            Ok(Self { state })
        } else {
            Err(AuthError::InFlight)
        }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|session| {
            let was_loading = session.is_loading;
            session.is_loading = false;
            was_loading
        });
    }
}

/// Handle to the process-wide session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.get())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Rehydrate the session from `storage` and wire it into `gateway`.
    ///
    /// An unreadable record is logged and treated as absent.
    pub fn new(gateway: Gateway, storage: Arc<dyn SessionStorage>) -> Self {
        let session = match storage.load() {
            Ok(Some(record)) => Session::from(record),
            Ok(None) => Session::default(),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable session record");
                Session::default()
            }
        };
        if let Some(token) = session.token.as_deref() {
            gateway.set_auth_token(token);
        }
        debug!(phase = ?session.phase(), "session rehydrated");

        let inner = Arc::new(Inner {
            gateway,
            storage,
            state: watch::Sender::new(session),
        });

        let weak = Arc::downgrade(&inner);
        inner
            .gateway
            .on_unauthorized(move || weak.upgrade().is_some_and(|inner| inner.expire()));

        Self { inner }
    }

    /// The current session.
    #[must_use]
    pub fn get(&self) -> Session {
        self.inner.snapshot()
    }

    /// A receiver that observes every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Run `callback` after every transition until the store is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_change<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(&Session) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let session = receiver.borrow_and_update().clone();
                callback(&session);
            }
        })
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    /// Log in with email and password.
    ///
    /// `remember_me` is forwarded to the backend; the session is persisted
    /// either way.
    ///
    /// # Errors
    /// [`AuthError::InFlight`] when another exchange is running, otherwise
    /// [`AuthError::Authentication`] with the server message. The previous
    /// session is left untouched on failure.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<(), AuthError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            remember_me,
        };
        let guard = LoadingGuard::acquire(&self.inner.state)?;
        let outcome = self.inner.gateway.login(&request).await;
        self.establish(AuthFlow::Login, outcome, guard)
    }

    /// Register an account and log into it.
    ///
    /// Accepts the bare registration form or a request carrying invite and
    /// verification codes.
    ///
    /// # Errors
    /// Same as [`SessionStore::login`].
    pub async fn register(&self, data: impl Into<RegisterRequest>) -> Result<(), AuthError> {
        let request = data.into();
        let guard = LoadingGuard::acquire(&self.inner.state)?;
        let outcome = self.inner.gateway.register(&request).await;
        self.establish(AuthFlow::Register, outcome, guard)
    }

    fn establish(
        &self,
        flow: AuthFlow,
        outcome: Result<AuthResponse, GatewayError>,
        guard: LoadingGuard<'_>,
    ) -> Result<(), AuthError> {
        let response = match outcome {
            Ok(response) if !response.token.is_empty() => response,
            Ok(_) => {
                return Err(AuthError::rejected(
                    flow,
                    GatewayError::Decode("response carried an empty token".to_string()),
                ));
            }
            Err(err) => {
                warn!(flow = %flow, error = %err, "authentication failed");
                return Err(AuthError::rejected(flow, err));
            }
        };

        let AuthResponse { token, user, .. } = response;
        let user_id = user.id;
        self.inner.gateway.set_auth_token(&token);
        self.inner
            .state
            .send_replace(Session::authenticated(user, token));
        drop(guard);
        self.inner.persist();
        info!(flow = %flow, user_id, "session established");
        Ok(())
    }

    /// Erase the local credential. No request is made; calling it again is a
    /// no-op.
    pub fn logout(&self) {
        if self.sign_out() {
            info!("logged out");
        }
    }

    /// Drop the session without announcing a logout.
    pub fn clear_auth(&self) {
        self.sign_out();
    }

    /// The token is revoked at the gateway before the record is touched, so
    /// a record that cannot be rewritten never puts it back on the wire.
    fn sign_out(&self) -> bool {
        let token = self.get().token;
        self.inner.gateway.revoke_auth_token(token.as_deref());
        let changed = self.inner.state.send_if_modified(Session::clear_identity);
        self.inner.persist_signed_out();
        changed
    }

    /// Re-register the held token with the gateway. The token is not
    /// validated; an expired one surfaces on the next authenticated call.
    ///
    /// Returns whether a token was present.
    pub fn check_auth(&self) -> bool {
        match self.get().token {
            Some(token) => {
                self.inner.gateway.set_auth_token(&token);
                true
            }
            None => false,
        }
    }

    /// Replace the stored user record, e.g. after a profile edit.
    pub fn set_user(&self, user: User) {
        self.inner.state.send_modify(|session| session.user = Some(user));
        self.inner.persist();
    }

    /// Reload the user record from the backend while a session is live.
    ///
    /// # Errors
    /// Returns the gateway failure; a 401 tears the session down.
    pub async fn refresh_user(&self) -> Result<User, GatewayError> {
        let user = self.inner.gateway.current_user().await?;
        let updated = self.inner.state.send_if_modified(|session| {
            if !session.is_authenticated || session.user.as_ref() == Some(&user) {
                return false;
            }
            session.user = Some(user.clone());
            true
        });
        if updated {
            self.inner.persist();
        }
        Ok(user)
    }
}
