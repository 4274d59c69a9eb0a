//! Session holder.
//!
//! Implements `SessionManagerTrait`. Owns the current [`Session`] (or its
//! absence) and the auth-state listener. The listener is registered once in
//! `initialize` and released in `teardown` or on drop.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{AuthBackend, AuthListener};
use crate::types::errors::AuthError;
use crate::types::events::AuthEvent;
use crate::types::session::Session;

/// What a session replacement changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// No session before, one now.
    Established,
    /// A different user replaced the previous one.
    Switched,
    /// Same user, new tokens or profile.
    Refreshed,
    /// The session is gone.
    Cleared,
    Unchanged,
}

impl SessionTransition {
    /// Whether dependent state (collection, feed) must be rebuilt.
    pub fn identity_changed(self) -> bool {
        matches!(self, Self::Established | Self::Switched | Self::Cleared)
    }
}

/// Trait defining session holder operations.
#[async_trait]
pub trait SessionManagerTrait {
    async fn initialize(&mut self) -> Option<Session>;
    fn current(&self) -> Option<&Session>;
    fn apply(&mut self, event: &AuthEvent) -> SessionTransition;
    async fn sign_in_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError>;
    async fn complete_sign_in(&mut self, callback_url: &str) -> Result<SessionTransition, AuthError>;
    async fn sign_out(&mut self) -> Result<SessionTransition, AuthError>;
    /// Forces a token refresh. Ends in `Cleared` when the provider refuses it.
    async fn refresh(&mut self) -> Result<SessionTransition, AuthError>;
    fn teardown(&mut self);
}

pub struct SessionManager {
    auth: Arc<dyn AuthBackend>,
    current: Option<Session>,
    listener: Option<AuthListener>,
    initialized: bool,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthBackend>) -> Self {
        Self {
            auth,
            current: None,
            listener: None,
            initialized: false,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    fn replace(&mut self, next: Option<Session>) -> SessionTransition {
        let transition = match (&self.current, &next) {
            (None, None) => SessionTransition::Unchanged,
            (None, Some(_)) => SessionTransition::Established,
            (Some(_), None) => SessionTransition::Cleared,
            (Some(prev), Some(new)) if prev == new => SessionTransition::Unchanged,
            (Some(prev), Some(new)) if prev.same_user(new) => SessionTransition::Refreshed,
            (Some(_), Some(_)) => SessionTransition::Switched,
        };
        self.current = next;
        transition
    }

    /// Waits for the next auth notification. Never resolves without a listener.
    pub async fn next_event(&mut self) -> Option<AuthEvent> {
        match self.listener.as_mut() {
            Some(listener) => listener.recv().await,
            None => std::future::pending().await,
        }
    }
}

#[async_trait]
impl SessionManagerTrait for SessionManager {
    /// Registers the auth listener and asks the provider for an existing
    /// session. Only the first call contacts the provider.
    ///
    /// A failed lookup is logged and leaves the session absent.
    async fn initialize(&mut self) -> Option<Session> {
        if self.initialized {
            return self.current.clone();
        }
        self.initialized = true;
        self.listener = Some(self.auth.on_auth_state_change());

        match self.auth.get_session().await {
            Ok(Some(session)) => {
                tracing::info!(user_id = %session.user.id, "existing session found");
                self.replace(Some(session));
            }
            Ok(None) => tracing::debug!("no existing session"),
            Err(e) => tracing::warn!(error = %e, "session lookup failed, showing login"),
        }
        self.current.clone()
    }

    fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Replaces the held session with the one carried by `event`.
    fn apply(&mut self, event: &AuthEvent) -> SessionTransition {
        tracing::debug!(change = ?event.change, "auth state changed");
        self.replace(event.session.clone())
    }

    async fn sign_in_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError> {
        self.auth.authorize_url(provider, redirect_to).await
    }

    async fn complete_sign_in(&mut self, callback_url: &str) -> Result<SessionTransition, AuthError> {
        let session = self.auth.complete_sign_in(callback_url).await?;
        Ok(self.replace(Some(session)))
    }

    /// Signs out remotely and drops the local session either way.
    async fn sign_out(&mut self) -> Result<SessionTransition, AuthError> {
        let result = self.auth.sign_out().await;
        let transition = self.replace(None);
        result.map(|_| transition)
    }

    /// Deregisters the auth listener.
    fn teardown(&mut self) {
        if self.listener.take().is_some() {
            tracing::debug!("auth listener released");
        }
    }

    async fn refresh(&mut self) -> Result<SessionTransition, AuthError> {
        let refreshed = self.auth.refresh_session().await?;
        match &refreshed {
            Some(session) => tracing::debug!(user_id = %session.user.id, "access token refreshed"),
            None => tracing::info!("session ended during token refresh"),
        }
        Ok(self.replace(refreshed))
    }
}
