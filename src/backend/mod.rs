//! Boundary to the managed backend.
//!
//! Three seams, each a trait object so the managers never know which
//! implementation they talk to:
//!
//! - [`AuthBackend`]: OAuth sign-in, session lookup, auth notifications
//! - [`BookmarkStore`]: row reads and writes on the bookmarks table
//! - [`ChangeFeed`]: record-change subscriptions
//!
//! [`supabase`] speaks HTTP to a hosted project; [`memory`] keeps
//! everything in-process.

pub mod listener;
pub mod memory;
pub mod supabase;

use async_trait::async_trait;

use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::{AuthError, BookmarkError, RealtimeError};
use crate::types::session::Session;

pub use listener::{AuthListener, FeedSubscription, Listener, ListenerRegistry};

/// External identity provider.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// URL the user must visit to sign in with `provider`.
    async fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError>;

    /// Finishes sign-in from the redirect the provider sent the user to.
    async fn complete_sign_in(&self, callback_url: &str) -> Result<Session, AuthError>;

    /// The current session, refreshed if it has expired.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Trades the refresh token for new tokens and emits `TokenRefreshed`.
    ///
    /// `Ok(None)` means there is no session left: none was held, or the
    /// provider rejected the refresh token and `SignedOut` was emitted.
    async fn refresh_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Registers for auth-state notifications. Drop the guard to deregister.
    fn on_auth_state_change(&self) -> AuthListener;
}

/// Bookmark rows, scoped by the backend's access policy to the session owner.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// All visible rows, newest first.
    async fn select_all(&self, session: &Session) -> Result<Vec<Bookmark>, BookmarkError>;

    async fn insert(&self, session: &Session, row: &NewBookmark) -> Result<(), BookmarkError>;

    /// Replaces title and url of row `id`.
    async fn replace(
        &self,
        session: &Session,
        id: &BookmarkId,
        row: &NewBookmark,
    ) -> Result<(), BookmarkError>;

    async fn delete_by_id(&self, session: &Session, id: &BookmarkId) -> Result<(), BookmarkError>;

    async fn delete_by_owner(&self, session: &Session, owner: &str) -> Result<(), BookmarkError>;
}

/// What a change subscription watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    pub schema: String,
    pub table: String,
    /// Server-side owner filter; `None` asks for every row change.
    pub owner: Option<String>,
}

impl FeedFilter {
    pub fn table(schema: &str, table: &str) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }
}

/// Source of record-change notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(
        &self,
        session: &Session,
        filter: &FeedFilter,
    ) -> Result<FeedSubscription, RealtimeError>;
}
