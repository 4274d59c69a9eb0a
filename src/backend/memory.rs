//! In-process backend.
//!
//! Behaves like a hosted project with row-level security on `user_id`:
//! every store call only sees rows owned by the calling session. Used by the
//! test suites and by the `--offline` console mode.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::listener::{AuthListener, FeedSubscription, ListenerRegistry};
use super::{AuthBackend, BookmarkStore, ChangeFeed, FeedFilter};
use crate::types::bookmark::{sort_newest_first, Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::{AuthError, BookmarkError, RealtimeError};
use crate::types::events::{AuthEvent, ChangeEvent, ChangeKind};
use crate::types::session::{Session, User};

const SESSION_TTL_SECS: i64 = 3600;

/// Requests seen by the backend, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_session: usize,
    pub refresh: usize,
    pub select: usize,
    pub insert: usize,
    pub replace: usize,
    pub delete_one: usize,
    pub delete_owner: usize,
    pub subscribe: usize,
}

impl CallCounts {
    /// Every store write, whatever the kind.
    pub fn writes(&self) -> usize {
        self.insert + self.replace + self.delete_one + self.delete_owner
    }

    /// Every request that touches bookmark data or the feed.
    pub fn data_calls(&self) -> usize {
        self.select + self.writes() + self.subscribe
    }
}

#[derive(Default)]
struct Failures {
    session: Option<AuthError>,
    refresh: Option<AuthError>,
    select: Option<BookmarkError>,
    write: Option<BookmarkError>,
    subscribe: Option<RealtimeError>,
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    /// Lifetime of issued tokens; `None` means [`SESSION_TTL_SECS`].
    session_ttl: Option<i64>,
    rows: Vec<Bookmark>,
    last_created: Option<DateTime<Utc>>,
    calls: CallCounts,
    failures: Failures,
    feed_filters: Vec<FeedFilter>,
}

impl State {
    fn expires_at(&self) -> i64 {
        Utc::now().timestamp() + self.session_ttl.unwrap_or(SESSION_TTL_SECS)
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_created = Some(ts);
        ts
    }
}

struct Inner {
    state: Mutex<State>,
    auth_listeners: ListenerRegistry<AuthEvent>,
    /// Keyed by owner filter; `None` receives every change.
    feeds: Mutex<HashMap<Option<String>, ListenerRegistry<ChangeEvent>>>,
}

/// Cheap-to-clone handle; clones share one backend.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                auth_listeners: ListenerRegistry::new(),
                feeds: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Signs `user_id` in as if the provider redirect had completed.
    pub fn sign_in_as(&self, user_id: &str, email: Option<&str>, display_name: Option<&str>) -> Session {
        let expires_at = self.state().expires_at();
        let session = Session {
            access_token: format!("mem-at-{}", uuid::Uuid::new_v4()),
            refresh_token: format!("mem-rt-{}", uuid::Uuid::new_v4()),
            expires_at,
            user: User {
                id: user_id.to_string(),
                email: email.map(String::from),
                display_name: display_name.map(String::from),
                avatar_url: None,
            },
        };
        self.state().session = Some(session.clone());
        self.inner.auth_listeners.emit(AuthEvent::signed_in(session.clone()));
        session
    }

    /// Issues fresh tokens for the current user and notifies listeners.
    pub fn refresh_tokens(&self) -> Option<Session> {
        let refreshed = {
            let mut state = self.state();
            let expires_at = state.expires_at();
            let session = state.session.as_mut()?;
            session.access_token = format!("mem-at-{}", uuid::Uuid::new_v4());
            session.expires_at = expires_at;
            session.clone()
        };
        self.inner
            .auth_listeners
            .emit(AuthEvent::token_refreshed(refreshed.clone()));
        Some(refreshed)
    }

    /// Lifetime of tokens issued from now on.
    pub fn set_session_ttl(&self, secs: i64) {
        self.state().session_ttl = Some(secs);
    }

    /// Invalidates the held access token without telling anyone, the way a
    /// JWT expires on the server. Store calls with it then fail with 401.
    pub fn revoke_access_token(&self) {
        if let Some(session) = self.state().session.as_mut() {
            session.access_token = format!("mem-revoked-{}", uuid::Uuid::new_v4());
        }
    }

    /// Writes a row the way another client would, notifying the feed.
    pub fn seed(&self, owner: &str, title: &str, url: &str) -> Bookmark {
        let row = {
            let mut state = self.state();
            let created_at = state.next_timestamp();
            let row = Bookmark {
                id: BookmarkId::new(uuid::Uuid::new_v4().to_string()),
                title: title.to_string(),
                url: url.to_string(),
                user_id: owner.to_string(),
                created_at,
            };
            state.rows.push(row.clone());
            row
        };
        self.publish(ChangeKind::Insert, &row);
        row
    }

    /// Rows owned by `owner`, newest first, without counting a request.
    pub fn rows_for(&self, owner: &str) -> Vec<Bookmark> {
        let mut rows: Vec<_> = self
            .state()
            .rows
            .iter()
            .filter(|row| row.user_id == owner)
            .cloned()
            .collect();
        sort_newest_first(&mut rows);
        rows
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn fail_get_session(&self, err: Option<AuthError>) {
        self.state().failures.session = err;
    }

    pub fn fail_refresh(&self, err: Option<AuthError>) {
        self.state().failures.refresh = err;
    }

    pub fn fail_select(&self, err: Option<BookmarkError>) {
        self.state().failures.select = err;
    }

    pub fn fail_writes(&self, err: Option<BookmarkError>) {
        self.state().failures.write = err;
    }

    pub fn fail_subscribe(&self, err: Option<RealtimeError>) {
        self.state().failures.subscribe = err;
    }

    pub fn auth_listener_count(&self) -> usize {
        self.inner.auth_listeners.len()
    }

    /// Live feed subscriptions across all filters.
    pub fn subscriber_count(&self) -> usize {
        self.feeds().values().map(ListenerRegistry::len).sum()
    }

    /// Ends every live subscription, as a server closing the channel would.
    pub fn end_feeds(&self) {
        let mut feeds = self.feeds();
        for registry in feeds.values() {
            registry.close_all();
        }
        feeds.clear();
    }

    /// Filters requested by every subscribe call so far.
    pub fn feed_filters(&self) -> Vec<FeedFilter> {
        self.state().feed_filters.clone()
    }

    /// Pushes a raw event to subscribers of `owner` (and unfiltered ones).
    pub fn emit_change(&self, owner: Option<&str>, event: ChangeEvent) {
        let feeds = self.feeds();
        if let Some(registry) = feeds.get(&None) {
            registry.emit(event.clone());
        }
        if let Some(owner) = owner {
            if let Some(registry) = feeds.get(&Some(owner.to_string())) {
                registry.emit(event);
            }
        }
    }

    fn feeds(&self) -> MutexGuard<'_, HashMap<Option<String>, ListenerRegistry<ChangeEvent>>> {
        self.inner
            .feeds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, kind: ChangeKind, row: &Bookmark) {
        let record = serde_json::to_value(row).ok();
        let mut event = ChangeEvent::new(kind, "bookmarks", None);
        match kind {
            ChangeKind::Delete => event.old_record = record,
            _ => event.record = record,
        }
        event.commit_timestamp = Some(Utc::now().to_rfc3339());
        self.emit_change(Some(&row.user_id), event);
    }

    /// Checks the caller holds the backend's current session.
    fn authorize(state: &State, session: &Session) -> Result<(), BookmarkError> {
        match &state.session {
            Some(current) if current.access_token == session.access_token => Ok(()),
            _ => Err(BookmarkError::Backend {
                status: 401,
                message: "JWT expired or invalid".to_string(),
            }),
        }
    }

    fn check_write(state: &State, session: &Session) -> Result<(), BookmarkError> {
        Self::authorize(state, session)?;
        match &state.failures.write {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn callback_params(callback_url: &str) -> Result<HashMap<String, String>, AuthError> {
    let parsed = url::Url::parse(callback_url)
        .map_err(|e| AuthError::InvalidCallback(e.to_string()))?;
    let raw = parsed
        .fragment()
        .filter(|f| !f.is_empty())
        .or_else(|| parsed.query())
        .unwrap_or_default();
    Ok(url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect())
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError> {
        let mut url = url::Url::parse("memory://authorize")
            .map_err(|e| AuthError::InvalidCallback(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to);
        Ok(url.to_string())
    }

    async fn complete_sign_in(&self, callback_url: &str) -> Result<Session, AuthError> {
        let params = callback_params(callback_url)?;
        if let Some(error) = params.get("error_description").or_else(|| params.get("error")) {
            return Err(AuthError::InvalidCallback(error.clone()));
        }
        let user = params
            .get("user")
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AuthError::InvalidCallback("missing user".to_string()))?;
        Ok(self.sign_in_as(
            user,
            params.get("email").map(String::as_str),
            params.get("name").map(String::as_str),
        ))
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let mut state = self.state();
        state.calls.get_session += 1;
        if let Some(err) = &state.failures.session {
            return Err(err.clone());
        }
        Ok(state.session.clone())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, AuthError> {
        let failure = {
            let mut state = self.state();
            state.calls.refresh += 1;
            state.failures.refresh.clone()
        };
        match failure {
            Some(AuthError::Provider { .. }) => {
                self.state().session = None;
                self.inner.auth_listeners.emit(AuthEvent::signed_out());
                Ok(None)
            }
            Some(err) => Err(err),
            None => Ok(self.refresh_tokens()),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state().session = None;
        self.inner.auth_listeners.emit(AuthEvent::signed_out());
        Ok(())
    }

    fn on_auth_state_change(&self) -> AuthListener {
        self.inner.auth_listeners.register()
    }
}

#[async_trait]
impl BookmarkStore for MemoryBackend {
    async fn select_all(&self, session: &Session) -> Result<Vec<Bookmark>, BookmarkError> {
        {
            let mut state = self.state();
            state.calls.select += 1;
            Self::authorize(&state, session)?;
            if let Some(err) = &state.failures.select {
                return Err(err.clone());
            }
        }
        Ok(self.rows_for(session.user_id()))
    }

    async fn insert(&self, session: &Session, row: &NewBookmark) -> Result<(), BookmarkError> {
        let stored = {
            let mut state = self.state();
            state.calls.insert += 1;
            Self::check_write(&state, session)?;
            if row.user_id != session.user_id() {
                return Err(BookmarkError::Backend {
                    status: 403,
                    message: "new row violates row-level security policy".to_string(),
                });
            }
            let created_at = state.next_timestamp();
            let stored = Bookmark {
                id: BookmarkId::new(uuid::Uuid::new_v4().to_string()),
                title: row.title.clone(),
                url: row.url.clone(),
                user_id: row.user_id.clone(),
                created_at,
            };
            state.rows.push(stored.clone());
            stored
        };
        self.publish(ChangeKind::Insert, &stored);
        Ok(())
    }

    async fn replace(
        &self,
        session: &Session,
        id: &BookmarkId,
        row: &NewBookmark,
    ) -> Result<(), BookmarkError> {
        let updated = {
            let mut state = self.state();
            state.calls.replace += 1;
            Self::check_write(&state, session)?;
            let owner = session.user_id().to_string();
            let existing = state
                .rows
                .iter_mut()
                .find(|r| &r.id == id && r.user_id == owner)
                .ok_or_else(|| BookmarkError::NotFound(id.to_string()))?;
            existing.title = row.title.clone();
            existing.url = row.url.clone();
            existing.clone()
        };
        self.publish(ChangeKind::Update, &updated);
        Ok(())
    }

    async fn delete_by_id(&self, session: &Session, id: &BookmarkId) -> Result<(), BookmarkError> {
        let removed = {
            let mut state = self.state();
            state.calls.delete_one += 1;
            Self::check_write(&state, session)?;
            let owner = session.user_id().to_string();
            let position = state
                .rows
                .iter()
                .position(|r| &r.id == id && r.user_id == owner);
            position.map(|index| state.rows.remove(index))
        };
        if let Some(row) = removed {
            self.publish(ChangeKind::Delete, &row);
        }
        Ok(())
    }

    async fn delete_by_owner(&self, session: &Session, owner: &str) -> Result<(), BookmarkError> {
        let removed: Vec<Bookmark> = {
            let mut state = self.state();
            state.calls.delete_owner += 1;
            Self::check_write(&state, session)?;
            // Row-level security: only the caller's own rows are visible.
            if owner != session.user_id() {
                return Ok(());
            }
            let (gone, kept): (Vec<Bookmark>, Vec<Bookmark>) = std::mem::take(&mut state.rows)
                .into_iter()
                .partition(|r| r.user_id == owner);
            state.rows = kept;
            gone
        };
        for row in &removed {
            self.publish(ChangeKind::Delete, row);
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(
        &self,
        _session: &Session,
        filter: &FeedFilter,
    ) -> Result<FeedSubscription, RealtimeError> {
        {
            let mut state = self.state();
            state.calls.subscribe += 1;
            state.feed_filters.push(filter.clone());
            if let Some(err) = &state.failures.subscribe {
                return Err(err.clone());
            }
        }
        let mut feeds = self.feeds();
        feeds.retain(|_, registry| !registry.is_empty());
        let registry = feeds.entry(filter.owner.clone()).or_default();
        Ok(registry.register())
    }
}
