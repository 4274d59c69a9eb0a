//! Bookmark store proxy.
//!
//! Implements `BookmarkManagerTrait`. Holds the in-memory collection and
//! forwards writes to the [`BookmarkStore`]. Writes never touch the collection: callers follow every
//! write with a full fetch so the collection only ever holds what the store
//! returned.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::BookmarkStore;
use crate::services::url_policy;
use crate::types::bookmark::{sort_newest_first, Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::BookmarkError;
use crate::types::session::Session;

/// Question asked before a bulk delete.
pub const CLEAR_ALL_PROMPT: &str = "Delete all bookmarks? This cannot be undone.";

pub type FetchResult = Result<Vec<Bookmark>, BookmarkError>;

/// Yes/no prompt for destructive operations.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// A confirmer whose answer was collected up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preconfirmed(pub bool);

impl Confirmer for Preconfirmed {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    Declined,
}

/// Trait defining bookmark store operations for the signed-in user.
#[async_trait]
pub trait BookmarkManagerTrait {
    /// The collection, newest first.
    fn items(&self) -> &[Bookmark];
    async fn fetch_all(&mut self, session: &Session) -> Result<usize, BookmarkError>;
    async fn insert(&self, session: &Session, title: &str, url: &str) -> Result<NewBookmark, BookmarkError>;
    async fn update(
        &self,
        session: &Session,
        id: &BookmarkId,
        title: &str,
        url: &str,
    ) -> Result<NewBookmark, BookmarkError>;
    async fn delete_one(&self, session: &Session, id: &BookmarkId) -> Result<(), BookmarkError>;
    async fn delete_all_for_owner(
        &self,
        session: &Session,
        confirmer: &dyn Confirmer,
    ) -> Result<ClearOutcome, BookmarkError>;
}

pub struct BookmarkManager {
    store: Arc<dyn BookmarkStore>,
    collection: Vec<Bookmark>,
}

impl BookmarkManager {
    pub fn new(store: Arc<dyn BookmarkStore>) -> Self {
        Self {
            store,
            collection: Vec::new(),
        }
    }

    pub fn get(&self, id: &BookmarkId) -> Option<&Bookmark> {
        self.collection.iter().find(|b| &b.id == id)
    }

    /// A detached fetch, so it can run as its own task.
    pub fn fetch_task(&self, session: Session) -> impl Future<Output = FetchResult> + Send + 'static {
        let store = Arc::clone(&self.store);
        async move { store.select_all(&session).await }
    }

    /// Replaces the collection wholesale. An error empties it.
    pub fn apply_fetch(&mut self, result: FetchResult) -> Result<usize, BookmarkError> {
        match result {
            Ok(mut rows) => {
                sort_newest_first(&mut rows);
                self.collection = rows;
                Ok(self.collection.len())
            }
            Err(e) => {
                tracing::warn!(error = %e, "fetching bookmarks failed");
                self.collection.clear();
                Err(e)
            }
        }
    }

    pub fn clear(&mut self) {
        self.collection.clear();
    }
}

#[async_trait]
impl BookmarkManagerTrait for BookmarkManager {
    fn items(&self) -> &[Bookmark] {
        &self.collection
    }

    /// Fetches and applies in one step.
    async fn fetch_all(&mut self, session: &Session) -> Result<usize, BookmarkError> {
        let result = self.fetch_task(session.clone()).await;
        self.apply_fetch(result)
    }

    /// Validates then inserts. Invalid input never reaches the store.
    async fn insert(&self, session: &Session, title: &str, url: &str) -> Result<NewBookmark, BookmarkError> {
        let row = url_policy::validate_bookmark(title, url, session.user_id())?;
        self.store.insert(session, &row).await?;
        Ok(row)
    }

    /// Replaces title and url of `id`, validated like [`Self::insert`].
    async fn update(
        &self,
        session: &Session,
        id: &BookmarkId,
        title: &str,
        url: &str,
    ) -> Result<NewBookmark, BookmarkError> {
        let row = url_policy::validate_bookmark(title, url, session.user_id())?;
        self.store.replace(session, id, &row).await?;
        Ok(row)
    }

    async fn delete_one(&self, session: &Session, id: &BookmarkId) -> Result<(), BookmarkError> {
        self.store.delete_by_id(session, id).await
    }

    /// Deletes every row owned by the session user once `confirmer` agrees.
    async fn delete_all_for_owner(
        &self,
        session: &Session,
        confirmer: &dyn Confirmer,
    ) -> Result<ClearOutcome, BookmarkError> {
        if !confirmer.confirm(CLEAR_ALL_PROMPT) {
            tracing::debug!("bulk delete declined");
            return Ok(ClearOutcome::Declined);
        }
        self.store.delete_by_owner(session, session.user_id()).await?;
        Ok(ClearOutcome::Cleared)
    }
}
