//! Change-feed subscriber.
//!
//! Implements `ChangeFeedManagerTrait`. Keeps at most one subscription, tied to the signed-in user. Events are
//! only a signal to re-fetch; their payload is logged and discarded.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{ChangeFeed, FeedFilter, FeedSubscription};
use crate::types::errors::RealtimeError;
use crate::types::events::ChangeEvent;
use crate::types::session::Session;
use crate::types::settings::RealtimeSettings;

/// Trait defining change-feed subscription operations.
#[async_trait]
pub trait ChangeFeedManagerTrait {
    async fn open(&mut self, session: &Session) -> Result<bool, RealtimeError>;
    fn close(&mut self) -> bool;
    fn is_open(&self) -> bool;
}

pub struct ChangeFeedManager {
    feed: Arc<dyn ChangeFeed>,
    settings: RealtimeSettings,
    subscription: Option<FeedSubscription>,
    owner: Option<String>,
}

impl ChangeFeedManager {
    pub fn new(feed: Arc<dyn ChangeFeed>, settings: RealtimeSettings) -> Self {
        Self {
            feed,
            settings,
            subscription: None,
            owner: None,
        }
    }

    pub fn filter_for(&self, session: &Session) -> FeedFilter {
        let filter = FeedFilter::table(&self.settings.schema, &self.settings.table);
        if self.settings.owner_filter {
            filter.with_owner(session.user_id())
        } else {
            filter
        }
    }

    /// Waits for the next change. Never resolves while closed.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ChangeFeedManagerTrait for ChangeFeedManager {
    /// Opens a subscription for `session`'s user.
    ///
    /// Returns `Ok(false)` when nothing was opened: the feed is disabled or a
    /// subscription for the same user is already live.
    async fn open(&mut self, session: &Session) -> Result<bool, RealtimeError> {
        if !self.settings.enabled {
            return Ok(false);
        }
        if self.subscription.is_some() && self.owner.as_deref() == Some(session.user_id()) {
            return Ok(false);
        }
        self.close();

        let filter = self.filter_for(session);
        let subscription = self.feed.subscribe(session, &filter).await?;
        tracing::debug!(table = %filter.table, "change subscription opened");
        self.subscription = Some(subscription);
        self.owner = Some(session.user_id().to_string());
        Ok(true)
    }

    /// Drops the subscription, if any. Returns whether one was open.
    fn close(&mut self) -> bool {
        self.owner = None;
        match self.subscription.take() {
            Some(subscription) => {
                subscription.unsubscribe();
                tracing::debug!("change subscription closed");
                true
            }
            None => false,
        }
    }

    fn is_open(&self) -> bool {
        self.subscription.is_some()
    }
}
