//! Reconciliation loop.
//!
//! One [`Controller`] task owns all client state. It reacts to four inputs:
//!
//! - commands sent through a [`ControllerHandle`]
//! - auth-state notifications from the session listener
//! - change-feed notifications
//! - completions of spawned fetches
//!
//! Every fetch runs as its own task and is applied when it completes, in
//! completion order. Results from before the last identity change are
//! dropped. A write's reply is held until the fetch it triggered has been
//! applied, so the returned view already reflects the store.
//!
//! An expired access token is refreshed before it is used, and a request
//! the backend refuses with 401 is retried once with a refreshed token.
//! When the change feed ends it is reopened with backoff, or at once on
//! the next refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backend::{AuthBackend, BookmarkStore, ChangeFeed};
use crate::managers::bookmark_manager::{
    BookmarkManager, BookmarkManagerTrait, ClearOutcome, Confirmer, FetchResult, Preconfirmed,
};
use crate::managers::change_feed_manager::{ChangeFeedManager, ChangeFeedManagerTrait};
use crate::managers::form_manager::{FormManager, FormManagerTrait, Submission};
use crate::managers::session_manager::{SessionManager, SessionManagerTrait, SessionTransition};
use crate::types::bookmark::BookmarkId;
use crate::types::errors::{BookmarkError, ControllerError};
use crate::types::events::ChangeEvent;
use crate::types::session::Session;
use crate::types::settings::{AppSettings, AuthSettings};
use crate::view::{self, Notice, View, ViewInput};

const COMMAND_QUEUE: usize = 64;

const FEED_RETRY_MIN: Duration = Duration::from_millis(500);
const FEED_RETRY_MAX: Duration = Duration::from_secs(30);

/// Notice shown while the change feed is down.
pub const FEED_STOPPED: &str = "Live updates stopped";

/// A user action.
pub enum Command {
    /// Returns the provider authorize URL in [`Outcome::redirect_url`].
    SignIn,
    CompleteSignIn { callback_url: String },
    SignOut,
    Refresh,
    Insert { title: String, url: String },
    Update { id: BookmarkId, title: String, url: String },
    /// Updates the form fields that are `Some`, leaving the others.
    SetForm { title: Option<String>, url: Option<String> },
    /// Inserts or updates from the form, depending on its mode.
    Submit { title: Option<String>, url: Option<String> },
    BeginEdit { id: BookmarkId },
    CancelEdit,
    Delete { id: BookmarkId },
    ClearAll { confirmer: Arc<dyn Confirmer> },
    DismissNotice,
    Snapshot,
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SignIn => "sign_in",
            Command::CompleteSignIn { .. } => "complete_sign_in",
            Command::SignOut => "sign_out",
            Command::Refresh => "refresh",
            Command::Insert { .. } => "insert",
            Command::Update { .. } => "update",
            Command::SetForm { .. } => "set_form",
            Command::Submit { .. } => "submit",
            Command::BeginEdit { .. } => "begin_edit",
            Command::CancelEdit => "cancel_edit",
            Command::Delete { .. } => "delete",
            Command::ClearAll { .. } => "clear_all",
            Command::DismissNotice => "dismiss_notice",
            Command::Snapshot => "snapshot",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Reply to a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub view: View,
    pub redirect_url: Option<String>,
}

type Reply = oneshot::Sender<Result<Outcome, ControllerError>>;

struct Envelope {
    command: Command,
    reply: Reply,
}

struct FetchDone {
    seq: u64,
    epoch: u64,
    /// Token the fetch was sent with.
    access_token: String,
    retried: bool,
    result: FetchResult,
}

/// A reply waiting for fetch `seq` to land.
struct Pending {
    seq: u64,
    reply: Reply,
    result: Result<Option<String>, ControllerError>,
}

/// Result of executing one command.
struct Step {
    result: Result<Option<String>, ControllerError>,
    after_fetch: Option<u64>,
}

impl Step {
    fn now(result: Result<Option<String>, ControllerError>) -> Self {
        Self {
            result,
            after_fetch: None,
        }
    }

    fn ok() -> Self {
        Self::now(Ok(None))
    }
}

/// Cloneable front end of a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Envelope>,
    view: watch::Receiver<View>,
}

impl ControllerHandle {
    pub async fn send(&self, command: Command) -> Result<Outcome, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| ControllerError::Stopped)?;
        rx.await.map_err(|_| ControllerError::Stopped)?
    }

    /// The latest published view.
    pub fn view(&self) -> View {
        self.view.borrow().clone()
    }

    /// Receiver notified on every view change.
    pub fn watch(&self) -> watch::Receiver<View> {
        self.view.clone()
    }

    pub async fn sign_in(&self) -> Result<Outcome, ControllerError> {
        self.send(Command::SignIn).await
    }

    pub async fn complete_sign_in(&self, callback_url: &str) -> Result<Outcome, ControllerError> {
        self.send(Command::CompleteSignIn {
            callback_url: callback_url.to_string(),
        })
        .await
    }

    pub async fn sign_out(&self) -> Result<Outcome, ControllerError> {
        self.send(Command::SignOut).await
    }

    pub async fn refresh(&self) -> Result<Outcome, ControllerError> {
        self.send(Command::Refresh).await
    }

    pub async fn insert(&self, title: &str, url: &str) -> Result<Outcome, ControllerError> {
        self.send(Command::Insert {
            title: title.to_string(),
            url: url.to_string(),
        })
        .await
    }

    pub async fn update(&self, id: &BookmarkId, title: &str, url: &str) -> Result<Outcome, ControllerError> {
        self.send(Command::Update {
            id: id.clone(),
            title: title.to_string(),
            url: url.to_string(),
        })
        .await
    }

    pub async fn set_form(&self, title: Option<&str>, url: Option<&str>) -> Result<Outcome, ControllerError> {
        self.send(Command::SetForm {
            title: title.map(String::from),
            url: url.map(String::from),
        })
        .await
    }

    pub async fn submit(&self) -> Result<Outcome, ControllerError> {
        self.send(Command::Submit { title: None, url: None }).await
    }

    pub async fn begin_edit(&self, id: &BookmarkId) -> Result<Outcome, ControllerError> {
        self.send(Command::BeginEdit { id: id.clone() }).await
    }

    pub async fn cancel_edit(&self) -> Result<Outcome, ControllerError> {
        self.send(Command::CancelEdit).await
    }

    pub async fn delete(&self, id: &BookmarkId) -> Result<Outcome, ControllerError> {
        self.send(Command::Delete { id: id.clone() }).await
    }

    /// Bulk delete with an answer already collected from the user.
    pub async fn clear_all(&self, confirmed: bool) -> Result<Outcome, ControllerError> {
        self.send(Command::ClearAll {
            confirmer: Arc::new(Preconfirmed(confirmed)),
        })
        .await
    }

    pub async fn dismiss_notice(&self) -> Result<Outcome, ControllerError> {
        self.send(Command::DismissNotice).await
    }

    pub async fn snapshot(&self) -> Result<Outcome, ControllerError> {
        self.send(Command::Snapshot).await
    }

    pub async fn shutdown(&self) -> Result<Outcome, ControllerError> {
        self.send(Command::Shutdown).await
    }
}

pub struct Controller {
    session: SessionManager,
    bookmarks: BookmarkManager,
    feed: ChangeFeedManager,
    form: FormManager,
    notice: Option<Notice>,
    auth_settings: AuthSettings,
    loading: bool,
    /// Bumped on every identity change; older fetches are discarded.
    epoch: u64,
    next_seq: u64,
    pending: Vec<Pending>,
    fetch_tx: mpsc::UnboundedSender<FetchDone>,
    fetch_rx: mpsc::UnboundedReceiver<FetchDone>,
    /// When to try reopening a feed that went down.
    feed_retry_at: Option<Instant>,
    feed_backoff: Duration,
    view_tx: watch::Sender<View>,
}

impl Controller {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        store: Arc<dyn BookmarkStore>,
        feed: Arc<dyn ChangeFeed>,
        settings: &AppSettings,
    ) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(View::Loading);
        Self {
            session: SessionManager::new(auth),
            bookmarks: BookmarkManager::new(store),
            feed: ChangeFeedManager::new(feed, settings.realtime.clone()),
            form: FormManager::new(),
            notice: None,
            auth_settings: settings.auth.clone(),
            loading: true,
            epoch: 0,
            next_seq: 0,
            pending: Vec::new(),
            fetch_tx,
            fetch_rx,
            feed_retry_at: None,
            feed_backoff: FEED_RETRY_MIN,
            view_tx,
        }
    }

    /// Starts the loop on the current runtime.
    pub fn spawn(self) -> (ControllerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let handle = ControllerHandle {
            tx,
            view: self.view_tx.subscribe(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Envelope>) {
        self.start().await;
        self.publish();

        loop {
            let feed_retry_at = self.feed_retry_at;
            tokio::select! {
                envelope = commands.recv() => match envelope {
                    Some(Envelope { command: Command::Shutdown, reply }) => {
                        self.respond(reply, Ok(None));
                        break;
                    }
                    Some(envelope) => self.handle(envelope).await,
                    None => break,
                },
                event = self.session.next_event() => match event {
                    Some(event) => {
                        let transition = self.session.apply(&event);
                        self.on_transition(transition).await;
                    }
                    None => {
                        tracing::warn!("auth listener closed");
                        self.session.teardown();
                    }
                },
                change = self.feed.next_event() => match change {
                    Some(change) => self.on_change(&change).await,
                    None => self.on_feed_ended(),
                },
                Some(done) = self.fetch_rx.recv() => self.on_fetch_done(done).await,
                _ = sleep_until(feed_retry_at) => {
                    self.reopen_feed().await;
                }
            }
            self.publish();
        }

        self.teardown();
        tracing::info!("controller stopped");
    }

    async fn start(&mut self) {
        let existing = self.session.initialize().await;
        self.loading = false;
        if existing.is_some() {
            self.on_transition(SessionTransition::Established).await;
        }
    }

    fn teardown(&mut self) {
        self.feed.close();
        self.session.teardown();
        self.pending.clear();
    }

    fn view(&self) -> View {
        view::compose(&ViewInput {
            loading: self.loading,
            session: self.session.current(),
            items: self.bookmarks.items(),
            form: &self.form,
            notice: self.notice.as_ref(),
            provider: &self.auth_settings.provider,
        })
    }

    fn publish(&self) {
        let next = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn respond(&self, reply: Reply, result: Result<Option<String>, ControllerError>) {
        let outcome = result.map(|redirect_url| Outcome {
            view: self.view(),
            redirect_url,
        });
        // The caller may have stopped waiting.
        let _ = reply.send(outcome);
    }

    async fn handle(&mut self, envelope: Envelope) {
        let Envelope { command, reply } = envelope;
        tracing::debug!(command = command.name(), "command");
        if !matches!(command, Command::Snapshot) {
            self.notice = None;
        }

        let step = self.execute(command).await;
        if let Err(e) = &step.result {
            self.notice = Some(match e {
                ControllerError::Validation(_) => Notice::alert(e.to_string()),
                _ => Notice::error(e.to_string()),
            });
        }
        match step.after_fetch {
            Some(seq) => self.pending.push(Pending {
                seq,
                reply,
                result: step.result,
            }),
            None => self.respond(reply, step.result),
        }
    }

    fn require_session(&self) -> Result<Session, ControllerError> {
        self.session
            .current()
            .cloned()
            .ok_or(ControllerError::NotSignedIn)
    }

    /// The held session, refreshed first when its access token has expired.
    ///
    /// If the refresh cannot reach the provider the stale session is
    /// returned and the backend decides.
    async fn active_session(&mut self) -> Result<Session, ControllerError> {
        let session = self.require_session()?;
        if !session.is_expired(chrono::Utc::now().timestamp()) {
            return Ok(session);
        }
        tracing::debug!(user_id = %session.user.id, "access token expired, refreshing");
        match self.session.refresh().await {
            Ok(transition) => {
                self.on_transition(transition).await;
                self.require_session()
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, keeping held token");
                Ok(session)
            }
        }
    }

    /// Gets a session whose token differs from the refused `stale_token`.
    ///
    /// A session already renewed since then is returned as is; otherwise the
    /// refresh token is traded in. `None` when there is nothing to retry
    /// with, including when the provider ended the session.
    async fn reauthorize(&mut self, stale_token: &str) -> Option<Session> {
        let renewed = |current: Option<&Session>| {
            current
                .filter(|session| session.access_token != stale_token)
                .cloned()
        };
        if let Some(session) = renewed(self.session.current()) {
            return Some(session);
        }
        tracing::info!("access token refused, refreshing");
        match self.session.refresh().await {
            Ok(transition) => {
                self.on_transition(transition).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                return None;
            }
        }
        renewed(self.session.current())
    }

    async fn execute(&mut self, command: Command) -> Step {
        match command {
            Command::SignIn => {
                let result = self
                    .session
                    .sign_in_url(&self.auth_settings.provider, &self.auth_settings.redirect_to)
                    .await
                    .map(Some)
                    .map_err(ControllerError::from);
                Step::now(result)
            }
            Command::CompleteSignIn { callback_url } => {
                match self.session.complete_sign_in(&callback_url).await {
                    Ok(transition) => Step {
                        result: Ok(None),
                        after_fetch: self.on_transition(transition).await,
                    },
                    Err(e) => Step::now(Err(e.into())),
                }
            }
            Command::SignOut => {
                let was_signed_in = self.session.is_signed_in();
                let result = self.session.sign_out().await;
                if was_signed_in {
                    self.on_transition(SessionTransition::Cleared).await;
                }
                Step::now(result.map(|_| None).map_err(ControllerError::from))
            }
            Command::Refresh => {
                if let Err(e) = self.active_session().await {
                    return Step::now(Err(e));
                }
                let reopened = match self.feed_retry_at {
                    Some(_) => self.reopen_feed().await,
                    None => None,
                };
                Step {
                    result: Ok(None),
                    after_fetch: reopened.or_else(|| self.spawn_fetch()),
                }
            }
            Command::Insert { title, url } => self.write_insert(&title, &url, false).await,
            Command::Update { id, title, url } => self.write_update(&id, &title, &url, false).await,
            Command::SetForm { title, url } => {
                self.set_form(title, url);
                Step::ok()
            }
            Command::Submit { title, url } => {
                self.set_form(title, url);
                match self.form.submission() {
                    Submission::Insert { title, url } => self.write_insert(&title, &url, true).await,
                    Submission::Update { id, title, url } => {
                        self.write_update(&id, &title, &url, true).await
                    }
                }
            }
            Command::BeginEdit { id } => match self.bookmarks.get(&id) {
                Some(bookmark) => {
                    let bookmark = bookmark.clone();
                    self.form.begin_edit(&bookmark);
                    Step::ok()
                }
                None => Step::now(Err(ControllerError::Bookmark(BookmarkError::NotFound(id.to_string())))),
            },
            Command::CancelEdit => {
                self.form.cancel_edit();
                Step::ok()
            }
            Command::Delete { id } => {
                let session = match self.active_session().await {
                    Ok(session) => session,
                    Err(e) => return Step::now(Err(e)),
                };
                let mut result = self.bookmarks.delete_one(&session, &id).await;
                if refused(&result) {
                    if let Some(fresh) = self.reauthorize(&session.access_token).await {
                        result = self.bookmarks.delete_one(&fresh, &id).await;
                    }
                }
                self.after_write(result.map(|_| None))
            }
            Command::ClearAll { confirmer } => {
                let session = match self.active_session().await {
                    Ok(session) => session,
                    Err(e) => return Step::now(Err(e)),
                };
                let mut result = self
                    .bookmarks
                    .delete_all_for_owner(&session, confirmer.as_ref())
                    .await;
                if refused(&result) {
                    // Already confirmed once.
                    if let Some(fresh) = self.reauthorize(&session.access_token).await {
                        result = self
                            .bookmarks
                            .delete_all_for_owner(&fresh, &Preconfirmed(true))
                            .await;
                    }
                }
                match result {
                    Ok(ClearOutcome::Declined) => {
                        self.notice = Some(Notice::info("Nothing was deleted."));
                        Step::ok()
                    }
                    Ok(ClearOutcome::Cleared) => self.after_write(Ok(None)),
                    Err(e) => self.after_write(Err(e)),
                }
            }
            Command::DismissNotice => {
                self.notice = None;
                Step::ok()
            }
            Command::Snapshot => Step::ok(),
            // Handled by the loop before dispatch.
            Command::Shutdown => Step::ok(),
        }
    }

    fn set_form(&mut self, title: Option<String>, url: Option<String>) {
        if let Some(title) = title {
            self.form.set_title(&title);
        }
        if let Some(url) = url {
            self.form.set_url(&url);
        }
    }

    async fn write_insert(&mut self, title: &str, url: &str, from_form: bool) -> Step {
        let session = match self.active_session().await {
            Ok(session) => session,
            Err(e) => return Step::now(Err(e)),
        };
        let mut result = self.bookmarks.insert(&session, title, url).await;
        if refused(&result) {
            if let Some(fresh) = self.reauthorize(&session.access_token).await {
                result = self.bookmarks.insert(&fresh, title, url).await;
            }
        }
        if result.is_ok() && from_form {
            self.form.reset();
        }
        self.after_write(result.map(|_| None))
    }

    async fn write_update(&mut self, id: &BookmarkId, title: &str, url: &str, from_form: bool) -> Step {
        let session = match self.active_session().await {
            Ok(session) => session,
            Err(e) => return Step::now(Err(e)),
        };
        let mut result = self.bookmarks.update(&session, id, title, url).await;
        if refused(&result) {
            if let Some(fresh) = self.reauthorize(&session.access_token).await {
                result = self.bookmarks.update(&fresh, id, title, url).await;
            }
        }
        if result.is_ok() && (from_form || self.form.editing_id() == Some(id)) {
            self.form.reset();
        }
        self.after_write(result.map(|_| None))
    }

    /// Rejected input stops here; anything that reached the store is
    /// followed by a reconciling fetch.
    fn after_write(&mut self, result: Result<Option<String>, BookmarkError>) -> Step {
        if let Err(BookmarkError::Validation(_) | BookmarkError::NotAuthenticated) = &result {
            return Step::now(result.map_err(ControllerError::from));
        }
        if let Err(e) = &result {
            tracing::warn!(error = %e, "bookmark write failed");
        }
        Step {
            result: result.map_err(ControllerError::from),
            after_fetch: self.spawn_fetch(),
        }
    }

    /// Spawns a fetch for the current session. `None` when signed out.
    fn spawn_fetch(&mut self) -> Option<u64> {
        let session = self.session.current()?.clone();
        self.next_seq += 1;
        let seq = self.next_seq;
        self.start_fetch(seq, session, false);
        Some(seq)
    }

    fn start_fetch(&self, seq: u64, session: Session, retried: bool) {
        let epoch = self.epoch;
        let access_token = session.access_token.clone();
        let task = self.bookmarks.fetch_task(session);
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = task.await;
            let _ = tx.send(FetchDone {
                seq,
                epoch,
                access_token,
                retried,
                result,
            });
        });
        tracing::debug!(seq, retried, "fetch started");
    }

    async fn on_fetch_done(&mut self, done: FetchDone) {
        if refused(&done.result) && !done.retried && done.epoch == self.epoch {
            let fresh = self.reauthorize(&done.access_token).await;
            if let Some(session) = fresh.filter(|_| done.epoch == self.epoch) {
                // Same seq, so replies waiting on it still match.
                tracing::debug!(seq = done.seq, "retrying fetch with renewed token");
                self.start_fetch(done.seq, session, true);
                return;
            }
        }

        if done.epoch == self.epoch {
            match self.bookmarks.apply_fetch(done.result) {
                Ok(count) => tracing::debug!(seq = done.seq, count, "fetch applied"),
                Err(e) => self.notice = Some(Notice::error(format!("Could not load bookmarks: {e}"))),
            }
            if self.form.retain_existing(self.bookmarks.items()) {
                tracing::debug!("edited bookmark disappeared, leaving edit mode");
            }
        } else {
            tracing::debug!(seq = done.seq, "discarding fetch from previous session");
        }

        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.seq == done.seq);
        self.pending = waiting;
        for pending in ready {
            self.respond(pending.reply, pending.result);
        }
    }

    async fn on_change(&mut self, change: &ChangeEvent) {
        tracing::info!(
            kind = ?change.kind,
            table = %change.table,
            record = ?change.record,
            "change received"
        );
        if self.active_session().await.is_ok() {
            self.spawn_fetch();
        }
    }

    fn on_feed_ended(&mut self) {
        self.feed.close();
        tracing::warn!("change feed ended, live updates stopped");
        self.notice = Some(Notice::error(FEED_STOPPED));
        self.schedule_feed_retry();
    }

    fn schedule_feed_retry(&mut self) {
        tracing::debug!(retry_in = ?self.feed_backoff, "change feed reopen scheduled");
        self.feed_retry_at = Some(Instant::now() + self.feed_backoff);
        self.feed_backoff = (self.feed_backoff * 2).min(FEED_RETRY_MAX);
    }

    fn reset_feed_retry(&mut self) {
        self.feed_retry_at = None;
        self.feed_backoff = FEED_RETRY_MIN;
    }

    /// Resubscribes after the feed went down and starts a catch-up fetch for
    /// whatever changed meanwhile. Returns that fetch's seq.
    async fn reopen_feed(&mut self) -> Option<u64> {
        self.feed_retry_at = None;
        let session = self.active_session().await.ok()?;
        match self.feed.open(&session).await {
            Ok(_) => {
                tracing::info!(user_id = %session.user.id, "change feed reopened");
                self.feed_backoff = FEED_RETRY_MIN;
                if self.notice.as_ref().is_some_and(is_feed_notice) {
                    self.notice = None;
                }
                self.spawn_fetch()
            }
            Err(e) => {
                tracing::warn!(error = %e, "change feed still unavailable");
                self.notice = Some(Notice::error(FEED_STOPPED));
                self.schedule_feed_retry();
                None
            }
        }
    }

    /// Rebuilds dependent state after the session changed. Returns the seq of
    /// the fetch it started, if any.
    async fn on_transition(&mut self, transition: SessionTransition) -> Option<u64> {
        if transition.identity_changed() {
            self.epoch += 1;
            self.bookmarks.clear();
            self.form.reset();
            self.reset_feed_retry();
        }
        match transition {
            SessionTransition::Established | SessionTransition::Switched => {
                let session = self.session.current()?.clone();
                tracing::info!(user_id = %session.user.id, "session established");
                if let Err(e) = self.feed.open(&session).await {
                    tracing::warn!(error = %e, "change feed unavailable");
                    self.notice = Some(Notice::error(format!("Live updates unavailable: {e}")));
                    self.schedule_feed_retry();
                }
                self.spawn_fetch()
            }
            SessionTransition::Cleared => {
                self.feed.close();
                tracing::info!("session cleared");
                None
            }
            SessionTransition::Refreshed | SessionTransition::Unchanged => None,
        }
    }
}

fn refused<T>(result: &Result<T, BookmarkError>) -> bool {
    matches!(result, Err(e) if e.is_unauthorized())
}

fn is_feed_notice(notice: &Notice) -> bool {
    notice.message == FEED_STOPPED || notice.message.starts_with("Live updates unavailable")
}

/// Sleeps until `deadline`; never resolves without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
