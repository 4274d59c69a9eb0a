//! Unit tests for the SessionManager: initialization, auth-state
//! transitions and listener lifetime.

use std::sync::Arc;
use std::time::Duration;

use smartmarks::backend::memory::MemoryBackend;
use smartmarks::managers::session_manager::{SessionManager, SessionManagerTrait, SessionTransition};
use smartmarks::types::errors::AuthError;
use smartmarks::types::events::{AuthChange, AuthEvent};

fn setup() -> (MemoryBackend, SessionManager) {
    let backend = MemoryBackend::new();
    let mgr = SessionManager::new(Arc::new(backend.clone()));
    (backend, mgr)
}

#[tokio::test]
async fn test_initialize_without_session() {
    let (backend, mut mgr) = setup();
    assert_eq!(mgr.initialize().await, None);
    assert!(!mgr.is_signed_in());
    assert!(mgr.has_listener());
    assert_eq!(backend.auth_listener_count(), 1);
}

#[tokio::test]
async fn test_initialize_picks_up_existing_session() {
    let (backend, mut mgr) = setup();
    let session = backend.sign_in_as("u1", None, Some("Ada"));
    assert_eq!(mgr.initialize().await, Some(session.clone()));
    assert_eq!(mgr.current(), Some(&session));
}

#[tokio::test]
async fn test_initialize_runs_once() {
    let (backend, mut mgr) = setup();
    mgr.initialize().await;
    mgr.initialize().await;
    assert_eq!(backend.calls().get_session, 1);
    assert_eq!(backend.auth_listener_count(), 1);
}

#[tokio::test]
async fn test_failed_lookup_leaves_session_absent() {
    let (backend, mut mgr) = setup();
    backend.sign_in_as("u1", None, None);
    backend.fail_get_session(Some(AuthError::Network("offline".into())));

    assert_eq!(mgr.initialize().await, None);
    assert!(!mgr.is_signed_in());
    assert!(mgr.has_listener());
}

#[tokio::test]
async fn test_transitions() {
    let (backend, mut mgr) = setup();
    mgr.initialize().await;

    let ada = backend.sign_in_as("u1", None, Some("Ada"));
    assert_eq!(mgr.apply(&AuthEvent::signed_in(ada.clone())), SessionTransition::Established);
    assert_eq!(mgr.apply(&AuthEvent::signed_in(ada)), SessionTransition::Unchanged);

    let refreshed = backend.refresh_tokens().unwrap();
    assert_eq!(
        mgr.apply(&AuthEvent::token_refreshed(refreshed)),
        SessionTransition::Refreshed
    );

    let bob = backend.sign_in_as("u2", None, Some("Bob"));
    assert_eq!(mgr.apply(&AuthEvent::signed_in(bob)), SessionTransition::Switched);

    assert_eq!(mgr.apply(&AuthEvent::signed_out()), SessionTransition::Cleared);
    assert_eq!(mgr.apply(&AuthEvent::signed_out()), SessionTransition::Unchanged);
}

#[test]
fn test_identity_changes() {
    assert!(SessionTransition::Established.identity_changed());
    assert!(SessionTransition::Switched.identity_changed());
    assert!(SessionTransition::Cleared.identity_changed());
    assert!(!SessionTransition::Refreshed.identity_changed());
    assert!(!SessionTransition::Unchanged.identity_changed());
}

#[tokio::test]
async fn test_listener_receives_backend_events() {
    let (backend, mut mgr) = setup();
    mgr.initialize().await;

    backend.sign_in_as("u1", None, None);
    let event = tokio::time::timeout(Duration::from_secs(1), mgr.next_event())
        .await
        .expect("event should arrive")
        .expect("listener open");
    assert_eq!(event.change, AuthChange::SignedIn);
    assert_eq!(event.session.map(|s| s.user.id), Some("u1".to_string()));
}

#[tokio::test]
async fn test_next_event_pends_without_listener() {
    let (backend, mut mgr) = setup();
    backend.sign_in_as("u1", None, None);
    let waited = tokio::time::timeout(Duration::from_millis(50), mgr.next_event()).await;
    assert!(waited.is_err());
}

#[tokio::test]
async fn test_teardown_deregisters_listener() {
    let (backend, mut mgr) = setup();
    mgr.initialize().await;
    assert_eq!(backend.auth_listener_count(), 1);

    mgr.teardown();
    assert!(!mgr.has_listener());
    assert_eq!(backend.auth_listener_count(), 0);
}

#[tokio::test]
async fn test_drop_deregisters_listener() {
    let (backend, mut mgr) = setup();
    mgr.initialize().await;
    drop(mgr);
    assert_eq!(backend.auth_listener_count(), 0);
}

#[tokio::test]
async fn test_complete_sign_in_from_callback() {
    let (_backend, mut mgr) = setup();
    mgr.initialize().await;

    let transition = mgr
        .complete_sign_in("http://localhost:3000/#user=u1&email=ada%40example.com&name=Ada")
        .await
        .unwrap();
    assert_eq!(transition, SessionTransition::Established);
    let session = mgr.current().unwrap();
    assert_eq!(session.user.email.as_deref(), Some("ada@example.com"));
    assert_eq!(session.greeting_name(), "Ada");
}

#[tokio::test]
async fn test_complete_sign_in_rejects_error_callback() {
    let (_backend, mut mgr) = setup();
    let err = mgr
        .complete_sign_in("http://localhost:3000/?error=access_denied")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidCallback("access_denied".into()));
    assert!(!mgr.is_signed_in());
}

#[tokio::test]
async fn test_sign_out_clears_both_sides() {
    let (backend, mut mgr) = setup();
    backend.sign_in_as("u1", None, None);
    mgr.initialize().await;

    assert_eq!(mgr.sign_out().await.unwrap(), SessionTransition::Cleared);
    assert!(!mgr.is_signed_in());

    let mut fresh = SessionManager::new(Arc::new(backend.clone()));
    assert_eq!(fresh.initialize().await, None);
}

#[tokio::test]
async fn test_sign_in_url_names_provider_and_redirect() {
    let (_backend, mgr) = setup();
    let url = mgr.sign_in_url("google", "http://localhost:3000").await.unwrap();
    assert!(url.contains("provider=google"));
    assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A3000"));
}

#[tokio::test]
async fn test_refresh_swaps_tokens_for_same_user() {
    let (backend, mut mgr) = setup();
    let old = backend.sign_in_as("u1", None, None);
    mgr.initialize().await;

    assert_eq!(mgr.refresh().await.unwrap(), SessionTransition::Refreshed);
    let current = mgr.current().unwrap();
    assert_ne!(current.access_token, old.access_token);
    assert_eq!(current.user.id, "u1");
    assert_eq!(backend.calls().refresh, 1);
}

#[tokio::test]
async fn test_refused_refresh_clears_session() {
    let (backend, mut mgr) = setup();
    backend.sign_in_as("u1", None, None);
    mgr.initialize().await;
    backend.fail_refresh(Some(AuthError::Provider {
        status: 400,
        message: "Invalid Refresh Token".into(),
    }));

    assert_eq!(mgr.refresh().await.unwrap(), SessionTransition::Cleared);
    assert!(!mgr.is_signed_in());
}

#[tokio::test]
async fn test_unreachable_refresh_keeps_session() {
    let (backend, mut mgr) = setup();
    let held = backend.sign_in_as("u1", None, None);
    mgr.initialize().await;
    backend.fail_refresh(Some(AuthError::Network("offline".into())));

    assert!(matches!(mgr.refresh().await, Err(AuthError::Network(_))));
    assert_eq!(mgr.current(), Some(&held));
}
