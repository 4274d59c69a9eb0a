//! Unit tests for the RPC handler: every JSON-RPC method dispatched by
//! `handle_method`.
//!
//! These tests go through the same code path as the `smartmarks-rpc`
//! binary, with the in-process backend behind the controller.

use serde_json::{json, Value};

use smartmarks::app::{App, Backends};
use smartmarks::backend::memory::MemoryBackend;
use smartmarks::rpc_handler::handle_method;
use smartmarks::types::settings::AppSettings;

fn setup() -> (MemoryBackend, App) {
    let backend = MemoryBackend::new();
    let app = App::start(AppSettings::default(), Backends::memory(&backend));
    (backend, app)
}

async fn call(app: &App, method: &str, params: Value) -> Result<Value, String> {
    handle_method(&app.handle, method, &params).await
}

/// Signs in through the RPC surface, as a UI shell would after the redirect.
async fn sign_in(app: &App) {
    call(app, "auth.complete", json!({"callback_url": "http://localhost:3000/#user=u1&name=Ada"}))
        .await
        .unwrap();
}

// ─── Ping / unknown ───

#[tokio::test]
async fn test_ping() {
    let (_backend, app) = setup();
    let res = call(&app, "ping", json!({})).await.unwrap();
    assert_eq!(res, json!({"pong": true}));
}

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let (_backend, app) = setup();
    let err = call(&app, "nonexistent.method", json!({})).await.unwrap_err();
    assert!(err.contains("unknown method"));
}

// ─── Auth ───

#[tokio::test]
async fn test_view_get_starts_on_login() {
    let (_backend, app) = setup();
    app.handle.snapshot().await.unwrap();
    let res = call(&app, "view.get", json!({})).await.unwrap();
    assert_eq!(res["view"]["screen"], "login");
    assert_eq!(res["view"]["action"], "Continue with Google");
}

#[tokio::test]
async fn test_sign_in_returns_redirect_url() {
    let (_backend, app) = setup();
    let res = call(&app, "auth.sign_in", json!({})).await.unwrap();
    let url = res["redirect_url"].as_str().unwrap();
    assert!(url.contains("provider=google"));
}

#[tokio::test]
async fn test_auth_complete_shows_home() {
    let (_backend, app) = setup();
    let res = call(
        &app,
        "auth.complete",
        json!({"callback_url": "http://localhost:3000/#user=u1&name=Ada"}),
    )
    .await
    .unwrap();
    assert_eq!(res["view"]["screen"], "home");
    assert_eq!(res["view"]["greeting"], "Hi, Ada");
    assert!(res.get("redirect_url").is_none());
}

#[tokio::test]
async fn test_auth_complete_requires_callback_url() {
    let (_backend, app) = setup();
    let err = call(&app, "auth.complete", json!({})).await.unwrap_err();
    assert_eq!(err, "missing callback_url");
}

#[tokio::test]
async fn test_sign_out_returns_login() {
    let (backend, app) = setup();
    sign_in(&app).await;
    let res = call(&app, "auth.sign_out", json!({})).await.unwrap();
    assert_eq!(res["view"]["screen"], "login");
    assert_eq!(backend.subscriber_count(), 0);
}

// ─── Bookmarks ───

#[tokio::test]
async fn test_bookmark_add_and_list() {
    let (_backend, app) = setup();
    sign_in(&app).await;

    let res = call(&app, "bookmark.add", json!({"title": "Docs", "url": "example.com/readme"}))
        .await
        .unwrap();
    assert_eq!(res["view"]["items"][0]["url"], "https://example.com/readme");

    let list = call(&app, "bookmark.list", json!({})).await.unwrap();
    let arr = list["items"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["title"], "Docs");
    assert_eq!(arr[0]["index"], 1);
}

#[tokio::test]
async fn test_bookmark_add_unsupported_scheme() {
    let (backend, app) = setup();
    sign_in(&app).await;
    let err = call(&app, "bookmark.add", json!({"title": "Bad", "url": "ftp://bad.com"}))
        .await
        .unwrap_err();
    assert!(err.contains("Unsupported URL scheme"));
    assert_eq!(backend.calls().writes(), 0);
}

#[tokio::test]
async fn test_bookmark_add_missing_params() {
    let (_backend, app) = setup();
    sign_in(&app).await;
    assert_eq!(
        call(&app, "bookmark.add", json!({"url": "https://x.com"})).await.unwrap_err(),
        "missing title"
    );
    assert_eq!(
        call(&app, "bookmark.add", json!({"title": "X"})).await.unwrap_err(),
        "missing url"
    );
}

#[tokio::test]
async fn test_bookmark_add_signed_out() {
    let (_backend, app) = setup();
    let err = call(&app, "bookmark.add", json!({"title": "X", "url": "x.com"}))
        .await
        .unwrap_err();
    assert_eq!(err, "Not signed in");
}

#[tokio::test]
async fn test_bookmark_update_and_delete() {
    let (backend, app) = setup();
    sign_in(&app).await;
    let res = call(&app, "bookmark.add", json!({"title": "Old", "url": "old.example"}))
        .await
        .unwrap();
    let id = res["view"]["items"][0]["id"].as_str().unwrap().to_string();

    let res = call(
        &app,
        "bookmark.update",
        json!({"id": id, "title": "New", "url": "new.example"}),
    )
    .await
    .unwrap();
    assert_eq!(res["view"]["items"][0]["title"], "New");
    assert_eq!(res["view"]["items"][0]["id"], id.as_str());

    let res = call(&app, "bookmark.delete", json!({"id": id})).await.unwrap();
    assert_eq!(res["view"]["items"].as_array().unwrap().len(), 0);
    assert!(backend.rows_for("u1").is_empty());
}

#[tokio::test]
async fn test_bookmark_delete_requires_id() {
    let (_backend, app) = setup();
    sign_in(&app).await;
    assert_eq!(
        call(&app, "bookmark.delete", json!({})).await.unwrap_err(),
        "missing id"
    );
}

#[tokio::test]
async fn test_bookmark_clear_requires_explicit_answer() {
    let (backend, app) = setup();
    sign_in(&app).await;
    call(&app, "bookmark.add", json!({"title": "A", "url": "a.example"})).await.unwrap();

    assert_eq!(
        call(&app, "bookmark.clear", json!({})).await.unwrap_err(),
        "missing confirmed"
    );
    let res = call(&app, "bookmark.clear", json!({"confirmed": false})).await.unwrap();
    assert_eq!(res["view"]["notice"]["message"], "Nothing was deleted.");
    assert_eq!(backend.calls().delete_owner, 0);

    let res = call(&app, "bookmark.clear", json!({"confirmed": true})).await.unwrap();
    assert_eq!(res["view"]["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_bookmark_refresh_picks_up_external_rows() {
    let (backend, app) = setup();
    sign_in(&app).await;
    backend.seed("u1", "Elsewhere", "https://example.com");

    let res = call(&app, "bookmark.refresh", json!({})).await.unwrap();
    assert_eq!(res["view"]["items"][0]["title"], "Elsewhere");
}

// ─── Form ───

#[tokio::test]
async fn test_form_edit_and_submit() {
    let (backend, app) = setup();
    sign_in(&app).await;
    let res = call(&app, "bookmark.add", json!({"title": "Docs", "url": "example.com"}))
        .await
        .unwrap();
    let id = res["view"]["items"][0]["id"].clone();

    let res = call(&app, "form.edit", json!({"id": id})).await.unwrap();
    assert_eq!(res["view"]["form"]["submit_label"], "Update");
    assert_eq!(res["view"]["form"]["title"], "Docs");

    let res = call(&app, "form.submit", json!({"title": "Docs v2"})).await.unwrap();
    assert_eq!(res["view"]["items"][0]["title"], "Docs v2");
    assert_eq!(res["view"]["form"]["submit_label"], "Add");
    assert_eq!(backend.calls().replace, 1);
}

#[tokio::test]
async fn test_form_set_and_cancel() {
    let (_backend, app) = setup();
    sign_in(&app).await;

    let res = call(&app, "form.set", json!({"title": "Draft"})).await.unwrap();
    assert_eq!(res["view"]["form"]["title"], "Draft");
    assert_eq!(res["view"]["form"]["url"], "");

    let res = call(&app, "form.cancel", json!({})).await.unwrap();
    assert_eq!(res["view"]["form"]["title"], "");
}

#[tokio::test]
async fn test_notice_dismiss() {
    let (_backend, app) = setup();
    sign_in(&app).await;
    let _ = call(&app, "bookmark.add", json!({"title": " ", "url": "x.com"})).await;

    let res = call(&app, "view.get", json!({})).await.unwrap();
    assert_eq!(res["view"]["notice"]["level"], "alert");

    let res = call(&app, "notice.dismiss", json!({})).await.unwrap();
    assert!(res["view"]["notice"].is_null());
}
