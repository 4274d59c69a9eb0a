//! RPC method handler for the smartmarks JSON-RPC bridge.
//!
//! Kept apart from `rpc_server.rs` so it can be tested without stdio.
//! Every method forwards to the controller and answers with the resulting
//! view, so the UI shell never has to track state on its own.

use serde_json::{json, Value};

use crate::controller::{Command, ControllerHandle, Outcome};
use crate::types::bookmark::BookmarkId;

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn required<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    str_param(params, key).ok_or_else(|| format!("missing {}", key))
}

/// Accepts the id as a JSON string or number.
fn id_param(params: &Value) -> Result<BookmarkId, String> {
    match params.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Ok(BookmarkId::new(s.as_str())),
        Some(Value::Number(n)) => Ok(BookmarkId::new(n.to_string())),
        _ => Err("missing id".to_string()),
    }
}

fn outcome_json(outcome: Outcome) -> Result<Value, String> {
    let view = serde_json::to_value(&outcome.view).map_err(|e| e.to_string())?;
    let mut result = json!({ "view": view });
    if let Some(url) = outcome.redirect_url {
        result["redirect_url"] = Value::String(url);
    }
    Ok(result)
}

/// Dispatches one JSON-RPC call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with a user-facing message.
pub async fn handle_method(handle: &ControllerHandle, method: &str, params: &Value) -> Result<Value, String> {
    let command = match method {
        "ping" => return Ok(json!({"pong": true})),
        "view.get" => Command::Snapshot,

        // ─── Auth ───
        "auth.sign_in" => Command::SignIn,
        "auth.complete" => Command::CompleteSignIn {
            callback_url: required(params, "callback_url")?.to_string(),
        },
        "auth.sign_out" => Command::SignOut,

        // ─── Bookmarks ───
        "bookmark.list" => {
            let view = handle.snapshot().await.map_err(|e| e.to_string())?.view;
            let items = serde_json::to_value(view.items()).map_err(|e| e.to_string())?;
            return Ok(json!({ "items": items }));
        }
        "bookmark.refresh" => Command::Refresh,
        "bookmark.add" => Command::Insert {
            title: required(params, "title")?.to_string(),
            url: required(params, "url")?.to_string(),
        },
        "bookmark.update" => Command::Update {
            id: id_param(params)?,
            title: required(params, "title")?.to_string(),
            url: required(params, "url")?.to_string(),
        },
        "bookmark.delete" => Command::Delete { id: id_param(params)? },
        "bookmark.clear" => {
            let confirmed = params
                .get("confirmed")
                .and_then(Value::as_bool)
                .ok_or("missing confirmed")?;
            return handle.clear_all(confirmed).await.map_err(|e| e.to_string()).and_then(outcome_json);
        }

        // ─── Form ───
        "form.set" => Command::SetForm {
            title: str_param(params, "title").map(String::from),
            url: str_param(params, "url").map(String::from),
        },
        "form.edit" => Command::BeginEdit { id: id_param(params)? },
        "form.cancel" => Command::CancelEdit,
        "form.submit" => Command::Submit {
            title: str_param(params, "title").map(String::from),
            url: str_param(params, "url").map(String::from),
        },

        "notice.dismiss" => Command::DismissNotice,

        _ => return Err(format!("unknown method: {}", method)),
    };

    let outcome = handle.send(command).await.map_err(|e| e.to_string())?;
    outcome_json(outcome)
}
