use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::Session;

/// Kind of auth-state change reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChange {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One auth-state notification; `session` is the new value to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub change: AuthChange,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            change: AuthChange::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            change: AuthChange::SignedOut,
            session: None,
        }
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self {
            change: AuthChange::TokenRefreshed,
            session: Some(session),
        }
    }
}

/// Row change type on the watched table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A `postgres_changes` notification. Only logged; never used to patch state.
///
/// Decodes both the socket's wire keys (`type`, `record`, `old_record`) and
/// the client-library keys (`eventType`, `new`, `old`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "eventType", alias = "type")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    #[serde(rename = "new", alias = "record", default)]
    pub record: Option<Value>,
    #[serde(rename = "old", alias = "old_record", default)]
    pub old_record: Option<Value>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, table: &str, record: Option<Value>) -> Self {
        Self {
            kind,
            schema: "public".to_string(),
            table: table.to_string(),
            commit_timestamp: None,
            record,
            old_record: None,
        }
    }
}
