//! GoTrue auth client.
//!
//! Sign-in uses the implicit grant: the provider redirects back to
//! `redirect_to` with the tokens in the URL fragment. The session is kept in
//! memory, persisted through [`SessionVault`] and refreshed on demand.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use super::{error_parts, SupabaseClient};
use crate::backend::listener::{AuthListener, ListenerRegistry};
use crate::backend::AuthBackend;
use crate::services::session_vault::SessionVault;
use crate::types::errors::AuthError;
use crate::types::events::AuthEvent;
use crate::types::session::{Session, User};

const DEFAULT_EXPIRES_IN: i64 = 3600;

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl From<GoTrueUser> for User {
    fn from(raw: GoTrueUser) -> Self {
        let meta = |keys: &[&str]| {
            keys.iter().find_map(|key| {
                raw.user_metadata
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|v| !v.trim().is_empty())
                    .map(String::from)
            })
        };
        let display_name = meta(&["full_name", "name"]);
        let avatar_url = meta(&["avatar_url", "picture"]);
        User {
            id: raw.id,
            email: raw.email.filter(|e| !e.is_empty()),
            display_name,
            avatar_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<GoTrueUser>,
}

/// Tokens carried by the sign-in redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Extracts the implicit-grant tokens from a redirect URL.
///
/// Tokens are read from the fragment, falling back to the query string.
/// Provider errors in the redirect are reported as `InvalidCallback`.
pub fn parse_callback(callback_url: &str, now: i64) -> Result<CallbackTokens, AuthError> {
    let parsed = url::Url::parse(callback_url.trim())
        .map_err(|e| AuthError::InvalidCallback(format!("not a URL: {e}")))?;
    let raw = parsed
        .fragment()
        .filter(|f| !f.is_empty())
        .or_else(|| parsed.query())
        .unwrap_or_default();
    let params: HashMap<String, String> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error_description").or_else(|| params.get("error")) {
        return Err(AuthError::InvalidCallback(error.clone()));
    }
    let take = |key: &str| {
        params
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| AuthError::InvalidCallback(format!("missing {key}")))
    };
    let access_token = take("access_token")?;
    let refresh_token = take("refresh_token")?;
    let expires_at = params
        .get("expires_at")
        .and_then(|v| v.parse::<i64>().ok())
        .or_else(|| {
            params
                .get("expires_in")
                .and_then(|v| v.parse::<i64>().ok())
                .map(|secs| now + secs)
        })
        .unwrap_or(now + DEFAULT_EXPIRES_IN);

    Ok(CallbackTokens {
        access_token,
        refresh_token,
        expires_at,
    })
}

/// [`AuthBackend`] over GoTrue.
pub struct SupabaseAuth {
    client: SupabaseClient,
    vault: Option<Arc<SessionVault>>,
    current: Mutex<Option<Session>>,
    listeners: ListenerRegistry<AuthEvent>,
}

impl SupabaseAuth {
    /// `vault` persists the session across restarts; `None` keeps it in memory only.
    pub fn new(client: SupabaseClient, vault: Option<Arc<SessionVault>>) -> Self {
        Self {
            client,
            vault,
            current: Mutex::new(None),
            listeners: ListenerRegistry::new(),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<Session>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store(&self, session: Option<Session>) {
        if let Some(vault) = &self.vault {
            let result = match &session {
                Some(s) => vault.save(s),
                None => vault.clear(),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to persist auth session");
            }
        }
        *self.current() = session;
    }

    fn restore(&self) -> Option<Session> {
        if let Some(session) = self.current().clone() {
            return Some(session);
        }
        let vault = self.vault.as_ref()?;
        match vault.load() {
            Ok(session) => {
                if session.is_some() {
                    tracing::debug!("restored persisted auth session");
                }
                *self.current() = session.clone();
                session
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted auth session");
                None
            }
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, AuthError> {
        let response = self
            .client
            .authed(Method::GET, &self.client.endpoint("/auth/v1/user"), access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(AuthError::Provider { status, message });
        }
        let raw: GoTrueUser = response
            .json()
            .await
            .map_err(|e| AuthError::Provider {
                status: 200,
                message: format!("unreadable user payload: {e}"),
            })?;
        Ok(raw.into())
    }

    async fn refresh(&self, stale: &Session) -> Result<Session, AuthError> {
        tracing::debug!(user_id = %stale.user.id, "refreshing access token");
        let url = self.client.endpoint("/auth/v1/token?grant_type=refresh_token");
        let response = self
            .client
            .request(Method::POST, &url)
            .json(&serde_json::json!({ "refresh_token": stale.refresh_token }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(AuthError::Provider { status, message });
        }
        let token: TokenResponse = response.json().await.map_err(|e| AuthError::Provider {
            status: 200,
            message: format!("unreadable token payload: {e}"),
        })?;

        let now = chrono::Utc::now().timestamp();
        let expires_at = token
            .expires_at
            .unwrap_or_else(|| now + token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN));
        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user.map(User::from).unwrap_or_else(|| stale.user.clone()),
        })
    }
}

impl SupabaseAuth {
    /// Refreshes `held`, storing and announcing the result.
    async fn renew(&self, held: &Session) -> Result<Option<Session>, AuthError> {
        match self.refresh(held).await {
            Ok(fresh) => {
                self.store(Some(fresh.clone()));
                self.listeners.emit(AuthEvent::token_refreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(AuthError::Provider { status, message }) => {
                // The refresh token was rejected; the session is gone for good.
                tracing::warn!(status, %message, "refresh rejected, dropping session");
                self.store(None);
                self.listeners.emit(AuthEvent::signed_out());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AuthBackend for SupabaseAuth {
    async fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError> {
        let mut url = url::Url::parse(&self.client.endpoint("/auth/v1/authorize"))
            .map_err(|e| AuthError::Network(format!("invalid backend url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to);
        Ok(url.to_string())
    }

    async fn complete_sign_in(&self, callback_url: &str) -> Result<Session, AuthError> {
        let tokens = parse_callback(callback_url, chrono::Utc::now().timestamp())?;
        let user = self.fetch_user(&tokens.access_token).await?;
        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
            user,
        };
        tracing::info!(user_id = %session.user.id, "signed in");
        self.store(Some(session.clone()));
        self.listeners.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.restore() else {
            return Ok(None);
        };
        if !session.is_expired(chrono::Utc::now().timestamp()) {
            return Ok(Some(session));
        }
        self.renew(&session).await
    }

    async fn refresh_session(&self) -> Result<Option<Session>, AuthError> {
        match self.restore() {
            Some(session) => self.renew(&session).await,
            None => Ok(None),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let held = self.current().clone();
        if let Some(session) = held {
            let url = self.client.endpoint("/auth/v1/logout");
            let result = self
                .client
                .authed(Method::POST, &url, &session.access_token)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    let (status, message) = error_parts(response).await;
                    tracing::warn!(status, %message, "remote sign-out failed");
                }
                Err(e) => tracing::warn!(error = %e, "remote sign-out failed"),
            }
        }
        self.store(None);
        tracing::info!("signed out");
        self.listeners.emit(AuthEvent::signed_out());
        Ok(())
    }

    fn on_auth_state_change(&self) -> AuthListener {
        self.listeners.register()
    }
}
