//! HTTP backend for a hosted Supabase-style project.
//!
//! - [`auth`]: GoTrue endpoints under `/auth/v1`
//! - [`rest`]: PostgREST rows under `/rest/v1`
//! - [`realtime`]: Phoenix change channel over a websocket

pub mod auth;
pub mod realtime;
pub mod rest;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;

use crate::types::settings::{BackendSettings, HttpSettings};

pub use auth::SupabaseAuth;
pub use realtime::SupabaseFeed;
pub use rest::SupabaseStore;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Shared transport: base URL, anon key and the HTTP client.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(backend: &BackendSettings, http: &HttpSettings) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http: http_client,
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
        }
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// `{base}{path}`; `path` starts with `/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url).header("apikey", &self.anon_key)
    }

    pub(crate) fn authed(&self, method: Method, url: &str, access_token: &str) -> RequestBuilder {
        self.request(method, url).bearer_auth(access_token)
    }
}

/// Reads an error response into `(status, message)`.
///
/// GoTrue uses `msg` / `error_description`, PostgREST uses `message`.
pub(crate) async fn error_parts(response: Response) -> (u16, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    (status.as_u16(), error_message(status, &text))
}

pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|key| json.get(*key).and_then(Value::as_str).map(String::from))
    });
    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}
