use serde::{Deserialize, Serialize};

/// Top-level client settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub backend: BackendSettings,
    pub auth: AuthSettings,
    pub realtime: RealtimeSettings,
    pub http: HttpSettings,
    pub storage: StorageSettings,
}

/// Where the managed backend lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    /// Project base URL; auth and rest paths hang off it.
    pub url: String,
    /// Public (anon) API key sent as `apikey` on every request.
    pub anon_key: String,
    /// Change-feed endpoint. Defaults to `{url}/realtime`.
    pub realtime_url: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            realtime_url: None,
        }
    }
}

impl BackendSettings {
    pub fn resolved_realtime_url(&self) -> String {
        match &self.realtime_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("{}/realtime", self.url.trim_end_matches('/')),
        }
    }
}

/// OAuth sign-in parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthSettings {
    pub provider: String,
    pub redirect_to: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            redirect_to: "http://localhost:3000".to_string(),
        }
    }
}

/// Change-feed subscription parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RealtimeSettings {
    pub enabled: bool,
    /// Ask the feed to filter rows to the signed-in owner server-side.
    pub owner_filter: bool,
    pub schema: String,
    pub table: String,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            owner_filter: true,
            schema: "public".to_string(),
            table: "bookmarks".to_string(),
        }
    }
}

/// HTTP client parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Built-in vault passphrase. Anyone with the binary can open a vault
/// sealed with it.
pub const DEFAULT_SESSION_PASSPHRASE: &str = "smartmarks-session-key-v1";

/// Local session persistence parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Overrides the platform data directory.
    pub data_dir: Option<String>,
    pub passphrase: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            passphrase: DEFAULT_SESSION_PASSPHRASE.to_string(),
        }
    }
}

impl StorageSettings {
    pub fn uses_default_passphrase(&self) -> bool {
        self.passphrase == DEFAULT_SESSION_PASSPHRASE
    }
}
