use serde::{Deserialize, Serialize};

/// Seconds before expiry at which a session is treated as expired.
pub const EXPIRY_LEEWAY_SECS: i64 = 30;

/// Identity of the signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Authenticated identity state for the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// UNIX timestamp (seconds) at which the access token expires.
    pub expires_at: i64,
    pub user: User,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Returns true once `now` is within the expiry leeway.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at - EXPIRY_LEEWAY_SECS
    }

    /// Name shown in the greeting: display name, then email, then user id.
    pub fn greeting_name(&self) -> &str {
        self.user
            .display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.user.email.as_deref())
            .unwrap_or(&self.user.id)
    }

    pub fn same_user(&self, other: &Session) -> bool {
        self.user.id == other.user.id
    }
}
