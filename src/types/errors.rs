use thiserror::Error;

// === ValidationError ===

/// Errors raised by local input validation, before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The title is empty after trimming.
    #[error("Title is required")]
    EmptyTitle,
    /// The url is empty after trimming.
    #[error("URL is required")]
    EmptyUrl,
    /// The normalized url does not parse as an absolute address.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The url parses but its scheme is not http or https.
    #[error("Unsupported URL scheme: {0} (only http and https are allowed)")]
    UnsupportedScheme(String),
}

// === AuthError ===

/// Errors related to the external auth provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    /// No session is held.
    #[error("Not signed in")]
    NotAuthenticated,
    /// The request could not reach the provider.
    #[error("Auth network error: {0}")]
    Network(String),
    /// The provider answered with an error status.
    #[error("Auth provider error ({status}): {message}")]
    Provider { status: u16, message: String },
    /// The redirect callback did not carry a usable session.
    #[error("Invalid sign-in callback: {0}")]
    InvalidCallback(String),
    /// The local session store failed.
    #[error("Session storage error: {0}")]
    Storage(String),
}

// === BookmarkError ===

/// Errors related to bookmark store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookmarkError {
    /// The operation needs a session and none is held.
    #[error("Not signed in")]
    NotAuthenticated,
    /// Input was rejected locally.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The request could not reach the backend.
    #[error("Bookmark network error: {0}")]
    Network(String),
    /// The backend answered with an error status.
    #[error("Bookmark backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    /// The response body could not be decoded.
    #[error("Bookmark decode error: {0}")]
    Decode(String),
    /// Bookmark with the given ID was not found.
    #[error("Bookmark not found: {0}")]
    NotFound(String),
}

impl BookmarkError {
    /// The backend refused the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Backend { status: 401, .. })
    }
}

// === RealtimeError ===

/// Errors related to the record change feed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RealtimeError {
    /// The subscription request could not reach the feed.
    #[error("Realtime network error: {0}")]
    Network(String),
    /// The feed answered with an error status.
    #[error("Realtime backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    /// A feed event could not be decoded.
    #[error("Realtime decode error: {0}")]
    Decode(String),
    /// The server refused or closed the change channel.
    #[error("Realtime channel rejected: {0}")]
    Rejected(String),
}

// === StorageError ===

/// Errors from the local SQLite session store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Storage database error: {0}")]
    Database(String),
    /// Encrypting or decrypting a stored record failed.
    #[error("Storage crypto error: {0}")]
    Crypto(#[from] CryptoError),
    /// Failed to serialize or deserialize a stored record.
    #[error("Storage serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

// === CryptoError ===

/// Errors related to cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Failed to derive encryption key from a passphrase.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    /// Encryption operation failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),
    /// Decryption operation failed.
    #[error("Decryption failed: {0}")]
    Decryption(String),
    /// Failed to generate random bytes.
    #[error("Random generation failed: {0}")]
    RandomGeneration(String),
    /// The provided key is invalid.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === ControllerError ===

/// Errors returned to callers of the controller handle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    /// The command needs a session and none is held.
    #[error("Not signed in")]
    NotSignedIn,
    /// The command was rejected by local validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A bookmark store request failed.
    #[error(transparent)]
    Bookmark(BookmarkError),
    /// An auth provider request failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The controller task is no longer running.
    #[error("Controller stopped")]
    Stopped,
}

impl From<BookmarkError> for ControllerError {
    fn from(err: BookmarkError) -> Self {
        match err {
            BookmarkError::Validation(v) => ControllerError::Validation(v),
            BookmarkError::NotAuthenticated => ControllerError::NotSignedIn,
            other => ControllerError::Bookmark(other),
        }
    }
}
