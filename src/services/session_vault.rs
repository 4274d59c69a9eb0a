//! Encrypted persistence of the auth session.
//!
//! The whole [`Session`] is serialized to JSON, sealed with AES-256-GCM and
//! stored as a single `auth_session` row, so a restart can answer
//! "get current session" without a new sign-in.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::services::crypto_service::{CryptoService, CryptoServiceTrait, SecretKey};
use crate::types::credential::EncryptedData;
use crate::types::errors::StorageError;
use crate::types::session::Session;

const SESSION_ROW_ID: &str = "default";
const SALT_KEY: &str = "session_salt";

/// Session store backed by SQLite + CryptoService.
pub struct SessionVault {
    db: Mutex<Database>,
    crypto: CryptoService,
    key: SecretKey,
}

impl SessionVault {
    /// Opens the vault file at `path`, creating it and its salt when new.
    pub fn open<P: AsRef<Path>>(path: P, passphrase: &str) -> Result<Self, StorageError> {
        Self::with_database(Database::open(path)?, passphrase)
    }

    pub fn open_in_memory(passphrase: &str) -> Result<Self, StorageError> {
        Self::with_database(Database::open_in_memory()?, passphrase)
    }

    fn with_database(db: Database, passphrase: &str) -> Result<Self, StorageError> {
        let crypto = CryptoService::new();
        let salt = Self::load_or_create_salt(&db, &crypto)?;
        let key = crypto.derive_key(passphrase, &salt)?;
        Ok(Self {
            db: Mutex::new(db),
            crypto,
            key,
        })
    }

    fn load_or_create_salt(db: &Database, crypto: &CryptoService) -> Result<Vec<u8>, StorageError> {
        let conn = db.connection();
        let existing: Option<Vec<u8>> = conn
            .query_row(
                "SELECT value FROM vault_meta WHERE key = ?1",
                params![SALT_KEY],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(salt) = existing {
            return Ok(salt);
        }
        let salt = crypto.generate_salt()?;
        conn.execute(
            "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)",
            params![SALT_KEY, salt],
        )?;
        Ok(salt)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Database>, StorageError> {
        self.db
            .lock()
            .map_err(|_| StorageError::Database("session vault lock poisoned".to_string()))
    }

    /// Replaces the stored session.
    pub fn save(&self, session: &Session) -> Result<(), StorageError> {
        let json = serde_json::to_vec(session)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let sealed = self.crypto.seal(&json, &self.key)?;
        let now = chrono::Utc::now().timestamp();

        let db = self.lock()?;
        db.connection().execute(
            "INSERT OR REPLACE INTO auth_session (id, user_id, encrypted_data, iv, auth_tag, expires_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                SESSION_ROW_ID,
                session.user.id,
                sealed.ciphertext,
                sealed.iv,
                sealed.auth_tag,
                session.expires_at,
                now
            ],
        )?;
        tracing::debug!(user_id = %session.user.id, "session persisted");
        Ok(())
    }

    /// Returns the stored session, if any.
    pub fn load(&self) -> Result<Option<Session>, StorageError> {
        let db = self.lock()?;
        let sealed = db
            .connection()
            .query_row(
                "SELECT encrypted_data, iv, auth_tag FROM auth_session WHERE id = ?1",
                params![SESSION_ROW_ID],
                |row| {
                    Ok(EncryptedData {
                        ciphertext: row.get(0)?,
                        iv: row.get(1)?,
                        auth_tag: row.get(2)?,
                    })
                },
            )
            .optional()?;
        drop(db);

        let Some(sealed) = sealed else {
            return Ok(None);
        };
        let json = self.crypto.open(&sealed, &self.key)?;
        let session = serde_json::from_slice(&json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some(session))
    }

    /// Removes the stored session.
    pub fn clear(&self) -> Result<(), StorageError> {
        let db = self.lock()?;
        db.connection().execute("DELETE FROM auth_session", [])?;
        Ok(())
    }

    pub fn has_session(&self) -> bool {
        self.lock()
            .ok()
            .and_then(|db| {
                db.connection()
                    .query_row("SELECT COUNT(*) FROM auth_session", [], |row| row.get::<_, i64>(0))
                    .ok()
            })
            .unwrap_or(0)
            > 0
    }
}
