//! At-rest encryption for persisted session tokens.
//!
//! AES-256-GCM via `ring`, keys derived with PBKDF2-HMAC-SHA256.

use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use zeroize::Zeroizing;

use crate::types::credential::EncryptedData;
use crate::types::errors::CryptoError;

/// PBKDF2 iteration count for key derivation.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes for PBKDF2.
pub const SALT_LENGTH: usize = 16;

/// AES-256-GCM key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce/IV length in bytes.
pub const NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

/// Key material that is wiped when dropped.
pub type SecretKey = Zeroizing<Vec<u8>>;

/// Cryptographic operations used by the session vault.
pub trait CryptoServiceTrait {
    /// Derives an encryption key from a passphrase and salt using PBKDF2.
    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> Result<SecretKey, CryptoError>;

    /// Encrypts plaintext, returning ciphertext, IV and auth tag separately.
    fn seal(&self, plaintext: &[u8], key: &[u8]) -> Result<EncryptedData, CryptoError>;

    /// Decrypts data produced by [`CryptoServiceTrait::seal`].
    fn open(&self, encrypted: &EncryptedData, key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Generates a random PBKDF2 salt.
    fn generate_salt(&self) -> Result<Vec<u8>, CryptoError>;
}

/// A nonce sequence that yields exactly one nonce.
struct SingleNonce {
    nonce: Option<[u8; NONCE_LENGTH]>,
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        self.nonce
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

fn check_key(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != KEY_LENGTH {
        return Err(CryptoError::InvalidKey(format!(
            "Key must be {} bytes, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(())
}

/// `ring`-backed implementation.
pub struct CryptoService {
    rng: SystemRandom,
}

impl CryptoService {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for CryptoService {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoServiceTrait for CryptoService {
    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> Result<SecretKey, CryptoError> {
        if salt.is_empty() {
            return Err(CryptoError::KeyDerivation("Salt must not be empty".to_string()));
        }
        let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
            .ok_or_else(|| CryptoError::KeyDerivation("Invalid iteration count".to_string()))?;

        let mut key = Zeroizing::new(vec![0u8; KEY_LENGTH]);
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            salt,
            passphrase.as_bytes(),
            &mut key,
        );
        Ok(key)
    }

    fn seal(&self, plaintext: &[u8], key: &[u8]) -> Result<EncryptedData, CryptoError> {
        check_key(key)?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::RandomGeneration("Failed to generate nonce".to_string()))?;

        let unbound_key = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| CryptoError::Encryption("Failed to create encryption key".to_string()))?;
        let mut sealing_key = aead::SealingKey::new(
            unbound_key,
            SingleNonce {
                nonce: Some(nonce_bytes),
            },
        );

        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Encryption("Encryption operation failed".to_string()))?;

        // ring appends the tag; store it in its own column.
        let auth_tag = in_out.split_off(in_out.len() - TAG_LENGTH);

        Ok(EncryptedData {
            ciphertext: in_out,
            iv: nonce_bytes.to_vec(),
            auth_tag,
        })
    }

    fn open(&self, encrypted: &EncryptedData, key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        check_key(key)?;

        let nonce_bytes: [u8; NONCE_LENGTH] = encrypted.iv.as_slice().try_into().map_err(|_| {
            CryptoError::Decryption(format!(
                "IV must be {} bytes, got {}",
                NONCE_LENGTH,
                encrypted.iv.len()
            ))
        })?;
        if encrypted.auth_tag.len() != TAG_LENGTH {
            return Err(CryptoError::Decryption(format!(
                "Auth tag must be {} bytes, got {}",
                TAG_LENGTH,
                encrypted.auth_tag.len()
            )));
        }

        let unbound_key = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| CryptoError::Decryption("Failed to create decryption key".to_string()))?;
        let mut opening_key = aead::OpeningKey::new(
            unbound_key,
            SingleNonce {
                nonce: Some(nonce_bytes),
            },
        );

        let mut in_out = Zeroizing::new(Vec::with_capacity(
            encrypted.ciphertext.len() + encrypted.auth_tag.len(),
        ));
        in_out.extend_from_slice(&encrypted.ciphertext);
        in_out.extend_from_slice(&encrypted.auth_tag);

        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| {
                CryptoError::Decryption("Decryption failed: invalid key or corrupted data".to_string())
            })?;

        Ok(Zeroizing::new(plaintext.to_vec()))
    }

    fn generate_salt(&self) -> Result<Vec<u8>, CryptoError> {
        let mut salt = vec![0u8; SALT_LENGTH];
        self.rng
            .fill(&mut salt)
            .map_err(|_| CryptoError::RandomGeneration("Failed to generate salt".to_string()))?;
        Ok(salt)
    }
}
