// Field-level encryption for sensitive entity content.
//
// The cipher knows nothing about comments or keys - it operates on named
// fields of a JSON field map, so the same primitive applies to any entity
// kind with sensitive text. One corrupt record must never break a list or
// read across the dataset, so per-field failures are recovered locally and
// surfaced as a tagged `FieldContent` value instead of an error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::{Map, Value};
use thiserror::Error;

/// Marker prefix stored in place of ciphertext when encryption itself
/// failed at write time. Recognized on read and never re-decrypted.
pub const ENCRYPT_FAILED_PREFIX: &str = "[ENCRYPTION_ERROR:";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum CipherKeyError {
    #[error("encryption key is not valid base64: {0}")]
    Encoding(String),

    #[error("encryption key must be {KEY_LEN} bytes, got {0}")]
    Length(usize),
}

/// The process-wide symmetric key, loaded once at startup and injected into
/// `FieldCipher` at construction. Read-only after that.
#[derive(Clone)]
pub struct CipherKey([u8; KEY_LEN]);

impl CipherKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CipherKeyError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CipherKeyError::Encoding(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CipherKeyError::Length(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

/// Outcome of reading one encrypted field.
///
/// Callers match on this instead of comparing against sentinel strings, so
/// a failure can never be mistaken for real content.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldContent {
    /// Decrypted plain text.
    Plain(String),
    /// Decrypted and parsed as structured JSON (for fields flagged as such).
    Structured(Value),
    /// Ciphertext could not be decrypted (corrupt data, wrong key, or a
    /// legacy value that was never encrypted).
    DecryptFailed,
    /// The stored value is a write-time encryption-failure marker.
    EncryptFailed,
}

/// Symmetric cipher over named fields. Ciphertext wire form is
/// `base64(nonce || aead ciphertext)`.
pub struct FieldCipher {
    cipher: XChaCha20Poly1305,
}

impl FieldCipher {
    pub fn new(key: &CipherKey) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key.0)),
        }
    }

    /// Encrypt a plaintext string. On cipher failure, returns the marker
    /// string instead of losing the write - the record stays addressable and
    /// the failure is visible on read.
    pub fn encrypt_text(&self, plaintext: &str) -> String {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        match self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
        {
            Ok(ciphertext) => {
                let mut wire = Vec::with_capacity(NONCE_LEN + ciphertext.len());
                wire.extend_from_slice(&nonce);
                wire.extend_from_slice(&ciphertext);
                BASE64.encode(wire)
            }
            Err(e) => {
                tracing::warn!("field encryption failed, storing marker: {e}");
                format!("{ENCRYPT_FAILED_PREFIX} text]")
            }
        }
    }

    /// Decrypt a stored value. Never panics or errors; every failure mode
    /// collapses into a tagged variant.
    pub fn decrypt_text(&self, stored: &str, structured: bool) -> FieldContent {
        if stored.starts_with(ENCRYPT_FAILED_PREFIX) {
            tracing::warn!("field was never encrypted due to a previous write-time error");
            return FieldContent::EncryptFailed;
        }

        let wire = match BASE64.decode(stored) {
            Ok(bytes) => bytes,
            Err(_) => return FieldContent::DecryptFailed,
        };
        if wire.len() <= NONCE_LEN {
            return FieldContent::DecryptFailed;
        }
        let (nonce, ciphertext) = wire.split_at(NONCE_LEN);

        let plaintext = match self.cipher.decrypt(XNonce::from_slice(nonce), ciphertext) {
            Ok(bytes) => bytes,
            Err(_) => return FieldContent::DecryptFailed,
        };
        let text = match String::from_utf8(plaintext) {
            Ok(text) => text,
            Err(_) => return FieldContent::DecryptFailed,
        };
        // An empty result means the value never round-tripped properly.
        if text.is_empty() {
            return FieldContent::DecryptFailed;
        }

        if structured {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => FieldContent::Structured(value),
                // Not valid JSON after all - hand back the raw text.
                Err(_) => FieldContent::Plain(text),
            }
        } else {
            FieldContent::Plain(text)
        }
    }

    /// Replace each named field that is present and non-null with its
    /// ciphertext. Absent and null fields pass through unchanged.
    pub fn encrypt_fields(&self, fields: &mut Map<String, Value>, names: &[&str]) {
        for name in names {
            let Some(value) = fields.get(*name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let plaintext = match value {
                Value::String(text) => text.clone(),
                // Structured values are JSON-stringified before encryption.
                other => other.to_string(),
            };
            fields.insert(name.to_string(), Value::String(self.encrypt_text(&plaintext)));
        }
    }

    /// Read one named field through the cipher. `None` means the field is
    /// absent or null (pass-through, nothing to decrypt).
    pub fn decrypt_field(
        &self,
        fields: &Map<String, Value>,
        name: &str,
        structured: bool,
    ) -> Option<FieldContent> {
        let value = fields.get(name)?;
        match value {
            Value::Null => None,
            Value::String(stored) => Some(self.decrypt_text(stored, structured)),
            // A non-string value cannot be our ciphertext.
            _ => Some(FieldContent::DecryptFailed),
        }
    }
}
