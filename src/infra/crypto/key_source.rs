// Cipher-key bootstrap: env var -> key file -> generate-and-persist.
//
// Runs once at process start. The engine must never run without a
// consistent key, so every failure here is fatal to startup - the caller
// is expected to exit, not degrade.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

use crate::core::crypto::CipherKey;

/// Load the field-encryption key, in priority order:
/// 1. the named environment variable (base64),
/// 2. the key file at `key_path`,
/// 3. a freshly generated key, persisted to `key_path` for later runs.
pub async fn load_or_generate_key(env_var: &str, key_path: impl AsRef<Path>) -> Result<CipherKey> {
    if let Ok(encoded) = std::env::var(env_var) {
        if !encoded.trim().is_empty() {
            let key = CipherKey::from_base64(&encoded)
                .with_context(|| format!("invalid encryption key in {env_var}"))?;
            tracing::info!("loaded encryption key from {env_var}");
            return Ok(key);
        }
    }

    let key_path = key_path.as_ref();
    match fs::read_to_string(key_path).await {
        Ok(encoded) => {
            let key = CipherKey::from_base64(&encoded)
                .with_context(|| format!("corrupt key file at {}", key_path.display()))?;
            tracing::info!(path = %key_path.display(), "loaded encryption key from key file");
            Ok(key)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let key = CipherKey::generate();
            if let Some(parent) = key_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating key directory {}", parent.display()))?;
            }
            fs::write(key_path, key.to_base64())
                .await
                .with_context(|| format!("persisting key file {}", key_path.display()))?;
            tracing::warn!(path = %key_path.display(), "generated new encryption key");
            Ok(key)
        }
        Err(err) => {
            Err(err).with_context(|| format!("reading key file {}", key_path.display()))
        }
    }
}
