use std::path::Path;

use super::encryption::{self, Cipher, KdfParams};
use super::format::{JournalHeader, CURRENT_VERSION};
use crate::errors::CoreError;
use crate::models::journal::Journal;

/// Save/load a `Journal` as encrypted bytes or files.
///
/// Journal → bincode → AES-256-GCM(Argon2id(password)) → `TJNL` container.
/// A fresh salt and nonce are drawn on every save.
pub struct StorageManager;

impl StorageManager {
    pub fn save_to_bytes(journal: &Journal, password: &str) -> Result<Vec<u8>, CoreError> {
        Self::save_with_params(journal, password, KdfParams::default())
    }

    /// Save with explicit KDF costs (lower costs keep tests fast).
    pub fn save_with_params(journal: &Journal, password: &str, kdf: KdfParams) -> Result<Vec<u8>, CoreError> {
        if password.is_empty() {
            return Err(CoreError::ValidationError("Password must not be empty".into()));
        }
        kdf.check_bounds()?;

        let plaintext = bincode::serialize(journal)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize journal: {e}")))?;

        let header = JournalHeader {
            version: CURRENT_VERSION,
            kdf,
            salt: encryption::random_bytes()?,
            nonce: encryption::random_bytes()?,
        };
        let ciphertext = Cipher::derive(password, &header.salt, &header.kdf)?.seal(&header.nonce, &plaintext)?;

        tracing::debug!(trades = journal.trades.len(), bytes = ciphertext.len(), "journal encrypted");
        Ok(header.encode(&ciphertext))
    }

    pub fn load_from_bytes(data: &[u8], password: &str) -> Result<Journal, CoreError> {
        let (header, ciphertext) = JournalHeader::decode(data)?;
        let plaintext = Cipher::derive(password, &header.salt, &header.kdf)?.open(&header.nonce, ciphertext)?;
        bincode::deserialize(&plaintext)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize journal: {e}")))
    }

    pub fn save_to_file(journal: &Journal, path: impl AsRef<Path>, password: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(journal, password)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>, password: &str) -> Result<Journal, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes, password)
    }
}
