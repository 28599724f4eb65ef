use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::errors::CoreError;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;

/// Argon2id cost parameters. Written into every file header so that
/// older files stay readable if the defaults are raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// KiB of memory
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: 65_536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Reject parameters a crafted file could use to exhaust memory or CPU.
    pub fn check_bounds(&self) -> Result<(), CoreError> {
        if !(8..=1_048_576).contains(&self.memory_cost) {
            return Err(CoreError::InvalidFileFormat(format!(
                "KDF memory cost {} KiB outside 8..=1048576",
                self.memory_cost
            )));
        }
        if !(1..=20).contains(&self.time_cost) {
            return Err(CoreError::InvalidFileFormat(format!(
                "KDF time cost {} outside 1..=20",
                self.time_cost
            )));
        }
        if !(1..=16).contains(&self.parallelism) {
            return Err(CoreError::InvalidFileFormat(format!(
                "KDF parallelism {} outside 1..=16",
                self.parallelism
            )));
        }
        Ok(())
    }
}

/// AES-256-GCM keyed from a password via Argon2id.
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    pub fn derive(password: &str, salt: &[u8; SALT_LEN], params: &KdfParams) -> Result<Self, CoreError> {
        let argon_params = Params::new(params.memory_cost, params.time_cost, params.parallelism, Some(32))
            .map_err(|e| CoreError::Encryption(format!("Invalid Argon2 parameters: {e}")))?;

        let mut key = [0u8; 32];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params)
            .hash_password_into(password.as_bytes(), salt, &mut key)
            .map_err(|e| CoreError::Encryption(format!("Key derivation failed: {e}")))?;

        let aead = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CoreError::Encryption(format!("Cipher setup failed: {e}")))?;
        Ok(Self { aead })
    }

    /// Encrypt; the 16-byte authentication tag is appended to the output.
    pub fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.aead
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| CoreError::Encryption(e.to_string()))
    }

    /// Decrypt and verify. A wrong password and tampering look the same.
    pub fn open(&self, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(self.aead.decrypt(Nonce::from_slice(nonce), ciphertext)?)
    }
}

/// Fresh bytes from the OS RNG (salts, nonces).
pub fn random_bytes<const N: usize>() -> Result<[u8; N], CoreError> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| CoreError::Encryption(format!("OS random source failed: {e}")))?;
    Ok(buf)
}
