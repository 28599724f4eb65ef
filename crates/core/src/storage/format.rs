use super::encryption::{KdfParams, NONCE_LEN, SALT_LEN};
use crate::errors::CoreError;

/// Magic bytes at the start of every journal file.
pub const MAGIC: &[u8; 4] = b"TJNL";

pub const CURRENT_VERSION: u16 = 1;

/// magic(4) + version(2) + kdf(12) + salt(16) + nonce(12) + length(8)
pub const HEADER_LEN: usize = 4 + 2 + 12 + SALT_LEN + NONCE_LEN + 8;

/// Plaintext header of an encrypted journal file.
///
/// ```text
/// TJNL | version u16 | memory u32 | time u32 | lanes u32 | salt[16] | nonce[12] | len u64 | ciphertext
/// ```
/// Integers are little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalHeader {
    pub version: u16,
    pub kdf: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
}

impl JournalHeader {
    /// Header plus ciphertext as one buffer.
    pub fn encode(&self, ciphertext: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.kdf.memory_cost.to_le_bytes());
        out.extend_from_slice(&self.kdf.time_cost.to_le_bytes());
        out.extend_from_slice(&self.kdf.parallelism.to_le_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());
        out.extend_from_slice(ciphertext);
        out
    }

    /// Parse and sanity-check the header; returns it with the ciphertext slice.
    pub fn decode(data: &[u8]) -> Result<(Self, &[u8]), CoreError> {
        if data.len() < HEADER_LEN {
            return Err(CoreError::InvalidFileFormat("file shorter than header".into()));
        }
        let mut cursor = Cursor { data, pos: 0 };

        if cursor.take::<4>() != *MAGIC {
            return Err(CoreError::InvalidFileFormat("not a journal file (bad magic)".into()));
        }

        let version = u16::from_le_bytes(cursor.take::<2>());
        if version == 0 || version > CURRENT_VERSION {
            return Err(CoreError::UnsupportedVersion(version));
        }

        let kdf = KdfParams {
            memory_cost: u32::from_le_bytes(cursor.take::<4>()),
            time_cost: u32::from_le_bytes(cursor.take::<4>()),
            parallelism: u32::from_le_bytes(cursor.take::<4>()),
        };
        kdf.check_bounds()?;

        let salt = cursor.take::<SALT_LEN>();
        let nonce = cursor.take::<NONCE_LEN>();
        let declared = u64::from_le_bytes(cursor.take::<8>());

        let body = &data[HEADER_LEN..];
        let len = usize::try_from(declared)
            .ok()
            .filter(|len| *len <= body.len())
            .ok_or_else(|| {
                CoreError::InvalidFileFormat(format!(
                    "truncated: header declares {declared} bytes of ciphertext, found {}",
                    body.len()
                ))
            })?;

        Ok((
            Self {
                version,
                kdf,
                salt,
                nonce,
            },
            &body[..len],
        ))
    }
}

/// Fixed-size reads over a buffer already checked to hold `HEADER_LEN` bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        out
    }
}
