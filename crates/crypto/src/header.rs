//! Cryptor Header codec.
//!
//! ```text
//! "PNED" | version (1) | cryptor id (4) | size (1 or 0xFF + u16 BE) | metadata
//! ```
//!
//! Data that does not start with the sentinel has no header and belongs
//! to the legacy cryptor.

use crate::error::{CryptoError, Result};

pub const SENTINEL: &[u8; 4] = b"PNED";
pub const VERSION: u8 = 1;
pub const IDENTIFIER_LEN: usize = 4;

/// Identifier of the header-less legacy cryptor.
pub const LEGACY_IDENTIFIER: [u8; 4] = [0; 4];

/// Fixed part: sentinel + version + identifier.
const FIXED_LEN: usize = SENTINEL.len() + 1 + IDENTIFIER_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptorHeader {
    pub identifier: [u8; 4],
    pub metadata: Vec<u8>,
}

impl CryptorHeader {
    pub fn new(identifier: [u8; 4], metadata: Vec<u8>) -> Result<Self> {
        if metadata.len() > u16::MAX as usize {
            return Err(CryptoError::InvalidHeader(format!(
                "metadata too large: {} bytes",
                metadata.len()
            )));
        }
        Ok(Self {
            identifier,
            metadata,
        })
    }

    /// Encoded header followed by its metadata.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIXED_LEN + 3 + self.metadata.len());
        out.extend_from_slice(SENTINEL);
        out.push(VERSION);
        out.extend_from_slice(&self.identifier);
        let len = self.metadata.len();
        if len < 255 {
            out.push(len as u8);
        } else {
            out.push(0xFF);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        out.extend_from_slice(&self.metadata);
        out
    }

    /// Parse a header from the start of `data`.
    ///
    /// Returns `Ok(None)` when the sentinel is absent and the total number
    /// of bytes consumed (header plus metadata) otherwise.
    pub fn decode(data: &[u8]) -> Result<Option<(CryptorHeader, usize)>> {
        if data.len() < SENTINEL.len() || &data[..SENTINEL.len()] != SENTINEL {
            return Ok(None);
        }
        let total = match encoded_len(data)? {
            Some(total) if data.len() >= total => total,
            _ => return Err(CryptoError::InvalidHeader("truncated header".into())),
        };

        let mut identifier = [0u8; IDENTIFIER_LEN];
        identifier.copy_from_slice(&data[5..FIXED_LEN]);
        let metadata_start = if data[FIXED_LEN] == 0xFF {
            FIXED_LEN + 3
        } else {
            FIXED_LEN + 1
        };

        Ok(Some((
            CryptorHeader {
                identifier,
                metadata: data[metadata_start..total].to_vec(),
            },
            total,
        )))
    }
}

/// Length of the header (including metadata) that starts `prefix`.
///
/// `Ok(None)` means more bytes are needed to tell.  Callers must have
/// checked the sentinel already.
pub fn encoded_len(prefix: &[u8]) -> Result<Option<usize>> {
    if prefix.len() <= SENTINEL.len() {
        return Ok(None);
    }
    let version = prefix[SENTINEL.len()];
    if version == 0 || version > VERSION {
        return Err(CryptoError::InvalidHeader(format!(
            "unsupported header version {version}"
        )));
    }
    if prefix.len() <= FIXED_LEN {
        return Ok(None);
    }
    match prefix[FIXED_LEN] {
        0xFF if prefix.len() < FIXED_LEN + 3 => Ok(None),
        0xFF => {
            let len = u16::from_be_bytes([prefix[FIXED_LEN + 1], prefix[FIXED_LEN + 2]]);
            Ok(Some(FIXED_LEN + 3 + len as usize))
        }
        len => Ok(Some(FIXED_LEN + 1 + len as usize)),
    }
}

/// Human-readable identifier for logs and errors.
pub fn identifier_str(identifier: &[u8; 4]) -> String {
    if identifier == &LEGACY_IDENTIFIER {
        return "legacy".into();
    }
    String::from_utf8_lossy(identifier).into_owned()
}
