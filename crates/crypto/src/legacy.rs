use sha2::{Digest, Sha256};

use crate::block::{self, Iv, Key, BLOCK};
use crate::cryptor::{ChunkProcessor, Cryptor, EncryptedData};
use crate::error::{CryptoError, Result};
use crate::header::LEGACY_IDENTIFIER;

const FIXED_IV: &Iv = b"0123456789012345";

/// Header-less AES-256-CBC kept for data written by older clients.
///
/// The key is the first 32 characters of the hex SHA-256 of the cipher
/// key, used as raw bytes.  With `random_iv` the IV is prepended to the
/// ciphertext; otherwise a fixed IV is used.
pub struct LegacyCryptor {
    key: Key,
    random_iv: bool,
}

impl LegacyCryptor {
    pub fn new(cipher_key: &str, random_iv: bool) -> Result<Self> {
        if cipher_key.is_empty() {
            return Err(CryptoError::InvalidKey("cipher key must not be empty".into()));
        }
        let digest = hex::encode(Sha256::digest(cipher_key.as_bytes()));
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest.as_bytes()[..32]);
        Ok(Self { key, random_iv })
    }
}

impl Cryptor for LegacyCryptor {
    fn identifier(&self) -> [u8; 4] {
        LEGACY_IDENTIFIER
    }

    fn encrypt(&self, data: &[u8]) -> Result<EncryptedData> {
        if data.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        let out = if self.random_iv {
            let iv = block::random_iv();
            let mut out = iv.to_vec();
            out.extend(block::encrypt(&self.key, &iv, data));
            out
        } else {
            block::encrypt(&self.key, FIXED_IV, data)
        };
        Ok(EncryptedData {
            metadata: None,
            data: out,
        })
    }

    fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>> {
        let bytes = &data.data;
        if bytes.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        if self.random_iv {
            if bytes.len() <= BLOCK {
                return Err(CryptoError::Decryption("ciphertext shorter than IV".into()));
            }
            let iv = block::iv_from(&bytes[..BLOCK])?;
            block::decrypt(&self.key, &iv, &bytes[BLOCK..])
        } else {
            block::decrypt(&self.key, FIXED_IV, bytes)
        }
    }

    fn stream_encryptor(&self) -> Result<(Option<Vec<u8>>, Box<dyn ChunkProcessor>)> {
        let processor = if self.random_iv {
            let iv = block::random_iv();
            block::StreamEncryptor::new(&self.key, &iv, Some(iv.to_vec()))
        } else {
            block::StreamEncryptor::new(&self.key, FIXED_IV, None)
        };
        Ok((None, Box::new(processor)))
    }

    fn stream_decryptor(&self, _metadata: Option<&[u8]>) -> Result<Box<dyn ChunkProcessor>> {
        let iv = if self.random_iv { None } else { Some(FIXED_IV) };
        Ok(Box::new(block::StreamDecryptor::new(&self.key, iv)))
    }
}
