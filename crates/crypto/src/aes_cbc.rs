use sha2::{Digest, Sha256};

use crate::block::{self, Key};
use crate::cryptor::{ChunkProcessor, Cryptor, EncryptedData};
use crate::error::{CryptoError, Result};

/// AES-256-CBC with a random IV carried as header metadata.
pub struct AesCbcCryptor {
    key: Key,
}

impl AesCbcCryptor {
    pub const IDENTIFIER: [u8; 4] = *b"ACRH";

    pub fn new(cipher_key: &str) -> Result<Self> {
        if cipher_key.is_empty() {
            return Err(CryptoError::InvalidKey("cipher key must not be empty".into()));
        }
        Ok(Self {
            key: Sha256::digest(cipher_key.as_bytes()).into(),
        })
    }
}

impl Cryptor for AesCbcCryptor {
    fn identifier(&self) -> [u8; 4] {
        Self::IDENTIFIER
    }

    fn encrypt(&self, data: &[u8]) -> Result<EncryptedData> {
        if data.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        let iv = block::random_iv();
        Ok(EncryptedData {
            metadata: Some(iv.to_vec()),
            data: block::encrypt(&self.key, &iv, data),
        })
    }

    fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>> {
        if data.data.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        let metadata = data
            .metadata
            .as_deref()
            .ok_or_else(|| CryptoError::Decryption("missing IV metadata".into()))?;
        let iv = block::iv_from(metadata)?;
        block::decrypt(&self.key, &iv, &data.data)
    }

    fn stream_encryptor(&self) -> Result<(Option<Vec<u8>>, Box<dyn ChunkProcessor>)> {
        let iv = block::random_iv();
        Ok((
            Some(iv.to_vec()),
            Box::new(block::StreamEncryptor::new(&self.key, &iv, None)),
        ))
    }

    fn stream_decryptor(&self, metadata: Option<&[u8]>) -> Result<Box<dyn ChunkProcessor>> {
        let metadata =
            metadata.ok_or_else(|| CryptoError::Decryption("missing IV metadata".into()))?;
        let iv = block::iv_from(metadata)?;
        Ok(Box::new(block::StreamDecryptor::new(&self.key, Some(&iv))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_raw_sha256_of_cipher_key() {
        let c = AesCbcCryptor::new("enigma").unwrap();
        let expected: [u8; 32] = Sha256::digest(b"enigma").into();
        assert_eq!(c.key, expected);
    }

    #[test]
    fn metadata_is_the_iv() {
        let c = AesCbcCryptor::new("enigma").unwrap();
        let out = c.encrypt(b"hello").unwrap();
        assert_eq!(out.metadata.as_ref().map(Vec::len), Some(16));
        assert_eq!(c.decrypt(&out).unwrap(), b"hello");
    }

    #[test]
    fn fresh_iv_per_call() {
        let c = AesCbcCryptor::new("enigma").unwrap();
        let a = c.encrypt(b"same").unwrap();
        let b = c.encrypt(b"same").unwrap();
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn empty_input_is_rejected() {
        let c = AesCbcCryptor::new("enigma").unwrap();
        assert!(matches!(c.encrypt(b""), Err(CryptoError::EmptyData)));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(AesCbcCryptor::new(""), Err(CryptoError::InvalidKey(_))));
    }
}
