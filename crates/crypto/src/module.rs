use std::io::{Read, Write};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pn_domain::trace::TraceEvent;

use crate::aes_cbc::AesCbcCryptor;
use crate::cryptor::{Cryptor, EncryptedData};
use crate::error::{CryptoError, Result};
use crate::header::{self, CryptorHeader, LEGACY_IDENTIFIER, SENTINEL};
use crate::legacy::LegacyCryptor;

/// Default chunk size for stream helpers.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Encrypts with a default cryptor and decrypts with whichever registered
/// cryptor the data names in its header.
#[derive(Clone)]
pub struct CryptoModule {
    default: Arc<dyn Cryptor>,
    cryptors: Vec<Arc<dyn Cryptor>>,
}

impl std::fmt::Debug for CryptoModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self
            .cryptors
            .iter()
            .map(|c| header::identifier_str(&c.identifier()))
            .collect();
        f.debug_struct("CryptoModule")
            .field("default", &header::identifier_str(&self.default.identifier()))
            .field("cryptors", &ids)
            .finish()
    }
}

impl CryptoModule {
    /// `default` is used for encryption and is also available for
    /// decryption alongside `others`.
    pub fn new(default: Arc<dyn Cryptor>, others: Vec<Arc<dyn Cryptor>>) -> Self {
        let mut cryptors = vec![default.clone()];
        for c in others {
            if cryptors.iter().all(|known| known.identifier() != c.identifier()) {
                cryptors.push(c);
            }
        }
        Self { default, cryptors }
    }

    /// AES-CBC with header by default; legacy data still decrypts.
    pub fn aes_cbc(cipher_key: &str, random_iv: bool) -> Result<Self> {
        Ok(Self::new(
            Arc::new(AesCbcCryptor::new(cipher_key)?),
            vec![Arc::new(LegacyCryptor::new(cipher_key, random_iv)?)],
        ))
    }

    /// Legacy encryption by default; headered AES-CBC data still decrypts.
    pub fn legacy(cipher_key: &str, random_iv: bool) -> Result<Self> {
        Ok(Self::new(
            Arc::new(LegacyCryptor::new(cipher_key, random_iv)?),
            vec![Arc::new(AesCbcCryptor::new(cipher_key)?)],
        ))
    }

    pub fn default_identifier(&self) -> [u8; 4] {
        self.default.identifier()
    }

    fn cryptor(&self, identifier: &[u8; 4]) -> Option<&Arc<dyn Cryptor>> {
        self.cryptors.iter().find(|c| &c.identifier() == identifier)
    }

    fn select(&self, data: &[u8]) -> Result<(&Arc<dyn Cryptor>, Option<Vec<u8>>, usize)> {
        match CryptorHeader::decode(data)? {
            Some((h, used)) => {
                let cryptor = self.cryptor(&h.identifier).ok_or_else(|| {
                    CryptoError::UnknownCryptor(header::identifier_str(&h.identifier))
                })?;
                Ok((cryptor, Some(h.metadata), used))
            }
            None => {
                let cryptor = self.cryptor(&LEGACY_IDENTIFIER).ok_or_else(|| {
                    CryptoError::InvalidHeader("no header and no legacy cryptor".into())
                })?;
                Ok((cryptor, None, 0))
            }
        }
    }

    // ── byte buffers ────────────────────────────────────────────────

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        let out = self.default.encrypt(data)?;
        if self.default.identifier() == LEGACY_IDENTIFIER {
            return Ok(out.data);
        }
        let header = CryptorHeader::new(self.default.identifier(), out.metadata.unwrap_or_default())?;
        let mut bytes = header.encode();
        bytes.extend(out.data);
        Ok(bytes)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        let (cryptor, metadata, used) = self.select(data)?;
        let body = &data[used..];
        if body.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        cryptor.decrypt(&EncryptedData {
            metadata,
            data: body.to_vec(),
        })
    }

    // ── message payloads ────────────────────────────────────────────

    /// Encrypt and Base64-encode, as used for published payloads.
    pub fn encrypt_string(&self, plaintext: &str) -> Result<String> {
        Ok(STANDARD.encode(self.encrypt(plaintext.as_bytes())?))
    }

    pub fn decrypt_string(&self, encoded: &str) -> Result<String> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Decryption(format!("base64: {e}")))?;
        let plain = self.decrypt(&bytes)?;
        String::from_utf8(plain).map_err(|e| CryptoError::Decryption(format!("utf-8: {e}")))
    }

    // ── streams ─────────────────────────────────────────────────────

    /// Encrypt `reader` into `writer` in `chunk_size` pieces.  Returns the
    /// number of bytes written.
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        chunk_size: usize,
    ) -> Result<u64> {
        let (metadata, mut processor) = self.default.stream_encryptor()?;
        let mut written = 0u64;
        if self.default.identifier() != LEGACY_IDENTIFIER {
            let header = CryptorHeader::new(self.default.identifier(), metadata.unwrap_or_default())?
                .encode();
            writer.write_all(&header)?;
            written += header.len() as u64;
        }

        let mut buf = vec![0u8; chunk_size.max(1)];
        let mut seen = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            seen += n as u64;
            let out = processor.update(&buf[..n])?;
            writer.write_all(&out)?;
            written += out.len() as u64;
        }
        if seen == 0 {
            return Err(CryptoError::EmptyData);
        }
        let tail = processor.finish()?;
        writer.write_all(&tail)?;
        written += tail.len() as u64;
        writer.flush()?;
        Ok(written)
    }

    /// Decrypt `reader` into `writer`, choosing the cryptor from the header
    /// at the start of the stream.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        chunk_size: usize,
    ) -> Result<u64> {
        let mut buf = vec![0u8; chunk_size.max(1)];
        let mut prefix = Vec::new();

        // Collect enough bytes to parse the header, if any.
        loop {
            if prefix.len() >= SENTINEL.len() && &prefix[..SENTINEL.len()] != SENTINEL {
                break;
            }
            if prefix.len() >= SENTINEL.len() {
                if let Some(total) = header::encoded_len(&prefix)? {
                    if prefix.len() >= total {
                        break;
                    }
                }
            }
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            prefix.extend_from_slice(&buf[..n]);
        }
        if prefix.is_empty() {
            return Err(CryptoError::EmptyData);
        }

        let (cryptor, metadata, used) = self.select(&prefix)?;
        tracing::debug!(
            cryptor = %header::identifier_str(&cryptor.identifier()),
            "decrypting stream"
        );
        let mut processor = cryptor.stream_decryptor(metadata.as_deref())?;
        let mut written = 0u64;

        let first = processor.update(&prefix[used..])?;
        writer.write_all(&first)?;
        written += first.len() as u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let out = processor.update(&buf[..n])?;
            writer.write_all(&out)?;
            written += out.len() as u64;
        }
        let tail = processor.finish()?;
        writer.write_all(&tail)?;
        written += tail.len() as u64;
        writer.flush()?;
        Ok(written)
    }

    /// Record which cryptor is active, for the trace log.
    pub fn announce(&self, source: &str) {
        TraceEvent::CryptorSelected {
            identifier: header::identifier_str(&self.default.identifier()),
            source: source.into(),
        }
        .emit();
    }
}
