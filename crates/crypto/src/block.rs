//! AES-256-CBC primitives shared by both cryptors.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Block;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::cryptor::ChunkProcessor;
use crate::error::{CryptoError, Result};

pub(crate) const BLOCK: usize = 16;
pub(crate) type Key = [u8; 32];
pub(crate) type Iv = [u8; BLOCK];

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

pub(crate) fn random_iv() -> Iv {
    let mut iv = [0u8; BLOCK];
    OsRng.fill_bytes(&mut iv);
    iv
}

pub(crate) fn iv_from(bytes: &[u8]) -> Result<Iv> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::Decryption(format!("expected {BLOCK}-byte IV, got {}", bytes.len())))
}

pub(crate) fn encrypt(key: &Key, iv: &Iv, data: &[u8]) -> Vec<u8> {
    Encryptor::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(data)
}

pub(crate) fn decrypt(key: &Key, iv: &Iv, data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() % BLOCK != 0 {
        return Err(CryptoError::Decryption(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK}",
            data.len()
        )));
    }
    Decryptor::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|_| CryptoError::Decryption("bad padding; wrong key?".into()))
}

// ── streaming ───────────────────────────────────────────────────────

pub(crate) struct StreamEncryptor {
    cipher: Encryptor,
    pending: Vec<u8>,
    /// Emitted before the first ciphertext block (legacy random IV).
    prefix: Option<Vec<u8>>,
}

impl StreamEncryptor {
    pub(crate) fn new(key: &Key, iv: &Iv, prefix: Option<Vec<u8>>) -> Self {
        Self {
            cipher: Encryptor::new(key.into(), iv.into()),
            pending: Vec::new(),
            prefix,
        }
    }

    fn take_blocks(&mut self) -> Vec<u8> {
        let whole = self.pending.len() / BLOCK * BLOCK;
        let mut out = self.prefix.take().unwrap_or_default();
        let rest = self.pending.split_off(whole);
        let mut blocks = std::mem::replace(&mut self.pending, rest);
        for block in blocks.chunks_exact_mut(BLOCK) {
            self.cipher.encrypt_block_mut(Block::from_mut_slice(block));
        }
        out.extend_from_slice(&blocks);
        out
    }
}

impl ChunkProcessor for StreamEncryptor {
    fn update(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        Ok(self.take_blocks())
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>> {
        let pad = BLOCK - self.pending.len() % BLOCK;
        self.pending.extend(std::iter::repeat(pad as u8).take(pad));
        Ok(self.take_blocks())
    }
}

pub(crate) struct StreamDecryptor {
    key: Key,
    cipher: Option<Decryptor>,
    pending: Vec<u8>,
}

impl StreamDecryptor {
    /// With `iv = None` the first block of the stream is the IV.
    pub(crate) fn new(key: &Key, iv: Option<&Iv>) -> Self {
        Self {
            key: *key,
            cipher: iv.map(|iv| Decryptor::new(key.into(), iv.into())),
            pending: Vec::new(),
        }
    }

    fn ensure_cipher(&mut self) -> Result<bool> {
        if self.cipher.is_some() {
            return Ok(true);
        }
        if self.pending.len() < BLOCK {
            return Ok(false);
        }
        let rest = self.pending.split_off(BLOCK);
        let iv = iv_from(&self.pending)?;
        self.pending = rest;
        self.cipher = Some(Decryptor::new((&self.key).into(), (&iv).into()));
        Ok(true)
    }

    /// Decrypt all whole blocks but the last, which may carry padding.
    fn drain(&mut self) -> Vec<u8> {
        let whole = self.pending.len() / BLOCK * BLOCK;
        let ready = whole.saturating_sub(BLOCK);
        let rest = self.pending.split_off(ready);
        let mut blocks = std::mem::replace(&mut self.pending, rest);
        if let Some(cipher) = self.cipher.as_mut() {
            for block in blocks.chunks_exact_mut(BLOCK) {
                cipher.decrypt_block_mut(Block::from_mut_slice(block));
            }
        }
        blocks
    }
}

impl ChunkProcessor for StreamDecryptor {
    fn update(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        if !self.ensure_cipher()? {
            return Ok(Vec::new());
        }
        Ok(self.drain())
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>> {
        if !self.ensure_cipher()? {
            return Err(CryptoError::Decryption("stream shorter than IV".into()));
        }
        if self.pending.len() != BLOCK {
            return Err(CryptoError::Decryption(
                "stream length is not a multiple of the block size".into(),
            ));
        }
        let mut last = std::mem::take(&mut self.pending);
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.decrypt_block_mut(Block::from_mut_slice(&mut last));
        }
        let pad = last[BLOCK - 1] as usize;
        if pad == 0 || pad > BLOCK || !last[BLOCK - pad..].iter().all(|b| *b as usize == pad) {
            return Err(CryptoError::Decryption("bad padding; wrong key?".into()));
        }
        last.truncate(BLOCK - pad);
        Ok(last)
    }
}
