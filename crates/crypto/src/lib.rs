//! `pn-crypto`: payload and file encryption.
//!
//! A [`CryptoModule`] holds one default [`Cryptor`] for encryption and a
//! set of cryptors for decryption.  Encrypted data starts with a
//! [`CryptorHeader`] naming the cryptor that produced it, except for the
//! header-less [`LegacyCryptor`] format.

pub mod aes_cbc;
mod block;
pub mod cryptor;
pub mod error;
pub mod header;
pub mod legacy;
pub mod module;

pub use aes_cbc::AesCbcCryptor;
pub use cryptor::{ChunkProcessor, Cryptor, EncryptedData};
pub use error::CryptoError;
pub use header::CryptorHeader;
pub use legacy::LegacyCryptor;
pub use module::{CryptoModule, DEFAULT_CHUNK_SIZE};
