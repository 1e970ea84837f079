use crate::error::Result;

/// Output of a single cryptor invocation.
///
/// `metadata` travels in the Cryptor Header; cryptors that carry no
/// header leave it `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub metadata: Option<Vec<u8>>,
    pub data: Vec<u8>,
}

/// Incremental encrypt or decrypt over a byte stream.
///
/// Chunks may be any size; output is produced as soon as whole cipher
/// blocks are available.
pub trait ChunkProcessor: Send {
    fn update(&mut self, chunk: &[u8]) -> Result<Vec<u8>>;
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

/// A concrete cipher registered with the crypto module.
pub trait Cryptor: Send + Sync {
    /// Four-byte identifier written to the header.
    fn identifier(&self) -> [u8; 4];

    fn encrypt(&self, data: &[u8]) -> Result<EncryptedData>;

    fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>>;

    /// Returns the header metadata and a processor for the body.
    fn stream_encryptor(&self) -> Result<(Option<Vec<u8>>, Box<dyn ChunkProcessor>)>;

    fn stream_decryptor(&self, metadata: Option<&[u8]>) -> Result<Box<dyn ChunkProcessor>>;
}
