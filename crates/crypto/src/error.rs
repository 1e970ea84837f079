/// Failures of the crypto module and its cryptors.
#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    /// Sentinel present but the header is truncated or of an unknown
    /// version, or no header and no legacy cryptor to fall back on.
    #[error("invalid cryptor header: {0}")]
    InvalidHeader(String),

    #[error("unknown cryptor: {0}")]
    UnknownCryptor(String),

    #[error("cryptor identifier must be 4 bytes")]
    InvalidIdentifier,

    #[error("nothing to encrypt or decrypt")]
    EmptyData,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CryptoError> for pn_domain::Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Io(io) => pn_domain::Error::Io(io),
            other => pn_domain::Error::Crypto(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
