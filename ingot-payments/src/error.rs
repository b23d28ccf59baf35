use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("payment cache error: {0}")]
    Cache(String),
}

impl From<Box<bincode::ErrorKind>> for PaymentError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        PaymentError::Serialization(err.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for PaymentError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        PaymentError::Signing(err.to_string())
    }
}
