use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotaryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Ledger rejected the operation: {0}")]
    Ledger(String),

    #[error("Insufficient token balance: need {needed}, have {available}")]
    InsufficientBalance { needed: String, available: String },

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Sealed payload could not be opened: {0}")]
    Unseal(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NotaryError>;
