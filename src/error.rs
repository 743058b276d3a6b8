use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Publish error: {0}")]
    PublishError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

impl PaymentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Infrastructure failures that a later retry may get past.
    ///
    /// Inbound messages failing this way are handed back to the bus for
    /// redelivery; everything else is dropped.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StorageError(_) | Self::PublishError(_) | Self::IoError(_) => true,
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDbError(_) => true,
            _ => false,
        }
    }

    /// Failures caused by the caller's input rather than by infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_) | Self::NotFound { .. } | Self::Conflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
