use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("model codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
