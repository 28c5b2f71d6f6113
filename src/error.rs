use crate::{api::orders::DownstreamError, store::StorageError};

/// Failures of a cart or order operation before they are folded into a
/// `success = false` response.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Downstream(#[from] DownstreamError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    /// Message shown to the caller. Storage and downstream details stay in the logs.
    pub fn user_message(&self, generic: &str) -> String {
        match self {
            ServiceError::Validation(message) | ServiceError::NotFound(message) => message.clone(),
            ServiceError::Storage(_) | ServiceError::Downstream(_) => generic.to_string(),
        }
    }
}
