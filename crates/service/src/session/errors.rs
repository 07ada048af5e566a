use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Why a login attempt failed; `SessionStore::login` flattens this to `false`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("another login attempt is still in progress")]
    LoginInProgress,
    #[error("logged out while the login was in progress")]
    LoginCancelled,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            SessionError::LoginInProgress => 3001,
            SessionError::LoginCancelled => 3002,
            SessionError::Api(e) => e.code(),
            SessionError::Storage(_) => 3100,
        }
    }
}
