use reqwest::StatusCode;
use thiserror::Error;

use crate::storage::StorageError;

/// Failures surfaced by the API client. Every variant reaches the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid username or password format")]
    InvalidInputFormat,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("API error: {status} {status_text} - {body}")]
    ServerError { status: u16, status_text: String, body: String },
    #[error("cannot connect to server {base_url}: {message}")]
    NetworkUnreachable { base_url: String, message: String },
    #[error("unexpected response body: {0}")]
    DecodeFailure(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ApiError::InvalidInputFormat => 2001,
            ApiError::InvalidCredentials => 2002,
            ApiError::ServerError { .. } => 2100,
            ApiError::NetworkUnreachable { .. } => 2200,
            ApiError::DecodeFailure(_) => 2300,
            ApiError::Storage(_) => 2400,
        }
    }

    /// HTTP status carried by the error, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ServerError { status, .. } => Some(*status),
            ApiError::InvalidInputFormat => Some(StatusCode::UNPROCESSABLE_ENTITY.as_u16()),
            ApiError::InvalidCredentials => Some(StatusCode::UNAUTHORIZED.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn server(status: StatusCode, body: String) -> Self {
        ApiError::ServerError {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body,
        }
    }
}
