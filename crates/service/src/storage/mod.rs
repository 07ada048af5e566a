//! Durable key-value storage for session state.
//!
//! The session layer only needs three operations, so storage is a small
//! capability trait with a file-backed implementation for real use and an
//! in-memory one for tests and ephemeral sessions.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Key holding the raw bearer token.
pub const TOKEN_KEY: &str = "access_token";
/// Key holding the JSON-serialized teacher identity.
pub const TEACHER_KEY: &str = "teacher";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(String),
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
