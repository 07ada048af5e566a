//! Session store: who is logged in, and keeping that across restarts.
//!
//! Follows the same layering as the rest of the crate: domain types, error
//! kinds, the gateway seam (with an in-memory mock), and the store itself.

pub mod domain;
pub mod errors;
pub mod gateway;
pub mod service;

pub use domain::{SessionState, Teacher};
pub use errors::SessionError;
pub use gateway::AuthGateway;
pub use service::SessionStore;
