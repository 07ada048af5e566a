//! API gateway client: the only part of the crate that talks to the network.
//!
//! Split into wire/domain types, error kinds, and the client itself.

pub mod client;
pub mod domain;
pub mod errors;

pub use client::{ApiClient, DEFAULT_TREND_DAYS};
pub use domain::{AttendanceRecord, Credentials, LoginResponse, RecordPatch, TeacherPayload};
pub use errors::ApiError;
