//! Client core of the attendance dashboard.
//! - `api`: the HTTP client for the attendance backend, owner of the bearer token.
//! - `session`: login/logout and session restore on top of the client.
//! - `storage`: durable key-value storage shared by both.
//! - `records` and `feed`: client-side views and the live check-in poller.

pub mod api;
pub mod feed;
pub mod records;
pub mod session;
pub mod storage;
