// libs/video-session-cell/src/lib.rs
//! Thin client for the external video-session provisioning service.
//!
//! The booking path calls [`VideoSessionClient::create_session`] once per
//! committed appointment; the join path calls
//! [`VideoSessionClient::generate_access_token`] to mint a time-boxed
//! credential. Both are fallible, non-idempotent remote calls — callers own
//! the compensation story (booking rolls its appointment back when session
//! creation fails).

pub mod models;
pub mod services;

pub use models::VideoSessionError;
pub use services::VideoSessionClient;
