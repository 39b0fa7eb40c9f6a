//! Rotation of an API access token held in a secret store
//!
//! A single rotation reads client credentials from a _source_ secret, exchanges them
//! for a fresh access token, and overwrites a _target_ secret with the new token and
//! the time it was obtained:
//!
//! ```text
//! source secret                      target secret
//! { "TOKEN_URL": "...",              { "API_TOKEN": "...",
//!   "CLIENT_ID": "...",     ──►        "UPDATED_AT": "2024-01-01T00:00:00.000Z" }
//!   "CLIENT_SECRET": "..." }
//! ```
//!
//! [`TokenRotation`] sequences those steps and is the only place errors are turned
//! into a [`RotationResponse`]. The target secret is written at most once, and only
//! after a token has been obtained.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod config;
mod error;
pub mod records;
mod response;
mod rotation;

pub use error::RotationError;
pub use response::{MessageBody, RotationResponse};
pub use rotation::TokenRotation;
