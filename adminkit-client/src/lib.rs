//! adminkit client - HTTP adapter for the admin console backend
//!
//! Implements [`adminkit_core::ConsoleApi`] over `reqwest`. Everything above this
//! crate only sees the trait, so tests substitute an in-memory backend.

pub mod api;

pub use api::{endpoints, HttpConsoleApi, CREDENTIAL_SCHEME};
