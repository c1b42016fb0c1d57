//! Shared wire-format objects and a typed HTTP client for the Oddsmesh API.
//!
//! The server and any Rust consumers (frontend BFFs, operator tooling,
//! integration tests) depend on this crate so that request/response shapes
//! stay in one place.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod objects;
