//! Status report retrieval for the websocket reaper
//!
//! The reaper consumes the server-status page as an opaque body. This crate
//! provides the [`StatusSource`] seam with a live HTTP implementation and a
//! captured-file implementation used for rehearsals.

pub mod client;
pub mod config;
pub mod errors;

// Re-export main types for convenience
pub use client::{FileStatusSource, HttpStatusSource, StatusSource};
pub use config::HttpConfig;
pub use errors::HttpError;
