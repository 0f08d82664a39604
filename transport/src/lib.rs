//! HTTP transport for the qpsbench engine
//!
//! This crate provides the reqwest-backed implementation of the core
//! `Transport` trait. TLS, pooling and HTTP/2 negotiation are handled by
//! reqwest; the engine only sees complete responses or classified errors.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod http;

pub use config::{ConfigValidationError, HttpTransportConfig};
pub use http::HttpTransport;
