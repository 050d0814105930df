//! HTTP module containing HTTP client functionality.
//!
//! This module provides HTTP client setup and header helpers shared by the
//! HTTP transport.
//!
//! # Overview
//!
//! - [`client`] - HTTP client creation and middleware configuration
//! - [`content_length`] - declared size extraction from response headers
//!
//! # Examples
//!
//! ```rust
//! use tributary::http::{create_http_client, HttpClientConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_http_client(HttpClientConfig::default())?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod content_length;

pub use client::{create_http_client, HttpClientConfig};
pub use content_length::content_length;
