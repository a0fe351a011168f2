//! # vcd-core
//!
//! Core types and utilities for working with the vCloud Director network APIs.
//!
//! This crate provides the shared error type, HTTP client tuning, validated
//! configuration, identifier normalization, and the XML codec used by the
//! service crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types, including the structured platform error body
//! - [`client`] - HTTP client tuning constants and configuration
//! - [`config`] - Validated configuration for vCD clients
//! - [`urn`] - URN to bare identifier normalization
//! - [`xml`] - XML encoding and decoding with the platform's conventions

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod urn;
pub mod xml;

// Re-export commonly used types
pub use error::{ApiError, Error, Result};
