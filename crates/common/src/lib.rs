//! # Common library
//!
//! This crate contains the shared [`Config`] struct used to configure every
//! service in the workspace, plus a small set of cross-cutting utilities
//! (currently just logging).
//!
//! [`Config`]: config::Config

/// Shared workspace configuration.
pub mod config;

/// Logging utilities.
#[cfg(feature = "logging")]
pub mod logging;
