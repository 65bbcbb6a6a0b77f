//! Unified error types for the OCF reader.
//!
//! This module provides a single error type shared by the archive accessor,
//! the XML layer and the container, presenting a consistent API to users.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
