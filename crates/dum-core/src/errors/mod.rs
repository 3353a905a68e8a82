//! Error types for dum-core
//!
//! This module defines the error type used throughout the dialog usage
//! manager, covering stale handles, registry misses and protocol-level
//! construction failures.

pub mod dum_errors;

// Re-export main error types
pub use dum_errors::{DumError, DumResult};
