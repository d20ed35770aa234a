//! # Flow Utilities
//!
//! Shared utilities, logging, and config helpers for the flow tracer.
//!
//! This crate provides common functionality used across the flow workspace,
//! including a logging infrastructure built on `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{LogFormat, LogLevel, LoggingError, init_logging, init_logging_file_only, init_logging_with_level};
pub use tracing::{debug, error, info, trace, warn};
