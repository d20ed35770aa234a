//! # flow-core
//!
//! Basic-block execution tracing engine for Mach/XNU targets (x86-64 and
//! 32-bit x86, with an ARM64 backend contract specified but not yet
//! implemented).
//!
//! This crate provides the foundational tracing primitives:
//! - Process attachment via Mach task ports
//! - Register inspection and single-step/hardware-breakpoint control
//! - Target memory reads and dynamic-loader image discovery
//! - A binary trace log recording basic blocks and library loads
//!
//! ## Platform Support
//!
//! - **macOS**: Mach APIs (`task_for_pid`, `thread_get_state`, Mach
//!   exception ports)
//! - **Linux / Windows**: not supported; the tracing model here is
//!   Mach-specific (exception ports, debug registers via thread state
//!   flavors)
//!
//! ## Why unsafe code is needed
//!
//! Every kernel call this crate makes — reading another process's memory,
//! suspending its threads, installing an exception port, mutating debug
//! registers — crosses into FFI that Rust cannot verify. Each call is
//! wrapped in a safe-looking function that upholds its own invariants, but
//! the crate cannot be `#![forbid(unsafe_code)]`; that lint is dropped at
//! the workspace level for this reason.

#![warn(missing_docs)]

pub mod decoder;
pub mod dyld;
pub mod error;
pub mod platform;
pub mod prelude;
pub mod trace_log;
pub mod tracer;
pub mod types;
