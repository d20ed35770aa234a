//! # Types
//!
//! Platform-agnostic types used throughout the tracer.
//!
//! These types abstract away platform-specific details so the tracer core
//! and trace log can work with "process ID", "thread ID", and "basic block"
//! without knowing whether the underlying attach mechanism is Mach or
//! something else.

pub mod address;
pub mod block;
pub mod process;

pub use address::Address;
pub use block::{Block, BranchKind};
pub use process::{Architecture, ProcessId, ThreadId};
