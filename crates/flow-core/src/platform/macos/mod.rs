//! # macOS Tracing Implementation
//!
//! macOS-specific pieces built on Mach APIs: the task port, the exception
//! port that carries single-step and breakpoint traps, the x86-64/ARM64
//! register backends, and process launch/suspend lifecycle helpers.
//!
//! macOS debugging is Mach-native, not `ptrace`-native: a task port to
//! inspect and control the process, an exception port to receive its traps,
//! and per-thread state flavors to read and write registers. `ptrace` is
//! still used, but only for `PT_ATTACHEXC` (hand traps to the exception port
//! instead of generating `SIGTRAP`) and `PT_THUPDATE`/`PT_KILL`/`PT_DETACH`.
//!
//! ## Module Map
//!
//! - [`ffi`]: raw Mach/`ptrace` declarations not covered by `mach2`
//! - [`constants`]: thread state flavors, trap opcodes, Mach constants
//! - [`error`]: `MachError`, the `kern_return_t` wrapper
//! - [`guards`]: RAII suspend/resume guard
//! - [`launch`]: `posix_spawn`-based suspended launch
//! - [`task`]: the target process handle (memory, threads, dyld info)
//! - [`exception`]: the exception port and its state-identity demux
//! - [`registers`]: per-architecture backends ([`registers::ArchBackend`])

pub mod constants;
pub mod error;
pub mod exception;
pub mod ffi;
pub mod guards;
pub mod launch;
pub mod registers;
pub mod task;

pub use error::MachError;
pub use task::Target;
