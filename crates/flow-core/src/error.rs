//! # Error Types
//!
//! General error handling for the tracer.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

/// Main error type for tracer operations
///
/// Every failure mode the tracer can hit funnels into one of these variants.
/// The exception-action dispatch in the Exception Port maps any of them to a
/// logged error plus an abort of the current run; none of them are meant to
/// be recovered from mid-trace.
#[derive(Error, Debug)]
pub enum FlowError
{
    /// Caller-supplied argument is malformed or out of range.
    ///
    /// Covers bad PIDs, unsupported architectures, malformed CLI input, and
    /// double-attach attempts against the Exception Port singleton.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A Mach or ptrace call into the kernel failed.
    ///
    /// Wraps `task_for_pid`, `mach_msg`, `thread_get_state`/`thread_set_state`,
    /// `vm_read_overwrite`, and `ptrace` failures alike.
    #[cfg(target_os = "macos")]
    #[error("Kernel call failed: {0}")]
    KernelFailure(#[from] crate::platform::macos::error::MachError),

    /// The instruction decoder could not classify a basic block boundary.
    ///
    /// Raised when the decoder adapter runs off the end of a readable memory
    /// window or encounters a byte sequence with no valid instruction encoding.
    #[error("Instruction decode failed at 0x{address:016x}: {reason}")]
    DecodeFailure
    {
        /// Address at which decoding failed
        address: u64,
        /// Reason given by the decoder backend
        reason: String,
    },

    /// An I/O error occurred while reading or writing the trace log.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// A host-side allocation could not be satisfied.
    ///
    /// In practice this only fires for the growing exception-code buffer and
    /// trace-log write buffers; it exists as a distinct variant so allocator
    /// failures are never silently folded into `KernelFailure`.
    #[error("Allocation failed: {0}")]
    AllocationFailure(String),

    /// The target process is not currently attached.
    #[error("Not attached to a process")]
    NotAttached,
}

/// Convenience type alias for `Result<T, FlowError>`
///
/// ```rust
/// use flow_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, FlowError>;
