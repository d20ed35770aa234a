//! # Architecture Backend
//!
//! The `ArchBackend` trait is the seam between the tracer core's stepping
//! state machine and everything that differs per CPU architecture: reading
//! the program counter, toggling the trace-flag single-step actuator,
//! arming/disarming the one hardware breakpoint, finding the next branch
//! from a decoded instruction stream, and walking a calling convention's
//! argument registers.
//!
//! Only one hardware breakpoint is ever armed per thread (DR0). On x86-64
//! see [`debug`] for the register-level detail; 32-bit x86 does the same
//! thing against its own (32-bit-field) debug-state flavor directly in
//! [`x86`].

use libc::thread_act_t;

use crate::error::Result;
use crate::platform::macos::task::Target;
use crate::types::Architecture;

pub mod debug;

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "x86_64")]
pub mod x86;

pub mod arm64;

/// Per-architecture operations the tracer core drives through.
///
/// A backend is stateless beyond the thread port it's handed on each call;
/// the tracer core owns all higher-level state (which block it's in, what
/// the breakpoint is currently armed for).
pub trait ArchBackend
{
    /// Read the current program counter.
    fn read_pc(&self, thread: thread_act_t) -> Result<u64>;

    /// Enable or disable the trace-flag single-step actuator.
    fn set_single_step(&self, thread: thread_act_t, enabled: bool) -> Result<()>;

    /// Whether the trace-flag actuator is currently enabled.
    fn single_step_enabled(&self, thread: thread_act_t) -> Result<bool>;

    /// Arm the one hardware breakpoint at `address`.
    fn set_breakpoint(&self, thread: thread_act_t, address: u64) -> Result<()>;

    /// Disarm the hardware breakpoint, regardless of where it was set.
    fn clear_breakpoint(&self, thread: thread_act_t) -> Result<()>;

    /// Decode forward from `start`, within a `code` buffer read from the
    /// target at `code_base`, and return the address of the first
    /// instruction that ends a basic block, plus its branch kind.
    ///
    /// # Errors
    ///
    /// Returns `DecodeFailure` if decoding runs off the end of `code`
    /// without finding a branch.
    fn find_next_branch(&self, code: &[u8], code_base: u64, start: u64) -> Result<(u64, crate::types::BranchKind)>;

    /// Begin walking this architecture's calling-convention argument
    /// registers/stack slots for the call whose first argument register
    /// holds `initial`.
    fn args_cursor(&self, thread: thread_act_t) -> Result<ArgsCursor>;
}

/// Cursor over a function call's arguments, per the target architecture's
/// calling convention.
///
/// `next` advances through registers first, then falls back to reading
/// stack slots above the return address once the register sequence is
/// exhausted. `stack_slot_width` is the size of those stack slots: 8 bytes
/// for x86-64 (the seventh-and-later System-V argument), 4 bytes for 32-bit
/// x86 cdecl, which passes every argument on the stack and leaves
/// `register_values` empty.
pub struct ArgsCursor
{
    pub(crate) register_values: smallvec::SmallVec<[u64; 6]>,
    pub(crate) stack_pointer: u64,
    pub(crate) stack_slot_width: u64,
    pub(crate) index: usize,
}

impl ArgsCursor
{
    /// Number of arguments available purely from registers, before falling
    /// back to the stack.
    #[must_use]
    pub fn register_arg_count(&self) -> usize
    {
        self.register_values.len()
    }

    /// The `n`th argument, counting from zero, following System-V/AAPCS64
    /// register order and then stack slots above the return address.
    #[must_use]
    pub fn nth(&self, n: usize) -> Option<u64>
    {
        self.register_values.get(n).copied()
    }

    /// Consume the next argument, advancing the cursor. Once the register
    /// sequence (`rdi, rsi, rdx, rcx, r8, r9` on x86-64; empty on 32-bit x86
    /// cdecl) is exhausted, reads successive `stack_slot_width`-byte stack
    /// slots starting immediately above the return address.
    pub fn next(&mut self, target: &Target) -> Result<u64>
    {
        let value = if let Some(&value) = self.register_values.get(self.index) {
            value
        } else {
            let stack_index = self.index - self.register_values.len();
            // `stack_pointer` holds the return address itself; the first
            // stack argument is the first slot above it.
            let address = self.stack_pointer + self.stack_slot_width + (stack_index as u64) * self.stack_slot_width;
            let bytes = target.read_memory(address, self.stack_slot_width as usize)?;
            match self.stack_slot_width {
                4 => {
                    let bytes: [u8; 4] = bytes.try_into().map_err(|_| {
                        crate::error::FlowError::InvalidArgument(format!("short stack-argument read at 0x{address:08x}"))
                    })?;
                    u64::from(u32::from_ne_bytes(bytes))
                }
                _ => {
                    let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
                        crate::error::FlowError::InvalidArgument(format!("short stack-argument read at 0x{address:016x}"))
                    })?;
                    u64::from_ne_bytes(bytes)
                }
            }
        };
        self.index += 1;
        Ok(value)
    }
}

/// Resolve the architecture backend for the currently running build, or
/// `None` if the target's reported architecture has no backend at all.
#[must_use]
pub fn backend_for(arch: Architecture) -> Option<Box<dyn ArchBackend + Send>>
{
    match arch {
        #[cfg(target_arch = "x86_64")]
        Architecture::X86_64 => Some(Box::new(x86_64::X86_64Backend)),
        #[cfg(not(target_arch = "x86_64"))]
        Architecture::X86_64 => None,
        #[cfg(target_arch = "x86_64")]
        Architecture::X86 => Some(Box::new(x86::X86Backend)),
        #[cfg(not(target_arch = "x86_64"))]
        Architecture::X86 => None,
        Architecture::Arm64 => Some(Box::new(arm64::Arm64Backend)),
        Architecture::Unknown(_) => None,
    }
}
