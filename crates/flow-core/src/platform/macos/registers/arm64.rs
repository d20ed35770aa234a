//! # ARM64 Architecture Backend (contract only)
//!
//! Not implemented. `backend_for` registers [`Arm64Backend`] like any other
//! backend — an arm64 target is accepted at architecture-selection time —
//! but every method here returns `FlowError::InvalidArgument` with a message
//! naming the unimplemented operation, so the failure instead surfaces at
//! the first call into the backend (`Tracer::new`'s first step, or sooner).
//!
//! The real backend, when written, follows this contract:
//!
//! - **Single-step**: `MDSCR_EL1.SS` (bit 0), toggled via `ARM_DEBUG_STATE64`
//!   (flavor 15), mirroring the x86-64 RFLAGS trace flag.
//! - **Hardware breakpoint**: `DBGBVR0_EL1` (address) and `DBGBCR0_EL1`
//!   (control), the ARM64 equivalent of DR0/DR7 slot 0 — same "exactly one
//!   armed breakpoint" invariant as x86-64, just a different register pair.
//! - **Program counter**: `ARM_THREAD_STATE64` (flavor 6), `pc` field.
//! - **Argument registers**: AAPCS64, X0-X7 then the stack, the ARM64
//!   analogue of the System-V `rdi,rsi,rdx,rcx,r8,r9` sequence used here.
//! - **Decoding**: `iced-x86` only covers x86/x86_64; an ARM64 backend would
//!   need a different decoder crate for basic-block boundary detection.

use libc::thread_act_t;

use super::{ArchBackend, ArgsCursor};
use crate::error::{FlowError, Result};
use crate::types::BranchKind;

/// ARM64 `ArchBackend` stub.
pub struct Arm64Backend;

impl ArchBackend for Arm64Backend
{
    fn read_pc(&self, _thread: thread_act_t) -> Result<u64>
    {
        Err(unimplemented_op("read_pc"))
    }

    fn set_single_step(&self, _thread: thread_act_t, _enabled: bool) -> Result<()>
    {
        Err(unimplemented_op("set_single_step"))
    }

    fn single_step_enabled(&self, _thread: thread_act_t) -> Result<bool>
    {
        Err(unimplemented_op("single_step_enabled"))
    }

    fn set_breakpoint(&self, _thread: thread_act_t, _address: u64) -> Result<()>
    {
        Err(unimplemented_op("set_breakpoint"))
    }

    fn clear_breakpoint(&self, _thread: thread_act_t) -> Result<()>
    {
        Err(unimplemented_op("clear_breakpoint"))
    }

    fn find_next_branch(&self, _code: &[u8], _code_base: u64, _start: u64) -> Result<(u64, BranchKind)>
    {
        Err(unimplemented_op("find_next_branch"))
    }

    fn args_cursor(&self, _thread: thread_act_t) -> Result<ArgsCursor>
    {
        Err(unimplemented_op("args_cursor"))
    }
}

fn unimplemented_op(op: &str) -> FlowError
{
    FlowError::InvalidArgument(format!("arm64 backend does not implement `{op}` yet"))
}
