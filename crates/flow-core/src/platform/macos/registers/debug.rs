//! # x86-64 Debug Register Access (DR0-only)
//!
//! The tracer arms exactly one hardware breakpoint at a time, always in
//! DR0/slot 0 of the debug control register (DR7). There is never a reason
//! to allocate across DR0-DR3: the tracer core disarms the previous
//! breakpoint before arming the next one, so a single slot is sufficient and
//! keeps the debug-register state trivial to reason about.
//!
//! ## Flavor
//!
//! - `x86_DEBUG_STATE64` (flavor 11) — DR0-DR7

use libc::{natural_t, thread_act_t};
use mach2::kern_return::KERN_SUCCESS;

use crate::error::{FlowError, Result};
use crate::platform::macos::{constants, ffi};

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct X86DebugState64
{
    dr0: u64,
    dr1: u64,
    dr2: u64,
    dr3: u64,
    dr4: u64,
    dr5: u64,
    dr6: u64,
    dr7: u64,
}

/// DR7 local-enable bit for DR0, and the RW/LEN field for execute breakpoints
/// (both zero: RW=00 execute, LEN=00 one byte).
const DR7_L0: u64 = 1 << 0;

fn get_debug_state(thread: thread_act_t) -> Result<X86DebugState64>
{
    unsafe {
        let mut state = X86DebugState64::default();
        let mut count = constants::X86_DEBUG_STATE64_COUNT;
        let kr = ffi::thread_get_state(
            thread,
            constants::X86_DEBUG_STATE64,
            std::ptr::from_mut(&mut state).cast::<natural_t>(),
            &mut count,
        );
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
        Ok(state)
    }
}

fn set_debug_state(thread: thread_act_t, state: &X86DebugState64) -> Result<()>
{
    unsafe {
        let kr = ffi::thread_set_state(
            thread,
            constants::X86_DEBUG_STATE64,
            std::ptr::from_ref(state).cast::<natural_t>(),
            constants::X86_DEBUG_STATE64_COUNT,
        );
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
    }
    Ok(())
}

/// Arm the hardware breakpoint in DR0 at `address`, replacing whatever was
/// there before.
pub fn set_hardware_breakpoint(thread: thread_act_t, address: u64) -> Result<()>
{
    let mut state = get_debug_state(thread)?;
    state.dr0 = address;
    // Clear RW/LEN bits for slot 0 (bits 16-19) so it's an execute breakpoint.
    state.dr7 &= !(0xF << 16);
    state.dr7 |= DR7_L0;
    set_debug_state(thread, &state)
}

/// Disarm the DR0 hardware breakpoint, leaving the address in place but
/// inert (clearing the enable bit is sufficient; `dr0` is zeroed too so a
/// stale address never lingers in a readable debug register).
pub fn clear_hardware_breakpoint(thread: thread_act_t) -> Result<()>
{
    let mut state = get_debug_state(thread)?;
    state.dr7 &= !DR7_L0;
    state.dr0 = 0;
    set_debug_state(thread, &state)
}
