//! # 32-bit x86 Architecture Backend
//!
//! Implements [`ArchBackend`] for 32-bit x86 targets: `X86_THREAD_STATE32`
//! (flavor 1) for general-purpose registers and the program counter, the
//! EFLAGS trace flag for single-step, DR0 (via `X86_DEBUG_STATE32`, flavor
//! 10) for the hardware breakpoint, `iced-x86` in 32-bit mode for
//! basic-block boundary decoding, and cdecl — pure stack, no argument
//! registers — for argument extraction.

use libc::{natural_t, thread_act_t};
use mach2::kern_return::KERN_SUCCESS;
use smallvec::smallvec;

use super::{ArchBackend, ArgsCursor};
use crate::decoder;
use crate::error::{FlowError, Result};
use crate::platform::macos::{constants, ffi};
use crate::types::BranchKind;

/// Mirrors the kernel's `x86_thread_state32_t` (osfmk/mach/i386/_structs.h):
/// 16 32-bit fields, 64 bytes, matching `X86_THREAD_STATE32_COUNT` (16
/// `natural_t` words).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct X86ThreadState32
{
    eax: u32,
    ebx: u32,
    ecx: u32,
    edx: u32,
    edi: u32,
    esi: u32,
    ebp: u32,
    esp: u32,
    ss: u32,
    eflags: u32,
    eip: u32,
    cs: u32,
    ds: u32,
    es: u32,
    fs: u32,
    gs: u32,
}

/// Mirrors the kernel's `x86_debug_state32_t`: DR0-DR7, each a 32-bit
/// register on this flavor.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct X86DebugState32
{
    dr0: u32,
    dr1: u32,
    dr2: u32,
    dr3: u32,
    dr4: u32,
    dr5: u32,
    dr6: u32,
    dr7: u32,
}

/// DR7 local-enable bit for DR0 (RW/LEN left at 00/00: execute, one byte).
const DR7_L0: u32 = 1 << 0;

fn get_thread_state(thread: thread_act_t) -> Result<X86ThreadState32>
{
    unsafe {
        let mut state = X86ThreadState32::default();
        let mut count = constants::X86_THREAD_STATE32_COUNT;
        let kr = ffi::thread_get_state(
            thread,
            constants::X86_THREAD_STATE32,
            std::ptr::from_mut(&mut state).cast::<natural_t>(),
            &mut count,
        );
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
        Ok(state)
    }
}

fn set_thread_state(thread: thread_act_t, state: &X86ThreadState32) -> Result<()>
{
    unsafe {
        let kr = ffi::thread_set_state(
            thread,
            constants::X86_THREAD_STATE32,
            std::ptr::from_ref(state).cast::<natural_t>(),
            constants::X86_THREAD_STATE32_COUNT,
        );
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
    }
    Ok(())
}

fn get_debug_state(thread: thread_act_t) -> Result<X86DebugState32>
{
    unsafe {
        let mut state = X86DebugState32::default();
        let mut count = constants::X86_DEBUG_STATE32_COUNT;
        let kr = ffi::thread_get_state(
            thread,
            constants::X86_DEBUG_STATE32,
            std::ptr::from_mut(&mut state).cast::<natural_t>(),
            &mut count,
        );
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
        Ok(state)
    }
}

fn set_debug_state(thread: thread_act_t, state: &X86DebugState32) -> Result<()>
{
    unsafe {
        let kr = ffi::thread_set_state(
            thread,
            constants::X86_DEBUG_STATE32,
            std::ptr::from_ref(state).cast::<natural_t>(),
            constants::X86_DEBUG_STATE32_COUNT,
        );
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
    }
    Ok(())
}

/// 32-bit x86 `ArchBackend`.
pub struct X86Backend;

impl ArchBackend for X86Backend
{
    fn read_pc(&self, thread: thread_act_t) -> Result<u64>
    {
        Ok(u64::from(get_thread_state(thread)?.eip))
    }

    fn set_single_step(&self, thread: thread_act_t, enabled: bool) -> Result<()>
    {
        let mut state = get_thread_state(thread)?;
        let flag = constants::X86_TRACE_FLAG as u32;
        if enabled {
            state.eflags |= flag;
        } else {
            state.eflags &= !flag;
        }
        set_thread_state(thread, &state)
    }

    fn single_step_enabled(&self, thread: thread_act_t) -> Result<bool>
    {
        Ok(get_thread_state(thread)?.eflags & constants::X86_TRACE_FLAG as u32 != 0)
    }

    fn set_breakpoint(&self, thread: thread_act_t, address: u64) -> Result<()>
    {
        let mut state = get_debug_state(thread)?;
        state.dr0 = address as u32;
        state.dr7 &= !(0xF << 16);
        state.dr7 |= DR7_L0;
        set_debug_state(thread, &state)
    }

    fn clear_breakpoint(&self, thread: thread_act_t) -> Result<()>
    {
        let mut state = get_debug_state(thread)?;
        state.dr7 &= !DR7_L0;
        state.dr0 = 0;
        set_debug_state(thread, &state)
    }

    fn find_next_branch(&self, code: &[u8], code_base: u64, start: u64) -> Result<(u64, BranchKind)>
    {
        decoder::find_block_boundary(32, code, code_base, start)
    }

    fn args_cursor(&self, thread: thread_act_t) -> Result<ArgsCursor>
    {
        // Pure stack-based cdecl: no argument registers. `esp` at a
        // function's entry point is the return address itself; the first
        // argument is the first 4-byte slot above it.
        let state = get_thread_state(thread)?;
        Ok(ArgsCursor {
            register_values: smallvec![],
            stack_pointer: u64::from(state.esp),
            stack_slot_width: 4,
            index: 0,
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn find_next_branch_decodes_32_bit_encoding()
    {
        let code: &[u8] = &[0x55, 0xE8, 0x00, 0x00, 0x00, 0x00]; // push ebp; call rel32
        let backend = X86Backend;
        let (addr, kind) = backend.find_next_branch(code, 0x1000, 0x1000).unwrap();
        assert_eq!(addr, 0x1001);
        assert_eq!(kind, BranchKind::Call);
    }
}
