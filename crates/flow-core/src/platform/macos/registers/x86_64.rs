//! # x86-64 Architecture Backend
//!
//! Implements [`ArchBackend`] for x86-64 targets: `X86_THREAD_STATE64`
//! (flavor 4) for general-purpose registers and the program counter,
//! the RFLAGS trace flag for single-step, DR0 (via [`debug`]) for the
//! hardware breakpoint, `iced-x86` for basic-block boundary decoding, and
//! the System-V AMD64 calling convention for argument extraction.

use libc::{natural_t, thread_act_t};
use mach2::kern_return::KERN_SUCCESS;
use smallvec::smallvec;

use super::{ArchBackend, ArgsCursor, debug};
use crate::decoder;
use crate::error::{FlowError, Result};
use crate::platform::macos::{constants, ffi};
use crate::types::BranchKind;

/// Mirrors the kernel's `x86_thread_state64_t` (osfmk/mach/i386/_structs.h):
/// 21 64-bit fields, 168 bytes, matching `X86_THREAD_STATE64_COUNT` (42
/// `natural_t` words).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct X86ThreadState64
{
    rax: u64,
    rbx: u64,
    rcx: u64,
    rdx: u64,
    rdi: u64,
    rsi: u64,
    rbp: u64,
    rsp: u64,
    r8: u64,
    r9: u64,
    r10: u64,
    r11: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rip: u64,
    rflags: u64,
    cs: u64,
    fs: u64,
    gs: u64,
}

fn get_thread_state(thread: thread_act_t) -> Result<X86ThreadState64>
{
    unsafe {
        let mut state = X86ThreadState64::default();
        let mut count = constants::X86_THREAD_STATE64_COUNT;
        let kr = ffi::thread_get_state(
            thread,
            constants::X86_THREAD_STATE64,
            std::ptr::from_mut(&mut state).cast::<natural_t>(),
            &mut count,
        );
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
        Ok(state)
    }
}

fn set_thread_state(thread: thread_act_t, state: &X86ThreadState64) -> Result<()>
{
    unsafe {
        let kr = ffi::thread_set_state(
            thread,
            constants::X86_THREAD_STATE64,
            std::ptr::from_ref(state).cast::<natural_t>(),
            constants::X86_THREAD_STATE64_COUNT,
        );
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
    }
    Ok(())
}

/// x86-64 `ArchBackend`.
pub struct X86_64Backend;

impl ArchBackend for X86_64Backend
{
    fn read_pc(&self, thread: thread_act_t) -> Result<u64>
    {
        Ok(get_thread_state(thread)?.rip)
    }

    fn set_single_step(&self, thread: thread_act_t, enabled: bool) -> Result<()>
    {
        let mut state = get_thread_state(thread)?;
        if enabled {
            state.rflags |= constants::X86_TRACE_FLAG;
        } else {
            state.rflags &= !constants::X86_TRACE_FLAG;
        }
        set_thread_state(thread, &state)
    }

    fn single_step_enabled(&self, thread: thread_act_t) -> Result<bool>
    {
        Ok(get_thread_state(thread)?.rflags & constants::X86_TRACE_FLAG != 0)
    }

    fn set_breakpoint(&self, thread: thread_act_t, address: u64) -> Result<()>
    {
        debug::set_hardware_breakpoint(thread, address)
    }

    fn clear_breakpoint(&self, thread: thread_act_t) -> Result<()>
    {
        debug::clear_hardware_breakpoint(thread)
    }

    fn find_next_branch(&self, code: &[u8], code_base: u64, start: u64) -> Result<(u64, BranchKind)>
    {
        decoder::find_block_boundary(64, code, code_base, start)
    }

    fn args_cursor(&self, thread: thread_act_t) -> Result<ArgsCursor>
    {
        let state = get_thread_state(thread)?;
        Ok(ArgsCursor {
            register_values: smallvec![state.rdi, state.rsi, state.rdx, state.rcx, state.r8, state.r9],
            stack_pointer: state.rsp,
            stack_slot_width: 8,
            index: 0,
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn find_next_branch_delegates_to_the_decoder_module()
    {
        let code: &[u8] = &[0x55, 0xE8, 0x00, 0x00, 0x00, 0x00]; // push rbp; call rel32
        let backend = X86_64Backend;
        let (addr, kind) = backend.find_next_branch(code, 0x1000, 0x1000).unwrap();
        assert_eq!(addr, 0x1001);
        assert_eq!(kind, BranchKind::Call);
    }
}
