//! # Exception Port
//!
//! Owns the kernel exception port the target's Mach exceptions land on:
//! single-step traps and the hardware breakpoint both arrive here as
//! `EXC_BREAKPOINT`, and forwarded Unix signals arrive as `EXC_SOFTWARE`.
//!
//! Only the `EXCEPTION_STATE_IDENTITY | MACH_EXCEPTION_CODES` behavior is
//! installed, so this module is the only place in the crate that parses or
//! builds the state-identity exception message shape (see the hand-rolled
//! request/reply structs in [`super::ffi`]).
//!
//! ## References
//!
//! - [task_set_exception_ports(3) man page](https://developer.apple.com/documentation/kernel/1810063-task_set_exception_ports/)
//! - [mach_msg(3) man page](https://developer.apple.com/documentation/kernel/1402149-mach_msg/)

use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, Ordering};

use libc::{c_int, mach_msg_type_number_t, mach_port_t, thread_act_t};
use mach2::exception_types::exception_type_t;
use mach2::kern_return::KERN_SUCCESS;
use mach2::message::{
    mach_msg, mach_msg_header_t, mach_msg_size_t, MACH_MSGH_BITS, MACH_MSG_SUCCESS, MACH_MSG_TIMEOUT_NONE,
    MACH_MSG_TYPE_MOVE_SEND_ONCE, MACH_RCV_LARGE, MACH_RCV_MSG, MACH_SEND_MSG,
};
use mach2::traps::mach_task_self;

use crate::error::{FlowError, Result};
use crate::platform::macos::{constants, ffi};

/// Enforces the "exactly one Exception Port per process" invariant;
/// multi-target operation is out of scope.
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// The union of exception types this tracer cares about: breakpoint traps
/// (single-step and the hardware breakpoint both surface as this) and
/// software exceptions (forwarded Unix signals).
const EXCEPTION_MASK: u32 = constants::EXC_MASK_SOFTWARE | constants::EXC_MASK_BREAKPOINT;

/// A prior exception-port registration, saved at attach time so detach can
/// put it back exactly as found.
#[derive(Clone, Copy)]
struct SavedPort
{
    mask: u32,
    port: mach_port_t,
    behavior: c_int,
    flavor: c_int,
}

/// Everything the state-identity callback needs about one delivered
/// exception. Deliberately `Copy`: the callback only reads it plus whatever
/// live thread state it fetches itself through an [`super::registers::ArchBackend`].
#[derive(Debug, Clone, Copy)]
pub struct ExceptionRecord
{
    pub task: mach_port_t,
    pub thread: thread_act_t,
    pub exception: exception_type_t,
    pub codes: [i64; 2],
    pub flavor: c_int,
}

impl ExceptionRecord
{
    /// True if this exception is a forwarded Unix signal rather than a
    /// trace trap, per the `EXC_SOFTWARE`/`EXC_SOFT_SIGNAL` wire convention.
    #[must_use]
    pub fn forwarded_signal(&self) -> Option<c_int>
    {
        if self.exception == constants::EXC_SOFTWARE && self.codes[0] == constants::EXC_SOFT_SIGNAL {
            Some(self.codes[1] as c_int)
        } else {
            None
        }
    }
}

/// What the callback wants done with the exception it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionAction
{
    /// Let the target resume.
    Resume,
    /// Kill the target and stop the pump.
    Abort,
}

/// Owns the exception port installed on one attached task.
pub struct ExceptionPort
{
    port: mach_port_t,
    task: mach_port_t,
    saved: Vec<SavedPort>,
}

impl ExceptionPort
{
    /// Install an exception port on `task`, saving its prior handler(s) for
    /// [`Self::detach`].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if an `ExceptionPort` is already active in this
    /// process. `KernelFailure` if any of the port-allocate, port-insert,
    /// get-ports, or set-ports calls fail; partial state from an earlier
    /// step in this sequence is rolled back before returning.
    pub fn attach(task: mach_port_t) -> Result<Self>
    {
        if ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(FlowError::InvalidArgument(
                "an exception port is already attached in this process".to_string(),
            ));
        }

        Self::attach_inner(task).inspect_err(|_| {
            ACTIVE.store(false, Ordering::SeqCst);
        })
    }

    fn attach_inner(task: mach_port_t) -> Result<Self>
    {
        let port = unsafe {
            let mut port: mach_port_t = 0;
            let kr = ffi::mach_port_allocate(mach_task_self(), ffi::MACH_PORT_RIGHT_RECEIVE, &mut port);
            if kr != KERN_SUCCESS {
                return Err(FlowError::KernelFailure(kr.into()));
            }

            let kr = ffi::mach_port_insert_right(mach_task_self(), port, port, ffi::MACH_MSG_TYPE_MAKE_SEND);
            if kr != KERN_SUCCESS {
                let _ = ffi::mach_port_deallocate(mach_task_self(), port);
                return Err(FlowError::KernelFailure(kr.into()));
            }
            port
        };

        let saved = match Self::save_existing_ports(task) {
            Ok(saved) => saved,
            Err(err) => {
                unsafe {
                    let _ = ffi::mach_port_deallocate(mach_task_self(), port);
                }
                return Err(err);
            }
        };

        let kr = unsafe {
            ffi::task_set_exception_ports(
                task,
                EXCEPTION_MASK,
                port,
                constants::EXCEPTION_STATE_IDENTITY | constants::MACH_EXCEPTION_CODES,
                constants::MACHINE_THREAD_STATE,
            )
        };
        if kr != KERN_SUCCESS {
            unsafe {
                let _ = ffi::mach_port_deallocate(mach_task_self(), port);
            }
            return Err(FlowError::KernelFailure(kr.into()));
        }

        tracing::info!(task, port, "exception port installed");

        Ok(Self { port, task, saved })
    }

    fn save_existing_ports(task: mach_port_t) -> Result<Vec<SavedPort>>
    {
        unsafe {
            let mut masks = [0u32; ffi::EXC_TYPES_COUNT];
            let mut ports = [constants::MACH_PORT_NULL; ffi::EXC_TYPES_COUNT];
            let mut behaviors = [0 as c_int; ffi::EXC_TYPES_COUNT];
            let mut flavors = [0 as c_int; ffi::EXC_TYPES_COUNT];
            let mut count = ffi::EXC_TYPES_COUNT as mach_msg_type_number_t;

            let kr = ffi::task_get_exception_ports(
                task,
                EXCEPTION_MASK,
                masks.as_mut_ptr(),
                &mut count,
                ports.as_mut_ptr(),
                behaviors.as_mut_ptr(),
                flavors.as_mut_ptr(),
            );
            if kr != KERN_SUCCESS {
                return Err(FlowError::KernelFailure(kr.into()));
            }

            Ok((0..count as usize)
                .map(|i| SavedPort {
                    mask: masks[i],
                    port: ports[i],
                    behavior: behaviors[i],
                    flavor: flavors[i],
                })
                .collect())
        }
    }

    /// Block receiving and dispatching exceptions, one at a time, until
    /// `on_exception` returns [`ExceptionAction::Abort`] or the receive
    /// fails terminally (port torn down, or the pump thread was signalled
    /// for cancellation).
    ///
    /// On `Abort`, kills the target via `ptrace(PT_KILL)` before returning.
    pub fn pump(&self, mut on_exception: impl FnMut(&ExceptionRecord) -> ExceptionAction) -> Result<()>
    {
        loop {
            let mut request = MaybeUninit::<ffi::ExceptionRaiseStateIdentityRequest>::zeroed();
            let recv_size = std::mem::size_of::<ffi::ExceptionRaiseStateIdentityRequest>() as mach_msg_size_t;

            let kr = unsafe {
                mach_msg(
                    request.as_mut_ptr().cast::<mach_msg_header_t>(),
                    MACH_RCV_MSG | MACH_RCV_LARGE,
                    0,
                    recv_size,
                    self.port,
                    MACH_MSG_TIMEOUT_NONE,
                    constants::MACH_PORT_NULL,
                )
            };

            if kr != MACH_MSG_SUCCESS as i32 {
                if kr == constants::MACH_RCV_PORT_DIED
                    || kr == constants::MACH_RCV_INVALID_NAME
                    || kr == constants::MACH_RCV_INTERRUPTED
                {
                    tracing::debug!(kr, "exception pump stopping");
                    return Ok(());
                }
                tracing::warn!(kr, "mach_msg receive failed, retrying");
                continue;
            }

            let message = unsafe { request.assume_init() };
            if message.task != self.task {
                tracing::warn!(task = message.task, expected = self.task, "exception for unexpected task, ignoring");
                continue;
            }

            let record = ExceptionRecord {
                task: message.task,
                thread: message.thread as thread_act_t,
                exception: message.exception,
                codes: message.code,
                flavor: message.flavor,
            };

            match on_exception(&record) {
                ExceptionAction::Resume => {
                    if let Some(signal) = record.forwarded_signal() {
                        self.forward_signal(signal);
                    }
                    if let Err(err) = self.reply(&message) {
                        tracing::error!(%err, "failed to send exception reply");
                        return Err(err);
                    }
                }
                ExceptionAction::Abort => {
                    self.kill_target();
                    return Ok(());
                }
            }
        }
    }

    fn forward_signal(&self, signal: c_int)
    {
        let pid = unsafe {
            let mut pid: c_int = 0;
            let kr = ffi::pid_for_task(self.task, &mut pid);
            if kr != KERN_SUCCESS {
                tracing::error!(kr, "pid_for_task failed, cannot forward signal");
                return;
            }
            pid
        };

        let result = unsafe { ffi::ptrace(ffi::PT_THUPDATE, pid, std::ptr::null_mut(), signal) };
        if result != 0 {
            tracing::error!(signal, "ptrace(PT_THUPDATE) failed");
        }
    }

    fn kill_target(&self)
    {
        unsafe {
            let mut pid: c_int = 0;
            if ffi::pid_for_task(self.task, &mut pid) == KERN_SUCCESS {
                let _ = ffi::ptrace(ffi::PT_KILL, pid, std::ptr::null_mut(), 0);
            }
        }
    }

    /// Under `EXCEPTION_STATE_IDENTITY`, the kernel resumes the thread with
    /// whatever this reply's `new_state` contains — not with the thread's
    /// live register state. The callback patches the trace flag (or other
    /// flavor-carried bits) via its own `thread_get_state`/`thread_set_state`
    /// calls on the suspended thread, so `new_state` has to be re-read here,
    /// after the callback ran, or that patch is silently discarded and the
    /// thread resumes with the exception-time `old_state` instead. Debug
    /// registers (DR0/DR7) aren't part of this flavor and are unaffected.
    fn reply(&self, request: &ffi::ExceptionRaiseStateIdentityRequest) -> Result<()>
    {
        let mut new_state = request.old_state;
        let mut new_state_count = request.old_state_count;

        let kr = unsafe {
            ffi::thread_get_state(
                request.thread as thread_act_t,
                request.flavor,
                new_state.as_mut_ptr(),
                &mut new_state_count,
            )
        };
        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }

        let mut reply = ffi::ExceptionRaiseStateIdentityReply {
            header: mach2::message::mach_msg_header_t {
                msgh_bits: MACH_MSGH_BITS(MACH_MSG_TYPE_MOVE_SEND_ONCE, 0),
                msgh_size: std::mem::size_of::<ffi::ExceptionRaiseStateIdentityReply>() as mach_msg_size_t,
                msgh_remote_port: request.header.msgh_local_port,
                msgh_local_port: constants::MACH_PORT_NULL,
                msgh_voucher_port: constants::MACH_PORT_NULL,
                msgh_id: request.header.msgh_id + 100,
            },
            ndr: ffi::NDR_RECORD,
            ret_code: KERN_SUCCESS,
            flavor: request.flavor,
            new_state_count,
            new_state,
        };

        let kr = unsafe {
            mach_msg(
                &mut reply.header,
                MACH_SEND_MSG,
                reply.header.msgh_size,
                0,
                constants::MACH_PORT_NULL,
                MACH_MSG_TIMEOUT_NONE,
                constants::MACH_PORT_NULL,
            )
        };

        if kr != MACH_MSG_SUCCESS as i32 {
            return Err(FlowError::KernelFailure(kr.into()));
        }
        Ok(())
    }

    /// Restore every saved prior exception-port registration and release
    /// this port.
    pub fn detach(self) -> Result<()>
    {
        for saved in &self.saved {
            let kr = unsafe {
                ffi::task_set_exception_ports(self.task, saved.mask, saved.port, saved.behavior, saved.flavor)
            };
            if kr != KERN_SUCCESS {
                tracing::error!(kr, mask = saved.mask, "failed to restore prior exception port");
            }
        }

        let kr = unsafe { ffi::mach_port_deallocate(mach_task_self(), self.port) };
        ACTIVE.store(false, Ordering::SeqCst);
        std::mem::forget(self);

        if kr != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(kr.into()));
        }
        Ok(())
    }
}

impl Drop for ExceptionPort
{
    fn drop(&mut self)
    {
        tracing::warn!("ExceptionPort dropped without detach(); prior exception ports were not restored");
        ACTIVE.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn forwarded_signal_recognizes_exc_software_marker()
    {
        let record = ExceptionRecord {
            task: 1,
            thread: 2,
            exception: constants::EXC_SOFTWARE,
            codes: [constants::EXC_SOFT_SIGNAL, libc::SIGTRAP as i64],
            flavor: constants::MACHINE_THREAD_STATE,
        };
        assert_eq!(record.forwarded_signal(), Some(libc::SIGTRAP));
    }

    #[test]
    fn forwarded_signal_is_none_for_breakpoint_exceptions()
    {
        let record = ExceptionRecord {
            task: 1,
            thread: 2,
            exception: constants::EXC_BREAKPOINT,
            codes: [0, 0],
            flavor: constants::MACHINE_THREAD_STATE,
        };
        assert_eq!(record.forwarded_signal(), None);
    }

    #[test]
    fn attach_rejects_a_concurrent_second_attach()
    {
        ACTIVE.store(true, Ordering::SeqCst);
        let result = ExceptionPort::attach(unsafe { mach_task_self() });
        ACTIVE.store(false, Ordering::SeqCst);
        assert!(matches!(result, Err(FlowError::InvalidArgument(_))));
    }
}
