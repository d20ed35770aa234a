//! # RAII Guards for macOS Task Operations
//!
//! `TaskSuspendGuard` suspends a task's threads and resumes them automatically
//! on drop, so an early return or panic during attach can't leave a target
//! permanently frozen.

use libc::mach_port_t;

use crate::error::{FlowError, Result};
use crate::platform::macos::ffi;

/// Suspends a Mach task on construction, resumes it on drop (or on explicit
/// [`resume`](TaskSuspendGuard::resume)).
///
/// The Driver holds one of these across the window between `task_for_pid`
/// and the exception port being fully installed, so a failure partway
/// through attach can't leave the target stopped forever with no handler
/// watching it.
pub struct TaskSuspendGuard
{
    task: mach_port_t,
    active: bool,
}

impl TaskSuspendGuard
{
    /// Suspend `task`. The task is resumed when the guard is dropped unless
    /// [`resume`](Self::resume) is called first.
    pub fn new(task: mach_port_t) -> Result<Self>
    {
        unsafe {
            let result = ffi::task_suspend(task);
            if result != mach2::kern_return::KERN_SUCCESS {
                return Err(FlowError::KernelFailure(result.into()));
            }
        }

        Ok(Self { task, active: true })
    }

    /// Resume the task now, consuming the guard so drop is a no-op.
    pub fn resume(mut self) -> Result<()>
    {
        if self.active {
            unsafe {
                let result = ffi::task_resume(self.task);
                if result != mach2::kern_return::KERN_SUCCESS {
                    return Err(FlowError::KernelFailure(result.into()));
                }
            }
            self.active = false;
        }
        Ok(())
    }
}

impl Drop for TaskSuspendGuard
{
    fn drop(&mut self)
    {
        if self.active {
            unsafe {
                let _ = ffi::task_resume(self.task);
            }
        }
    }
}
