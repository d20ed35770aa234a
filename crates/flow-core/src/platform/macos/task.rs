//! # Target Process Handle
//!
//! Owns the Mach task port for the attached process and everything that's
//! read through it: memory, the thread list, and the dyld image-info
//! pointer the loader-state component starts its discovery from.
//!
//! ## Mach APIs Used
//!
//! - `task_for_pid()`: obtain a task port (declared in [`ffi`])
//! - `task_threads()`: enumerate threads (from `mach2`)
//! - `task_info(TASK_DYLD_INFO)`: locate `dyld_all_image_infos`
//! - `vm_read_overwrite()`: read target memory into a caller-owned buffer

use std::convert::TryInto;
use std::ffi::CString;

use libc::{c_int, mach_msg_type_number_t, mach_port_t, thread_act_t, vm_address_t, vm_size_t};
use mach2::kern_return::KERN_SUCCESS;
use mach2::task::task_threads;
use mach2::traps::mach_task_self;

use crate::error::{FlowError, Result};
use crate::platform::macos::{constants, ffi};
use crate::types::{Architecture, ProcessId, ThreadId};

/// A maximum string length `read_string` will walk before giving up; guards
/// against an unterminated read wandering through an entire mapped region.
const MAX_STRING_LEN: usize = 4096;

/// Live handle to an attached target process.
pub struct Target
{
    task: mach_port_t,
    pid: ProcessId,
    architecture: Architecture,
}

impl Target
{
    /// Attach to `pid` via `task_for_pid`, detecting the target's
    /// architecture along the way.
    ///
    /// # Errors
    ///
    /// `KernelFailure` if `task_for_pid` fails (commonly permissions -
    /// missing `com.apple.security.cs.debugger` entitlement, or not root).
    pub fn attach(pid: ProcessId) -> Result<Self>
    {
        let task = unsafe {
            let mut task: mach_port_t = 0;
            let result = ffi::task_for_pid(mach_task_self(), pid.0 as c_int, &mut task);
            if result != KERN_SUCCESS {
                if result == libc::KERN_FAILURE && unsafe { libc::kill(pid.0 as libc::pid_t, 0) } == 0 {
                    tracing::warn!(pid = pid.0, "task_for_pid failed with KERN_FAILURE on a live process, likely missing debugger entitlement");
                }
                return Err(FlowError::KernelFailure(result.into()));
            }
            task
        };

        let architecture = detect_architecture(pid).unwrap_or_else(|err| {
            tracing::warn!(pid = pid.0, %err, "architecture detection failed, assuming host architecture");
            Architecture::current()
        });

        tracing::info!(pid = pid.0, %architecture, "attached to target");

        Ok(Self {
            task,
            pid,
            architecture,
        })
    }

    /// Launch `program` suspended via `posix_spawn` and attach to it.
    ///
    /// `cpu_type_pref` restricts which slice of a fat binary is spawned, per
    /// `posix_spawnattr_setbinpref_np` (one of [`constants::CPU_TYPE_X86_64`]
    /// / [`constants::CPU_TYPE_ARM64`]); pass `None` to let the kernel pick
    /// the host's preferred slice.
    ///
    /// The child inherits the tracer's stdio; the caller is responsible for
    /// routing its own logging elsewhere if that would be a problem.
    ///
    /// # Errors
    ///
    /// Whatever [`attach`](Self::attach) or the underlying `posix_spawn` can
    /// fail with.
    pub fn spawn_suspended(program: &str, args: &[&str], cpu_type_pref: Option<i32>) -> Result<Self>
    {
        struct NoCapture;
        impl crate::platform::macos::launch::LaunchOperations for NoCapture
        {
            fn capture_output(&self) -> bool
            {
                false
            }
            fn set_stdout_pipe(&mut self, _fd: std::os::fd::RawFd) {}
            fn set_stderr_pipe(&mut self, _fd: std::os::fd::RawFd) {}
        }

        let mut ops = NoCapture;
        let pid = crate::platform::macos::launch::LaunchManager::launch(&mut ops, program, args, cpu_type_pref)?;
        Self::attach(ProcessId(pid as u32))
    }

    /// The task port, for callers (the exception port, the architecture
    /// backend) that need the raw Mach handle.
    #[must_use]
    pub const fn task_port(&self) -> mach_port_t
    {
        self.task
    }

    /// PID this handle is attached to.
    #[must_use]
    pub const fn pid(&self) -> ProcessId
    {
        self.pid
    }

    /// Detected (or assumed) target architecture.
    #[must_use]
    pub const fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    /// Enumerate the task's current threads.
    pub fn threads(&self) -> Result<Vec<ThreadId>>
    {
        unsafe {
            let mut threads: *mut thread_act_t = std::ptr::null_mut();
            let mut count: mach_msg_type_number_t = 0;
            let result = task_threads(self.task, &mut threads, &mut count);
            if result != KERN_SUCCESS {
                return Err(FlowError::KernelFailure(result.into()));
            }

            let slice = std::slice::from_raw_parts(threads, count as usize);
            let ids = slice.iter().map(|&t| ThreadId::from(u64::from(t))).collect();

            let size = (count as usize).saturating_mul(std::mem::size_of::<thread_act_t>()) as vm_size_t;
            if !threads.is_null() && size > 0 {
                let _ = ffi::vm_deallocate(mach_task_self(), threads as vm_address_t, size);
            }

            Ok(ids)
        }
    }

    /// Read `len` bytes from `address` in the target's address space.
    ///
    /// Uses `vm_read_overwrite`, which reads directly into a caller-owned
    /// buffer (unlike `vm_read`, which allocates and requires a matching
    /// `vm_deallocate`).
    pub fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>>
    {
        let mut buffer = vec![0u8; len];
        let mut actual: vm_size_t = 0;
        let result = unsafe {
            ffi::vm_read_overwrite(
                self.task,
                address as vm_address_t,
                len as vm_size_t,
                buffer.as_mut_ptr() as vm_address_t,
                &mut actual,
            )
        };
        if result != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(result.into()));
        }
        buffer.truncate(actual as usize);
        Ok(buffer)
    }

    /// Read a NUL-terminated string starting at `address`, one byte at a
    /// time, stopping at the first NUL or after [`MAX_STRING_LEN`] bytes
    /// (whichever comes first) so an unterminated run can't read forever.
    pub fn read_string(&self, address: u64) -> Result<String>
    {
        let mut bytes = Vec::new();
        for offset in 0..MAX_STRING_LEN as u64 {
            let byte = self.read_memory(address + offset, 1)?;
            match byte.first() {
                None | Some(0) => break,
                Some(&b) => bytes.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Address of the dynamic linker's `dyld_all_image_infos` structure, via
    /// `task_info(TASK_DYLD_INFO)`.
    pub fn dyld_all_image_info_addr(&self) -> Result<u64>
    {
        #[repr(C)]
        #[derive(Default)]
        struct TaskDyldInfo
        {
            all_image_info_addr: u64,
            all_image_info_size: u64,
            all_image_info_format: c_int,
        }

        unsafe {
            let mut info = TaskDyldInfo::default();
            let mut count = constants::TASK_DYLD_INFO_COUNT;
            let result = mach2::task::task_info(
                self.task,
                constants::TASK_DYLD_INFO as u32,
                std::ptr::from_mut(&mut info).cast::<i32>(),
                &mut count,
            );
            if result != KERN_SUCCESS {
                return Err(FlowError::KernelFailure(result.into()));
            }
            Ok(info.all_image_info_addr)
        }
    }

    /// `ptrace(PT_ATTACHEXC)`: attach without installing ptrace's own
    /// `SIGTRAP`-based stop semantics, deferring entirely to the Exception
    /// Port. Must be called before the target is resumed.
    pub fn ptrace_attach_exc(&self) -> Result<()>
    {
        let result = unsafe { ffi::ptrace(ffi::PT_ATTACHEXC, self.pid.0 as libc::pid_t, std::ptr::null_mut(), 0) };
        if result != 0 {
            return Err(FlowError::IoFailure(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// `ptrace(PT_DETACH)`: release ptrace control, letting the target run
    /// freely once the Exception Port has also been detached.
    pub fn ptrace_detach(&self) -> Result<()>
    {
        let result = unsafe { ffi::ptrace(ffi::PT_DETACH, self.pid.0 as libc::pid_t, std::ptr::null_mut(), 0) };
        if result != 0 {
            return Err(FlowError::IoFailure(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Resume every thread in the task (undoes the suspension `posix_spawn`
    /// applies under `POSIX_SPAWN_START_SUSPENDED`).
    pub fn resume(&self) -> Result<()>
    {
        let result = unsafe { ffi::task_resume(self.task) };
        if result != KERN_SUCCESS {
            return Err(FlowError::KernelFailure(result.into()));
        }
        Ok(())
    }

    /// Suspend the task for the window between attach and the Exception
    /// Port being fully installed. See [`super::guards::TaskSuspendGuard`].
    pub fn suspend_guard(&self) -> Result<super::guards::TaskSuspendGuard>
    {
        super::guards::TaskSuspendGuard::new(self.task)
    }
}

/// Detect `pid`'s architecture via the `sysctl.proc_cputype` per-process
/// sysctl (the same mechanism debuggers use to avoid guessing from the host
/// architecture, which breaks under Rosetta).
fn detect_architecture(pid: ProcessId) -> Result<Architecture>
{
    let name = CString::new("sysctl.proc_cputype").expect("static string has no interior NUL");
    let mut mib = [0i32; libc::CTL_MAXNAME as usize];
    let mut mib_len: libc::size_t = mib.len();

    unsafe {
        if libc::sysctlnametomib(name.as_ptr(), mib.as_mut_ptr(), &mut mib_len) != 0 {
            return Err(FlowError::IoFailure(std::io::Error::last_os_error()));
        }
    }

    mib[mib_len] = pid.0 as i32;
    mib_len += 1;

    let mut cpu_type: i32 = 0;
    let mut cpu_type_len: libc::size_t = std::mem::size_of::<i32>();

    unsafe {
        let result = libc::sysctl(
            mib.as_mut_ptr(),
            mib_len.try_into().expect("mib length fits in u32"),
            std::ptr::from_mut(&mut cpu_type).cast(),
            &mut cpu_type_len,
            std::ptr::null_mut(),
            0,
        );
        if result != 0 {
            return Err(FlowError::IoFailure(std::io::Error::last_os_error()));
        }
    }

    Ok(match cpu_type {
        constants::CPU_TYPE_X86_64 => Architecture::X86_64,
        constants::CPU_TYPE_X86 => Architecture::X86,
        constants::CPU_TYPE_ARM64 => Architecture::Arm64,
        other => Architecture::Unknown(Box::leak(format!("cpu_type 0x{other:08x}").into_boxed_str())),
    })
}
