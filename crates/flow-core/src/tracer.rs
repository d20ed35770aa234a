//! # Tracer Core
//!
//! The state machine that turns raw exceptions into trace-log records: it
//! discovers the dynamic loader's notifier, intercepts every call to it to
//! log library loads, and alternates single-step/hardware-breakpoint to
//! walk the target one basic block at a time.
//!
//! This module owns no kernel resources directly — it drives a [`Target`]
//! and an [`ArchBackend`] that do. The [`super::platform::macos::exception`]
//! pump calls into [`Tracer::on_exception`] for every exception it receives;
//! this module decides what that exception means and what to do next.

use std::io::Write;
use std::time::Instant;

use libc::thread_act_t;

use crate::dyld;
use crate::error::{FlowError, Result};
use crate::platform::macos::registers::{backend_for, ArchBackend};
use crate::platform::macos::task::Target;
use crate::trace_log::TraceLogWriter;

/// Bytes read from the target per `find_next_branch` call. Large enough to
/// cover any realistic basic block without needing a second read.
const DECODE_WINDOW: usize = 4096;

/// Per-target tracing state.
pub struct Tracer<W>
{
    target: Target,
    backend: Box<dyn ArchBackend + Send>,
    log: TraceLogWriter<W>,
    loader_notify_addr: Option<u64>,
    loader_logged: bool,
    started_at: Instant,
}

impl<W: Write> Tracer<W>
{
    /// Build a tracer around an attached `target`, selecting its
    /// architecture backend and writing the trace log's header.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the target's architecture has no backend
    /// (currently: anything but x86-64 and 32-bit x86).
    pub fn new(target: Target, writer: W) -> Result<Self>
    {
        let backend = backend_for(target.architecture()).ok_or_else(|| {
            FlowError::InvalidArgument(format!("no architecture backend for {}", target.architecture()))
        })?;

        let cpu_type = match target.architecture() {
            crate::types::Architecture::X86_64 => crate::platform::macos::constants::CPU_TYPE_X86_64,
            crate::types::Architecture::X86 => crate::platform::macos::constants::CPU_TYPE_X86,
            crate::types::Architecture::Arm64 => crate::platform::macos::constants::CPU_TYPE_ARM64,
            crate::types::Architecture::Unknown(_) => 0,
        };

        let log = TraceLogWriter::new(writer, cpu_type as u32)?;

        Ok(Self {
            target,
            backend,
            log,
            loader_notify_addr: None,
            loader_logged: false,
            started_at: Instant::now(),
        })
    }

    /// Elapsed time since this tracer started, for diagnostics.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration
    {
        self.started_at.elapsed()
    }

    /// Release ptrace control of the target, once the exception port has
    /// also been torn down.
    pub fn ptrace_detach(&self) -> Result<()>
    {
        self.target.ptrace_detach()
    }

    /// Process one delivered exception on `thread`. Called from inside the
    /// Exception Port's pump; any `Err` here should make the caller abort
    /// the target.
    pub fn on_exception(&mut self, thread: thread_act_t) -> Result<()>
    {
        self.discover_loader()?;

        let pc = self.backend.read_pc(thread)?;
        if self.loader_notify_addr == Some(pc) {
            self.intercept_loader_callback(thread)?;
        }

        self.step(thread)
    }

    /// While the loader's notifier address is unknown, read
    /// `dyld_all_image_infos` each exception. Logs dyld's own load address
    /// the first time it's non-zero.
    fn discover_loader(&mut self) -> Result<()>
    {
        if self.loader_notify_addr.is_some() {
            return Ok(());
        }

        let word_size = self.target.architecture().word_size();
        let address = self.target.dyld_all_image_info_addr()?;
        let info = dyld::read_all_image_infos(&self.target, address, word_size)?;

        if info.notification != 0 {
            self.loader_notify_addr = Some(info.notification);
            tracing::debug!(notifier = format!("0x{:016x}", info.notification), "loader notifier discovered");
        }

        if info.dyld_load_address != 0 && !self.loader_logged {
            self.log.write_dyld_load_address(info.dyld_load_address)?;
            self.loader_logged = true;
        }

        Ok(())
    }

    /// The target has just entered dyld's image-state-change notifier.
    /// Extract its `(mode, infoCount, info)` arguments and log every image
    /// in the batch.
    fn intercept_loader_callback(&mut self, thread: thread_act_t) -> Result<()>
    {
        let word_size = self.target.architecture().word_size();
        let mut args = self.backend.args_cursor(thread)?;

        let mode = args.next(&self.target)?;
        let info_count = (args.next(&self.target)? & 0xFFFF_FFFF) as u32;
        let info_base = args.next(&self.target)?;

        let mut images = Vec::with_capacity(info_count as usize);
        for index in 0..info_count {
            let entry = dyld::read_image_info(&self.target, info_base, index, word_size)?;
            images.push((entry.load_address, entry.path));
        }

        self.log.write_library_notification(mode, &images)?;
        Ok(())
    }

    /// The two-state stepping machine: single-step lands at a block's first
    /// instruction and arms the breakpoint at its end; the breakpoint firing
    /// re-arms single-step for the next block.
    fn step(&mut self, thread: thread_act_t) -> Result<()>
    {
        if self.backend.single_step_enabled(thread)? {
            let pc = self.backend.read_pc(thread)?;
            let window = self.target.read_memory(pc, DECODE_WINDOW)?;
            let (branch, kind) = self.backend.find_next_branch(&window, pc, pc)?;

            self.backend.set_single_step(thread, false)?;
            self.backend.set_breakpoint(thread, branch)?;
            self.log.write_block(pc, branch, kind)?;
        } else {
            self.backend.set_single_step(thread, true)?;
            self.backend.clear_breakpoint(thread)?;
        }

        Ok(())
    }
}
