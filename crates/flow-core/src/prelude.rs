//! Common module for library exports

pub use crate::decoder::find_block_boundary;
pub use crate::dyld::{AllImageInfos, ImageInfo};
pub use crate::error::{FlowError, Result};
pub use crate::platform::macos::exception::{ExceptionAction, ExceptionPort, ExceptionRecord};
pub use crate::platform::macos::guards::TaskSuspendGuard;
pub use crate::platform::macos::registers::{backend_for, ArchBackend, ArgsCursor};
pub use crate::platform::macos::Target;
pub use crate::trace_log::{Record, TraceLogReader, TraceLogWriter};
pub use crate::tracer::Tracer;
pub use crate::types::{Address, Architecture, Block, BranchKind, ProcessId, ThreadId};
