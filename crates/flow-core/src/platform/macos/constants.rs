//! # macOS Platform Constants
//!
//! Centralized constants for macOS Mach API operations.
//!
//! This module contains all platform-specific constants used throughout the
//! macOS debugger implementation, including thread state flavors, debug state
//! flavors, instruction sizes, and other magic numbers.
//!
//! ## Organization
//!
//! Constants are organized by category:
//! - Thread state flavors and counts
//! - Debug state flavors and counts
//! - Instruction sizes
//! - Memory operation constants
//! - Breakpoint trap instructions
//! - Register layout indices
//! - Bit masks and magic values

use libc::{c_int, mach_msg_type_number_t};

// ============================================================================
// Thread State Flavors
// ============================================================================

/// ARM64 thread state flavor (flavor 6)
///
/// Used with `thread_get_state()` and `thread_set_state()` to read/write
/// ARM64 general-purpose registers (X0-X30, SP, PC, CPSR).
///
/// See: [ARM_THREAD_STATE64](https://developer.arm.com/documentation/101407/0543/Debugging/Debug-Windows-and-Dialogs/System-and-Thread-Viewer/Thread-States)
#[cfg(target_arch = "aarch64")]
pub const ARM_THREAD_STATE64: c_int = 6;

/// ARM64 thread state count (68 u32 values)
///
/// The number of `natural_t` (u32) values required to hold ARM64 thread state.
/// Each 64-bit register is stored as two u32 values.
#[cfg(target_arch = "aarch64")]
pub const ARM_THREAD_STATE64_COUNT: mach_msg_type_number_t = 68;

/// x86-64 thread state flavor (flavor 4)
///
/// Used with `thread_get_state()` and `thread_set_state()` to read/write
/// x86-64 general-purpose registers (RAX, RBX, RCX, RDX, RSI, RDI, RBP, RSP,
/// R8-R15, RIP, RFLAGS, CS, FS, GS).
#[cfg(target_arch = "x86_64")]
pub const X86_THREAD_STATE64: c_int = 4;

/// x86-64 thread state count (42 u32 values)
///
/// The number of `natural_t` (u32) values required to hold x86-64 thread state.
#[cfg(target_arch = "x86_64")]
pub const X86_THREAD_STATE64_COUNT: mach_msg_type_number_t = 42;

/// 32-bit x86 thread state flavor (flavor 1)
///
/// Used with `thread_get_state()` and `thread_set_state()` to read/write
/// 32-bit x86 general-purpose registers (EAX-EDI, EBP, ESP, EIP, EFLAGS,
/// segment registers).
#[cfg(target_arch = "x86_64")]
pub const X86_THREAD_STATE32: c_int = 1;

/// 32-bit x86 thread state count (16 u32 values)
///
/// The number of `natural_t` (u32) values required to hold 32-bit x86 thread
/// state.
#[cfg(target_arch = "x86_64")]
pub const X86_THREAD_STATE32_COUNT: mach_msg_type_number_t = 16;

/// ARM64 NEON (floating-point) state flavor (flavor 17)
///
/// Used to read/write ARM64 NEON/SIMD registers (V0-V31) and floating-point
/// status registers (FPSR, FPCR).
#[cfg(target_arch = "aarch64")]
pub const ARM_NEON_STATE64: c_int = 17;

/// ARM64 NEON state count (520 bytes / 4 = 130 u32 values)
///
/// The number of `natural_t` (u32) values required to hold ARM64 NEON state.
#[cfg(target_arch = "aarch64")]
pub const ARM_NEON_STATE64_COUNT: mach_msg_type_number_t = 130;

/// x86-64 floating-point state flavor (flavor 5)
///
/// Used to read/write x86-64 floating-point registers (XMM0-XMM15, MXCSR).
#[cfg(target_arch = "x86_64")]
pub const X86_FLOAT_STATE64: c_int = 5;

/// x86-64 floating-point state count (512 bytes / 4 = 128 u32 values)
///
/// The number of `natural_t` (u32) values required to hold x86-64 floating-point state.
#[cfg(target_arch = "x86_64")]
pub const X86_FLOAT_STATE64_COUNT: mach_msg_type_number_t = 128;

// ============================================================================
// Debug State Flavors
// ============================================================================

/// x86-64 debug state flavor (flavor 11)
///
/// Used with `thread_get_state()` and `thread_set_state()` to read/write
/// x86-64 debug registers (DR0-DR7) for hardware breakpoints.
#[cfg(target_arch = "x86_64")]
pub const X86_DEBUG_STATE64: c_int = 11;

/// x86-64 debug state count (64 bytes / 4 = 16 u32 values)
///
/// The number of `natural_t` (u32) values required to hold x86-64 debug state.
#[cfg(target_arch = "x86_64")]
pub const X86_DEBUG_STATE64_COUNT: mach_msg_type_number_t = 16;

/// 32-bit x86 debug state flavor (flavor 10)
///
/// Used with `thread_get_state()` and `thread_set_state()` to read/write
/// 32-bit x86 debug registers (DR0-DR7) for hardware breakpoints.
#[cfg(target_arch = "x86_64")]
pub const X86_DEBUG_STATE32: c_int = 10;

/// 32-bit x86 debug state count (32 bytes / 4 = 8 u32 values)
///
/// The number of `natural_t` (u32) values required to hold 32-bit x86 debug
/// state (DR0-DR7, each a 32-bit register on this flavor).
#[cfg(target_arch = "x86_64")]
pub const X86_DEBUG_STATE32_COUNT: mach_msg_type_number_t = 8;

/// ARM64 debug state flavor (flavor 15)
///
/// Used with `thread_get_state()` and `thread_set_state()` to read/write
/// ARM64 debug registers (DBGBVR/DBGBCR for breakpoints, DBGWVR/DBGWCR for watchpoints).
#[cfg(target_arch = "aarch64")]
pub const ARM_DEBUG_STATE64: c_int = 15;

/// ARM64 debug state count (520 bytes / 4 = 130 u32 values)
///
/// The number of `natural_t` (u32) values required to hold ARM64 debug state.
#[cfg(target_arch = "aarch64")]
pub const ARM_DEBUG_STATE64_COUNT: mach_msg_type_number_t = 130;

// ============================================================================
// Instruction Sizes
// ============================================================================

/// ARM64 instruction size in bytes
///
/// ARM64 uses fixed-length 32-bit (4-byte) instructions.
#[cfg(target_arch = "aarch64")]
pub const ARM64_INSTRUCTION_SIZE: u64 = 4;

/// x86-64 instruction size in bytes
///
/// x86-64 uses variable-length instructions, but for breakpoint rewinding
/// we use 1 byte (the size of INT3).
#[cfg(target_arch = "x86_64")]
pub const X86_64_INSTRUCTION_SIZE: u64 = 1;

// ============================================================================
// Memory Operation Constants
// ============================================================================

/// Maximum chunk size for `vm_read()` operations (64 KB)
///
/// macOS `vm_read()` has limitations on how much memory can be read in a
/// single call. We chunk larger reads into 64 KB pieces.
pub const MAX_VM_READ_CHUNK: usize = 64 * 1024;

/// Chunk size for pattern scanning operations (64 KB)
///
/// When searching for byte patterns in memory, we process memory in
/// 64 KB chunks to avoid excessive memory allocation.
pub const PATTERN_SCAN_CHUNK: usize = 64 * 1024;

// ============================================================================
// Breakpoint Trap Instructions
// ============================================================================

/// ARM64 breakpoint instruction (`BRK #0`)
///
/// This is the 4-byte instruction sequence used for software breakpoints on ARM64.
/// The instruction is: `BRK #0` encoded as `0x00, 0x00, 0x20, 0xD4`.
#[cfg(target_arch = "aarch64")]
pub const ARM64_BRK_INSTRUCTION: &[u8] = &[0x00, 0x00, 0x20, 0xD4];

/// x86-64 breakpoint instruction (`INT3`)
///
/// This is the 1-byte instruction used for software breakpoints on x86-64.
/// The instruction is: `INT3` encoded as `0xCC`.
#[cfg(target_arch = "x86_64")]
pub const X86_64_INT3_INSTRUCTION: &[u8] = &[0xCC];

// ============================================================================
// ARM64 Breakpoint Control Register Values
// ============================================================================

/// ARM64 breakpoint control register value for user-mode execution breakpoint
///
/// This value configures a hardware breakpoint to:
/// - Enable the breakpoint (bit 0 = 1)
/// - Match in user mode (PMC = 10, bits 1-2)
/// - Match all bytes (BAS = 1111, bits 5-8)
///
/// Value: `0x1E5`
///
/// Bit breakdown:
/// - Bit 0 (E): 1 (enabled)
/// - Bits 1-2 (PMC): 10 (user mode)
/// - Bits 5-8 (BAS): 1111 (match all bytes)
#[cfg(target_arch = "aarch64")]
pub const ARM64_BP_CTRL_USER_EXEC: u64 = 0x1E5;

// ============================================================================
// Bit Masks
// ============================================================================

/// Mask for extracting the lower 32 bits of a u64
///
/// Used when splitting 64-bit values into two 32-bit values for Mach APIs.
pub const U32_MASK: u64 = 0xFFFF_FFFF;

// ============================================================================
// ARM64 Register Layout Indices
// ============================================================================

/// ARM64 register array index for X0 (first general-purpose register)
///
/// In the ARM64 thread state array, general-purpose registers X0-X30 are
/// stored at indices 0-30 (each register takes 2 u32 values).
#[cfg(target_arch = "aarch64")]
pub const ARM64_X0_INDEX: usize = 0;

/// ARM64 register array index for FP (Frame Pointer, X29)
///
/// The frame pointer is stored at index 29 in the ARM64 thread state array.
#[cfg(target_arch = "aarch64")]
pub const ARM64_FP_INDEX: usize = 29;

/// ARM64 register array index for LR (Link Register, X30)
///
/// The link register (return address) is stored at index 30 in the ARM64 thread state array.
#[cfg(target_arch = "aarch64")]
pub const ARM64_LR_INDEX: usize = 30;

/// ARM64 register array index for SP (Stack Pointer)
///
/// The stack pointer is stored at index 31 in the ARM64 thread state array.
#[cfg(target_arch = "aarch64")]
pub const ARM64_SP_INDEX: usize = 31;

/// ARM64 register array index for PC (Program Counter)
///
/// The program counter is stored at index 32 in the ARM64 thread state array.
/// It occupies two u32 values (indices 64-65 in the raw state_words array).
#[cfg(target_arch = "aarch64")]
pub const ARM64_PC_INDEX: usize = 32;

/// ARM64 register array index for PC low 32 bits (in state_words array)
///
/// The PC is stored as two u32 values. This is the index of the low 32 bits.
#[cfg(target_arch = "aarch64")]
pub const ARM64_PC_INDEX_LOW: usize = 64;

/// ARM64 register array index for PC high 32 bits (in state_words array)
///
/// The PC is stored as two u32 values. This is the index of the high 32 bits.
#[cfg(target_arch = "aarch64")]
pub const ARM64_PC_INDEX_HIGH: usize = 65;

/// ARM64 register array index for CPSR (Current Program Status Register)
///
/// The CPSR is stored at index 66 in the ARM64 thread state array (state_words).
/// It's a single u32 value (the second u32 at index 67 is padding).
#[cfg(target_arch = "aarch64")]
pub const ARM64_CPSR_INDEX: usize = 66;

// ============================================================================
// x86-64 RFLAGS Trace Bit
// ============================================================================

/// RFLAGS trace flag (TF, bit 8)
///
/// Setting this bit causes the CPU to raise a single-step trap after every
/// instruction. This is one of the tracer's two actuators (the other being
/// the single hardware breakpoint below); the two are never armed at once.
#[cfg(target_arch = "x86_64")]
pub const X86_TRACE_FLAG: u64 = 0x100;

// ============================================================================
// Exception Port Registration
// ============================================================================

/// `EXCEPTION_STATE_IDENTITY` behavior: the kernel suspends the thread and
/// hands back both its old and new state alongside the exception.
pub const EXCEPTION_STATE_IDENTITY: c_int = 3;

/// Modifier OR'd into the behavior to request 64-bit exception codes.
pub const MACH_EXCEPTION_CODES: c_int = 0x8000_0000_u32 as c_int;

/// Thread state flavor used when registering the exception port: the
/// kernel's own idea of "whatever `MACHINE_THREAD_STATE` is for this arch",
/// which resolves to `X86_THREAD_STATE64`/`ARM_THREAD_STATE64` as appropriate.
pub const MACHINE_THREAD_STATE: c_int = 1;

/// Mask selecting software exceptions (breakpoint traps, single-step traps,
/// and signals delivered via `EXC_SOFTWARE`) for `task_set_exception_ports`.
pub const EXC_MASK_SOFTWARE: u32 = 1 << 5;

/// Mask selecting hardware breakpoint exceptions.
pub const EXC_MASK_BREAKPOINT: u32 = 1 << 6;

/// `EXC_SOFTWARE` exception type, delivered for single-step traps and
/// unhandled thread-level software events.
pub const EXC_SOFTWARE: c_int = 5;

/// `EXC_BREAKPOINT` exception type, delivered for the hardware breakpoint
/// and for any `int3`/`brk` the target executes on its own.
pub const EXC_BREAKPOINT: c_int = 6;

/// Sub-code carried by `EXC_SOFTWARE` when it represents a forwarded Unix
/// signal rather than a trace trap; `code[1]` holds the signal number.
pub const EXC_SOFT_SIGNAL: i64 = 0x10003;

/// `NULL` exception port sentinel, used when restoring a task's prior
/// handler for a mask that previously had none registered.
pub const MACH_PORT_NULL: libc::mach_port_t = 0;

// ============================================================================
// CPU Type (for per-process architecture detection via sysctl)
// ============================================================================

/// `cpu_type_t` value for a 64-bit x86 process.
pub const CPU_TYPE_X86_64: i32 = 0x0100_0007;
/// `cpu_type_t` value for a 32-bit x86 process.
pub const CPU_TYPE_X86: i32 = 0x0000_0007;
/// `cpu_type_t` value for a 64-bit ARM process.
pub const CPU_TYPE_ARM64: i32 = 0x0100_000C;

// ============================================================================
// task_info: dyld state
// ============================================================================

/// `task_info` flavor that returns a `task_dyld_info_data_t`, pointing at the
/// dynamic linker's `dyld_all_image_infos` structure in the target's address
/// space.
pub const TASK_DYLD_INFO: c_int = 17;

/// Word count of `task_dyld_info_data_t` (three fields: address, size, format).
pub const TASK_DYLD_INFO_COUNT: mach_msg_type_number_t = 6;

// ============================================================================
// mach_msg return codes
// ============================================================================

/// `mach_msg` returned because the receive right died while a receive was
/// blocked on it (the exception port was deallocated out from under the
/// pump, e.g. during detach).
pub const MACH_RCV_PORT_DIED: c_int = 0x1000_4008_u32 as c_int;

/// `mach_msg` returned because the port name was no longer valid.
pub const MACH_RCV_INVALID_NAME: c_int = 0x1000_400F_u32 as c_int;

/// `mach_msg` returned because a Unix signal interrupted the blocking
/// receive. The exception-pump thread is cancelled by sending it a signal
/// after the main thread's `waitpid` loop observes the target has stopped,
/// so this is the expected way the pump unwinds.
pub const MACH_RCV_INTERRUPTED: c_int = 0x1000_4005_u32 as c_int;
