//! Process, thread, and architecture types.

use std::fmt;

/// Process identifier (PID)
///
/// Using a newtype instead of a raw `u32` keeps a PID from being passed
/// where some other integer was expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier.
///
/// Stored as a `u64` so it can hold a Mach thread port (`thread_act_t`,
/// effectively a `u32`) without committing the platform-agnostic type to a
/// narrower width than some future platform's native thread handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Raw platform thread handle.
    #[must_use]
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

/// CPU architecture of the debug target.
///
/// Everything but `Arm64` (contract specified, not implemented) and
/// `Unknown` (rejected with `InvalidArgument` before a trace begins) has a
/// fully-implemented backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture
{
    /// 64-bit x86 (Intel/AMD).
    X86_64,
    /// 32-bit x86. Pure stack-based (cdecl) argument passing, no register
    /// arguments.
    X86,
    /// 64-bit ARM (Apple Silicon). Backend contract specified, not implemented.
    Arm64,
    /// Any other architecture, carrying its `uname`/`sysctl` name.
    Unknown(&'static str),
}

impl Architecture
{
    /// Architecture of the host running this binary.
    #[must_use]
    pub const fn current() -> Self
    {
        #[cfg(target_arch = "aarch64")]
        {
            Architecture::Arm64
        }

        #[cfg(target_arch = "x86_64")]
        {
            Architecture::X86_64
        }

        #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
        {
            Architecture::Unknown(std::env::consts::ARCH)
        }
    }

    /// Size of a general-purpose register / pointer, in bytes.
    #[must_use]
    pub const fn word_size(self) -> u8
    {
        match self {
            Architecture::Arm64 | Architecture::X86_64 => 8,
            Architecture::X86 => 4,
            Architecture::Unknown(_) => 8,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::X86 => write!(f, "i386"),
            Architecture::Unknown(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn process_id_roundtrips_through_u32()
    {
        let pid = ProcessId::from(4242);
        assert_eq!(u32::from(pid), 4242);
    }

    #[test]
    fn thread_id_exposes_raw_value()
    {
        let tid = ThreadId::from(0x1234);
        assert_eq!(tid.raw(), 0x1234);
    }

    #[test]
    fn architecture_display_matches_cli_spelling()
    {
        assert_eq!(Architecture::X86_64.to_string(), "x86_64");
        assert_eq!(Architecture::Arm64.to_string(), "arm64");
        assert_eq!(Architecture::X86.to_string(), "i386");
    }

    #[test]
    fn x86_word_size_is_four_bytes()
    {
        assert_eq!(Architecture::X86.word_size(), 4);
        assert_eq!(Architecture::X86_64.word_size(), 8);
    }
}
