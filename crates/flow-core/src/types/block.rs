//! Basic block and branch classification types.
//!
//! A `Block` is the unit of work the tracer core produces on every stepping
//! cycle: the address the thread started executing from, and the address
//! (and kind) of the branch instruction that ended the block. The trace log
//! encodes these two addresses and the kind as a single compact record; see
//! `crate::trace_log` for the wire format.

use crate::types::process::ThreadId;

/// Coarse classification of the instruction that ends a basic block.
///
/// This is the `tt` field of the trace log's record-type byte: two bits,
/// four kinds, matching the Instruction Decoder Adapter's flow classes
/// `{call, return, syscall, other-branch}` (the fifth class, "none", never
/// reaches here — it's what keeps the decoder walking).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind
{
    /// Anything else that ends a block: `jmp`/`jcc` (unconditional or
    /// conditional), an indirect jump, or a decode boundary forced by a
    /// loader notification landing mid-block.
    Other,
    /// Call instruction (`call`, indirect or direct).
    Call,
    /// Return instruction (`ret`).
    Return,
    /// A syscall-class instruction (`syscall`, `sysenter`, `int`).
    Syscall,
}

impl BranchKind
{
    /// Encode as the two-bit `tt` field used by the trace log.
    #[must_use]
    pub const fn to_bits(self) -> u8
    {
        match self {
            BranchKind::Other => 0b00,
            BranchKind::Call => 0b01,
            BranchKind::Return => 0b10,
            BranchKind::Syscall => 0b11,
        }
    }

    /// Decode from a two-bit `tt` field. All four bit patterns are valid.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self
    {
        match bits & 0b11 {
            0b01 => BranchKind::Call,
            0b10 => BranchKind::Return,
            0b11 => BranchKind::Syscall,
            _ => BranchKind::Other,
        }
    }
}

/// One executed basic block.
///
/// `entry` and `branch` satisfy the invariant `entry <= branch`: the decoder
/// adapter only reports a block boundary once it has classified the
/// instruction at `branch` as ending the block, so the two can be equal only
/// for a single-instruction block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block
{
    /// Thread that executed this block.
    pub thread: ThreadId,
    /// Address of the first instruction in the block.
    pub entry: u64,
    /// Address of the block-ending branch instruction.
    pub branch: u64,
    /// Classification of the branch instruction at `branch`.
    pub kind: BranchKind,
}

impl Block
{
    /// Build a new block, asserting the `entry <= branch` invariant in debug builds.
    #[must_use]
    pub fn new(thread: ThreadId, entry: u64, branch: u64, kind: BranchKind) -> Self
    {
        debug_assert!(entry <= branch, "block entry must not come after its own branch");
        Self {
            thread,
            entry,
            branch,
            kind,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn branch_kind_bit_roundtrip()
    {
        for kind in [BranchKind::Other, BranchKind::Call, BranchKind::Return, BranchKind::Syscall] {
            assert_eq!(BranchKind::from_bits(kind.to_bits()), kind);
        }
    }

    #[test]
    fn from_bits_masks_to_two_bits()
    {
        assert_eq!(BranchKind::from_bits(0xFF & 0b11), BranchKind::Syscall);
    }
}
