//! # Instruction Decoder Adapter
//!
//! Thin wrapper around `iced-x86` that finds the address of the next
//! basic-block-ending instruction in a byte window read from the target.
//! Architecture backends call into this rather than driving `iced-x86`
//! directly, so the decoding policy (what counts as a block boundary) lives
//! in one place shared by every x86/x86_64 caller.

use iced_x86::{Decoder, DecoderOptions, FlowControl};

use crate::error::{FlowError, Result};
use crate::types::BranchKind;

/// Find the address of the first instruction, at or after `start` within
/// `code` (which begins at `code_base`), whose control flow ends a basic
/// block — a call, return, syscall, or any other jump.
///
/// `bitness` is 16/32/64, matching `iced_x86::Decoder::with_ip`'s first
/// argument.
///
/// # Errors
///
/// `DecodeFailure` if `start` falls outside `code`'s window, if decoding
/// runs off the end of the window before finding a boundary, or if an
/// invalid encoding is hit.
pub fn find_block_boundary(bitness: u32, code: &[u8], code_base: u64, start: u64) -> Result<(u64, BranchKind)>
{
    if start < code_base || start >= code_base + code.len() as u64 {
        return Err(FlowError::DecodeFailure {
            address: start,
            reason: "start address outside decode window".to_string(),
        });
    }

    let offset = (start - code_base) as usize;
    let mut decoder = Decoder::with_ip(bitness, &code[offset..], start, DecoderOptions::NONE);

    loop {
        if !decoder.can_decode() {
            return Err(FlowError::DecodeFailure {
                address: decoder.ip(),
                reason: "ran off the end of the decode window before a branch".to_string(),
            });
        }

        let insn = decoder.decode();
        if insn.is_invalid() {
            return Err(FlowError::DecodeFailure {
                address: insn.ip(),
                reason: "invalid instruction encoding".to_string(),
            });
        }

        let kind = classify(insn.flow_control());
        if let Some(kind) = kind {
            return Ok((insn.ip(), kind));
        }
    }
}

fn classify(flow: FlowControl) -> Option<BranchKind>
{
    match flow {
        FlowControl::Next | FlowControl::XbeginXabortXend => None,
        FlowControl::UnconditionalBranch | FlowControl::ConditionalBranch | FlowControl::IndirectBranch => {
            Some(BranchKind::Other)
        }
        FlowControl::Call | FlowControl::IndirectCall => Some(BranchKind::Call),
        FlowControl::Return => Some(BranchKind::Return),
        FlowControl::Interrupt => Some(BranchKind::Syscall),
        FlowControl::Exception => Some(BranchKind::Other),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn finds_call_boundary()
    {
        let code: &[u8] = &[0x55, 0xE8, 0x00, 0x00, 0x00, 0x00];
        let (addr, kind) = find_block_boundary(64, code, 0x1000, 0x1000).unwrap();
        assert_eq!(addr, 0x1001);
        assert_eq!(kind, BranchKind::Call);
    }

    #[test]
    fn finds_ret_boundary()
    {
        let code: &[u8] = &[0x48, 0x89, 0xE5, 0xC3];
        let (addr, kind) = find_block_boundary(64, code, 0x2000, 0x2000).unwrap();
        assert_eq!(addr, 0x2003);
        assert_eq!(kind, BranchKind::Return);
    }

    #[test]
    fn errors_when_start_outside_window()
    {
        let code: &[u8] = &[0x90, 0x90];
        assert!(find_block_boundary(64, code, 0x3000, 0x9000).is_err());
    }

    #[test]
    fn errors_when_no_branch_found()
    {
        let code: &[u8] = &[0x90, 0x90, 0x90];
        assert!(find_block_boundary(64, code, 0x4000, 0x4000).is_err());
    }
}
