//! # Trace Log
//!
//! Binary, append-only record of a trace run: one 32-bit CPU-type header,
//! then a stream of block/dyld-load/library-notification records. Every
//! integer field is written in the host's native byte order — the format
//! makes no attempt to be portable across byte orders, only across this
//! host's own 32-/64-bit decisions (word size varies per *target*, not per
//! record).
//!
//! Record type byte, `0b0ttooooo` for a block record (bit 7 clear), or one
//! of two fixed values (`0x80`, `0x81`) for the two non-block record kinds:
//!
//! - **Block**: type byte with `tt` = [`BranchKind::to_bits`], `ooooo` =
//!   `branch - entry` if that fits in 5 bits (< 0x1F), else `0x1F` and a
//!   full 64-bit `branch` follows. The 64-bit `entry` always follows the
//!   type byte, before the optional `branch`. Note the asymmetry: there is
//!   no `branch` field at all when the delta fits in `ooooo` — it is not
//!   redundantly repeated.
//! - **Dyld load address** (`0x80`): followed by a 64-bit address.
//! - **Library notification** (`0x81`): followed by a 64-bit `mode`, a
//!   32-bit image count, then per image: a 64-bit base address, a 16-bit
//!   path length, and that many raw path bytes (no NUL terminator).

use std::io::{Read, Write};

use crate::error::{FlowError, Result};
use crate::types::BranchKind;

const DYLD_LOAD_ADDRESS_TAG: u8 = 0x80;
const LIBRARY_NOTIFICATION_TAG: u8 = 0x81;
const BLOCK_DELTA_ESCAPE: u8 = 0x1F;

/// A decoded trace-log record, as produced by [`TraceLogReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record
{
    /// One executed basic block.
    Block
    {
        /// Address of the block's first instruction.
        entry: u64,
        /// Address of the block-ending branch.
        branch: u64,
        /// Classification of that branch.
        kind: BranchKind,
    },
    /// dyld has relocated itself to this base address.
    DyldLoadAddress(u64),
    /// A batch of image loads/unloads reported by dyld's notifier.
    LibraryNotification
    {
        /// `mode` argument dyld's notifier was called with.
        mode: u64,
        /// `(base address, path)` for each image in the batch.
        images: Vec<(u64, String)>,
    },
}

/// Appends records to a trace log.
pub struct TraceLogWriter<W>
{
    writer: W,
}

impl<W: Write> TraceLogWriter<W>
{
    /// Wrap `writer`, immediately emitting the header (a single 32-bit CPU type).
    pub fn new(mut writer: W, cpu_type: u32) -> Result<Self>
    {
        writer.write_all(&cpu_type.to_ne_bytes())?;
        Ok(Self { writer })
    }

    /// Append a block record.
    pub fn write_block(&mut self, entry: u64, branch: u64, kind: BranchKind) -> Result<()>
    {
        let delta = branch - entry;
        let (ooooo, needs_full_branch) = if delta < u64::from(BLOCK_DELTA_ESCAPE) {
            (delta as u8, false)
        } else {
            (BLOCK_DELTA_ESCAPE, true)
        };

        let type_byte = (kind.to_bits() << 5) | ooooo;
        self.writer.write_all(&[type_byte])?;
        self.writer.write_all(&entry.to_ne_bytes())?;
        if needs_full_branch {
            self.writer.write_all(&branch.to_ne_bytes())?;
        }
        Ok(())
    }

    /// Append a dyld-load-address record.
    pub fn write_dyld_load_address(&mut self, address: u64) -> Result<()>
    {
        self.writer.write_all(&[DYLD_LOAD_ADDRESS_TAG])?;
        self.writer.write_all(&address.to_ne_bytes())?;
        Ok(())
    }

    /// Append a library-notification record.
    pub fn write_library_notification(&mut self, mode: u64, images: &[(u64, String)]) -> Result<()>
    {
        self.writer.write_all(&[LIBRARY_NOTIFICATION_TAG])?;
        self.writer.write_all(&mode.to_ne_bytes())?;

        let count = u32::try_from(images.len())
            .map_err(|_| FlowError::InvalidArgument("library notification image count overflows u32".to_string()))?;
        self.writer.write_all(&count.to_ne_bytes())?;

        for (address, path) in images {
            self.writer.write_all(&address.to_ne_bytes())?;
            let path_bytes = path.as_bytes();
            let len = u16::try_from(path_bytes.len())
                .map_err(|_| FlowError::InvalidArgument("library path exceeds u16 length".to_string()))?;
            self.writer.write_all(&len.to_ne_bytes())?;
            self.writer.write_all(path_bytes)?;
        }
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<()>
    {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads records back out of a trace log, in order.
pub struct TraceLogReader<R>
{
    reader: R,
}

impl<R: Read> TraceLogReader<R>
{
    /// Wrap `reader`, consuming the header and returning the CPU type it held.
    pub fn new(mut reader: R) -> Result<(Self, u32)>
    {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header)?;
        Ok((Self { reader }, u32::from_ne_bytes(header)))
    }

    /// Read the next record, or `Ok(None)` at a clean end-of-stream.
    pub fn read_record(&mut self) -> Result<Option<Record>>
    {
        let mut type_byte = [0u8; 1];
        if self.reader.read(&mut type_byte)? == 0 {
            return Ok(None);
        }

        match type_byte[0] {
            DYLD_LOAD_ADDRESS_TAG => {
                let address = self.read_u64()?;
                Ok(Some(Record::DyldLoadAddress(address)))
            }
            LIBRARY_NOTIFICATION_TAG => {
                let mode = self.read_u64()?;
                let count = self.read_u32()?;
                let mut images = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let address = self.read_u64()?;
                    let len = self.read_u16()? as usize;
                    let mut path_bytes = vec![0u8; len];
                    self.reader.read_exact(&mut path_bytes)?;
                    images.push((address, String::from_utf8_lossy(&path_bytes).into_owned()));
                }
                Ok(Some(Record::LibraryNotification { mode, images }))
            }
            byte => {
                let kind = BranchKind::from_bits(byte >> 5);
                let ooooo = byte & 0b0001_1111;
                let entry = self.read_u64()?;
                let branch = if ooooo == BLOCK_DELTA_ESCAPE {
                    self.read_u64()?
                } else {
                    entry + u64::from(ooooo)
                };
                Ok(Some(Record::Block { entry, branch, kind }))
            }
        }
    }

    fn read_u16(&mut self) -> Result<u16>
    {
        let mut buf = [0u8; 2];
        self.reader.read_exact(&mut buf)?;
        Ok(u16::from_ne_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32>
    {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64>
    {
        let mut buf = [0u8; 8];
        self.reader.read_exact(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Cursor;

    use super::*;

    #[test]
    fn block_with_small_delta_omits_branch_field()
    {
        let mut buf = Vec::new();
        {
            let mut writer = TraceLogWriter::new(&mut buf, 0x0100_0007).unwrap();
            writer.write_block(0x1000, 0x1005, BranchKind::Call).unwrap();
        }
        // header (4) + type byte (1) + entry (8) = 13, no branch field.
        assert_eq!(buf.len(), 13);
    }

    #[test]
    fn block_with_large_delta_includes_branch_field()
    {
        let mut buf = Vec::new();
        {
            let mut writer = TraceLogWriter::new(&mut buf, 0x0100_0007).unwrap();
            writer.write_block(0x1000, 0x1000 + 0x1F, BranchKind::Return).unwrap();
        }
        // header (4) + type byte (1) + entry (8) + branch (8) = 21.
        assert_eq!(buf.len(), 21);
    }

    #[test]
    fn roundtrips_a_mixed_record_stream()
    {
        let mut buf = Vec::new();
        {
            let mut writer = TraceLogWriter::new(&mut buf, 0x0100_0007).unwrap();
            writer.write_dyld_load_address(0x7fff_0000).unwrap();
            writer.write_block(0x2000, 0x2003, BranchKind::Syscall).unwrap();
            writer
                .write_library_notification(1, &[(0x9000, "/usr/lib/libSystem.B.dylib".to_string())])
                .unwrap();
            writer.write_block(0x3000, 0x3000 + 0x40, BranchKind::Other).unwrap();
        }

        let (mut reader, cpu_type) = TraceLogReader::new(Cursor::new(buf)).unwrap();
        assert_eq!(cpu_type, 0x0100_0007);

        assert_eq!(reader.read_record().unwrap(), Some(Record::DyldLoadAddress(0x7fff_0000)));
        assert_eq!(
            reader.read_record().unwrap(),
            Some(Record::Block { entry: 0x2000, branch: 0x2003, kind: BranchKind::Syscall })
        );
        assert_eq!(
            reader.read_record().unwrap(),
            Some(Record::LibraryNotification {
                mode: 1,
                images: vec![(0x9000, "/usr/lib/libSystem.B.dylib".to_string())],
            })
        );
        assert_eq!(
            reader.read_record().unwrap(),
            Some(Record::Block { entry: 0x3000, branch: 0x3040, kind: BranchKind::Other })
        );
        assert_eq!(reader.read_record().unwrap(), None);
    }
}
