//! # Dynamic Loader Structures
//!
//! Layouts of dyld's `dyld_all_image_infos` and `dyld_image_info`, read out
//! of target memory as raw little/native-endian bytes rather than mapped
//! with `#[repr(C)]` structs — the struct's pointer width depends on the
//! *target's* word size, not the tracer's own, so a fixed-layout struct
//! can't represent both a 32-bit and a 64-bit target.
//!
//! Only the fields the Tracer Core needs are modeled: the notifier function
//! pointer and dyld's own load address out of `dyld_all_image_infos`, and
//! the `{load address, path}` pair out of each `dyld_image_info` entry.
//! Grounded on dyld's public header, `dyld_images.h`.

use crate::error::{FlowError, Result};
use crate::platform::macos::Target;

/// The fields of `dyld_all_image_infos` this tracer reads.
#[derive(Debug, Clone, Copy)]
pub struct AllImageInfos
{
    /// Address of dyld's image-state-change notifier function. The Tracer
    /// Core arms a breakpoint here to intercept every load/unload.
    pub notification: u64,
    /// dyld's own load (base) address. Zero until dyld has completed its
    /// own initial relocation.
    pub dyld_load_address: u64,
}

/// One entry from the image-info array dyld's notifier is called with.
#[derive(Debug, Clone)]
pub struct ImageInfo
{
    /// Base address the image was loaded at.
    pub load_address: u64,
    /// Path to the image on disk.
    pub path: String,
}

/// Read the fields of `dyld_all_image_infos` at `address` in `target`,
/// using `word_size` (4 or 8) to locate pointer-width fields.
///
/// Layout (from `dyld_images.h`): `version: u32`, `infoArrayCount: u32`,
/// `infoArray: word`, `notification: word`, `processDetachedFromSharedRegion:
/// u8`, `libSystemInitialized: u8`, then `dyldImageLoadAddress: word` at the
/// next word-aligned offset.
pub fn read_all_image_infos(target: &Target, address: u64, word_size: u8) -> Result<AllImageInfos>
{
    let word = usize::from(word_size);
    let (notification_offset, dyld_load_address_offset) = all_image_infos_offsets(word);
    let needed = dyld_load_address_offset + word;

    let buffer = target.read_memory(address, needed)?;
    Ok(AllImageInfos {
        notification: read_word(&buffer, notification_offset, word)?,
        dyld_load_address: read_word(&buffer, dyld_load_address_offset, word)?,
    })
}

/// `(notification_offset, dyld_load_address_offset)` for a given word size,
/// split out of [`read_all_image_infos`] so the alignment math can be
/// checked without a live target.
const fn all_image_infos_offsets(word: usize) -> (usize, usize)
{
    let notification_offset = 8 + word;
    let dyld_load_address_offset = align_up(8 + 2 * word + 2, word);
    (notification_offset, dyld_load_address_offset)
}

/// Read image-info entry `index` out of the `info` array passed to dyld's
/// notifier, following `imageFilePath` to pull the image's path.
///
/// Layout: `imageLoadAddress: word`, `imageFilePath: word`,
/// `imageFileModDate: word` — three pointer-width fields per entry.
pub fn read_image_info(target: &Target, info_base: u64, index: u32, word_size: u8) -> Result<ImageInfo>
{
    let word = usize::from(word_size);
    let entry_size = 3 * word;
    let entry_address = info_base + u64::from(index) * entry_size as u64;

    let buffer = target.read_memory(entry_address, entry_size)?;
    let load_address = read_word(&buffer, 0, word)?;
    let path_pointer = read_word(&buffer, word, word)?;
    let path = target.read_string(path_pointer)?;

    Ok(ImageInfo { load_address, path })
}

fn read_word(buffer: &[u8], offset: usize, word: usize) -> Result<u64>
{
    let slice = buffer
        .get(offset..offset + word)
        .ok_or_else(|| FlowError::InvalidArgument(format!("dyld structure read too short at offset {offset}")))?;

    match word {
        4 => Ok(u64::from(u32::from_ne_bytes(slice.try_into().expect("checked length 4")))),
        8 => Ok(u64::from_ne_bytes(slice.try_into().expect("checked length 8"))),
        other => Err(FlowError::InvalidArgument(format!("unsupported word size {other}"))),
    }
}

const fn align_up(value: usize, align: usize) -> usize
{
    (value + align - 1) / align * align
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn align_up_rounds_to_word_boundary()
    {
        assert_eq!(align_up(18, 4), 20);
        assert_eq!(align_up(26, 8), 32);
        assert_eq!(align_up(16, 8), 16);
    }

    #[test]
    fn read_word_rejects_short_buffers()
    {
        let buffer = [0u8; 4];
        assert!(read_word(&buffer, 0, 8).is_err());
    }

    #[test]
    fn read_word_reads_native_endian_u64()
    {
        let value: u64 = 0xDEAD_BEEF_0000_0001;
        let buffer = value.to_ne_bytes();
        assert_eq!(read_word(&buffer, 0, 8).unwrap(), value);
    }

    #[test]
    fn all_image_infos_offsets_for_64_bit_target()
    {
        let (notification, dyld_load_address) = all_image_infos_offsets(8);
        assert_eq!(notification, 16);
        assert_eq!(dyld_load_address, 32);
    }

    #[test]
    fn all_image_infos_offsets_for_32_bit_target()
    {
        let (notification, dyld_load_address) = all_image_infos_offsets(4);
        assert_eq!(notification, 12);
        assert_eq!(dyld_load_address, 20);
    }
}
