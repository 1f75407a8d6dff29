//! Fixed-width little-endian record layout of binary dumps.
//!
//! | field       | plain | detailed |
//! |-------------|-------|----------|
//! | module id   | u32   | u32      |
//! | start       | u32   | u32      |
//! | size        | u16   | u16      |
//! | cbr target  |       | u32      |
//! | #instr      |       | u16      |
//! | trace       |       | u8       |
//! | padding     |       | u8       |

use super::io::{read_le_at, write_le_at};
use crate::{
    block::{BlockDetail, BlockRecord},
    Result,
};

/// Width of a record without branch detail.
pub const PLAIN_RECORD_SIZE: usize = 10;

/// Width of a record carrying branch detail.
pub const DETAILED_RECORD_SIZE: usize = 18;

/// Width of one record in the selected layout.
#[must_use]
pub const fn record_size(detailed: bool) -> usize {
    if detailed {
        DETAILED_RECORD_SIZE
    } else {
        PLAIN_RECORD_SIZE
    }
}

/// Encodes `record` at `offset`, advancing it by [`record_size`].
///
/// In the detailed layout a record without detail is written with zeroed detail fields.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `buffer` is too short.
pub fn write_record(
    buffer: &mut [u8],
    offset: &mut usize,
    record: &BlockRecord,
    detailed: bool,
) -> Result<()> {
    write_le_at(buffer, offset, record.module_id)?;
    write_le_at(buffer, offset, record.start)?;
    write_le_at(buffer, offset, record.size)?;

    if detailed {
        let detail = record.detail.unwrap_or_default();
        write_le_at(buffer, offset, detail.cbr_target)?;
        write_le_at(buffer, offset, detail.num_instrs)?;
        write_le_at(buffer, offset, u8::from(detail.trace))?;
        write_le_at(buffer, offset, 0u8)?;
    }
    Ok(())
}

/// Decodes one record at `offset`, advancing it by [`record_size`].
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than [`record_size`] bytes remain.
pub fn read_record(data: &[u8], offset: &mut usize, detailed: bool) -> Result<BlockRecord> {
    let module_id = read_le_at::<u32>(data, offset)?;
    let start = read_le_at::<u32>(data, offset)?;
    let size = read_le_at::<u16>(data, offset)?;

    let detail = if detailed {
        let cbr_target = read_le_at::<u32>(data, offset)?;
        let num_instrs = read_le_at::<u16>(data, offset)?;
        let trace = read_le_at::<u8>(data, offset)? != 0;
        read_le_at::<u8>(data, offset)?;
        Some(BlockDetail {
            cbr_target,
            num_instrs,
            trace,
        })
    } else {
        None
    };

    Ok(BlockRecord {
        module_id,
        start,
        size,
        detail,
    })
}
