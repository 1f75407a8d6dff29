//! Dump file writing and reading.
//!
//! A dump holds the version line, the module table and the block table of one thread or
//! process. Module lines are always text; the block section is either text lines or raw
//! little-endian records (see [`binary`]).
//!
//! ```text
//! BBCOV VERSION: 1
//! Module Table: 1
//! Module Table: id, base, end, entry, unload, name, path
//!   0, 0x0000000000400000, 0x0000000000450000, 0x0000000000401000, loaded, app, /bin/app
//! BB Table: 2 bbs
//! module id, start, size:
//! module[  0]: 0x00001000,  12
//! module[  0]: 0x0000100c,   4
//! ```
//!
//! # Key Components
//!
//! - [`write_version`], [`write_module_table`], [`write_block_table`] - Dump sections
//! - [`DumpFormat`] - Text or binary block section
//! - [`Dump`] - A parsed dump, read back from memory or a mapped file

pub mod binary;
pub mod io;
mod reader;

use std::io::Write;

use strum::{Display, EnumString};

pub use reader::Dump;

use crate::{block::BlockRecord, module::ModuleSummary, Result};

/// Version of the dump layout.
pub const VERSION: u32 = 1;

/// Label of a module line without a name.
pub const UNKNOWN_NAME: &str = "<unknown>";

/// Encoding of the block section of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum DumpFormat {
    /// One text line per record
    #[strum(serialize = "text")]
    Text,
    /// Raw fixed-width records
    #[default]
    #[strum(serialize = "binary")]
    Binary,
}

/// Writes the version line.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if writing fails.
pub fn write_version<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "BBCOV VERSION: {VERSION}")?;
    Ok(())
}

/// Column names of a module line.
#[must_use]
pub fn module_columns(with_metadata: bool) -> &'static str {
    if with_metadata {
        "id, base, end, entry, unload, name, path, checksum, timestamp"
    } else {
        "id, base, end, entry, unload, name, path"
    }
}

/// Writes one module line.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if writing fails.
pub fn write_module_line<W: Write>(
    writer: &mut W,
    module: &ModuleSummary,
    with_metadata: bool,
) -> Result<()> {
    let descriptor = &module.descriptor;
    write!(
        writer,
        "{:3}, {:#018x}, {:#018x}, {:#018x}, {}, {}, {}",
        module.id,
        descriptor.start,
        descriptor.end,
        descriptor.entry_point,
        module.state,
        descriptor.name.as_deref().unwrap_or(UNKNOWN_NAME),
        descriptor.path,
    )?;
    if with_metadata {
        write!(
            writer,
            ", {:#010x}, {:#010x}",
            descriptor.checksum.unwrap_or(0),
            descriptor.timestamp.unwrap_or(0)
        )?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Writes the module table section: count, column header and one line per module.
///
/// Checksum and timestamp columns are present if any module carries them.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if writing fails.
pub fn write_module_table<W: Write>(writer: &mut W, modules: &[ModuleSummary]) -> Result<()> {
    let with_metadata = modules
        .iter()
        .any(|module| module.descriptor.has_platform_metadata());

    writeln!(writer, "Module Table: {}", modules.len())?;
    writeln!(writer, "Module Table: {}", module_columns(with_metadata))?;
    for module in modules {
        write_module_line(writer, module, with_metadata)?;
    }
    Ok(())
}

/// Writes the block table section.
///
/// `detailed` selects the columns (text) or record layout (binary) with branch detail.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if writing fails.
pub fn write_block_table<'a, W, I>(
    writer: &mut W,
    records: I,
    format: DumpFormat,
    detailed: bool,
) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a BlockRecord> + Clone,
{
    let count = records.clone().into_iter().count();
    writeln!(writer, "BB Table: {count} bbs")?;

    match format {
        DumpFormat::Text => {
            if detailed {
                writeln!(writer, "module id, start, size, cbr tgt, trace, #instr:")?;
            } else {
                writeln!(writer, "module id, start, size:")?;
            }
            for record in records {
                write_record_line(writer, record, detailed)?;
            }
        }
        DumpFormat::Binary => {
            let mut buffer = [0u8; binary::DETAILED_RECORD_SIZE];
            let width = binary::record_size(detailed);
            for record in records {
                let mut offset = 0;
                binary::write_record(&mut buffer, &mut offset, record, detailed)?;
                writer.write_all(&buffer[..width])?;
            }
        }
    }
    Ok(())
}

fn write_record_line<W: Write>(writer: &mut W, record: &BlockRecord, detailed: bool) -> Result<()> {
    write!(
        writer,
        "module[{:3}]: {:#010x}, {:3}",
        record.module_id, record.start, record.size
    )?;
    if detailed {
        let detail = record.detail.unwrap_or_default();
        write!(
            writer,
            ", {:#010x}, {:2}, {:3}",
            detail.cbr_target,
            u8::from(detail.trace),
            detail.num_instrs
        )?;
    }
    writeln!(writer)?;
    Ok(())
}
