use std::{fs, path::Path};

use memmap2::Mmap;

use super::{binary, DumpFormat, UNKNOWN_NAME, VERSION};
use crate::{
    block::{BlockDetail, BlockRecord},
    engine::ModuleDescriptor,
    module::{ModuleState, ModuleSummary},
    Result,
};

/// A dump parsed back into memory.
///
/// Text and binary block sections are detected automatically, as is the presence of
/// branch detail.
///
/// # Examples
///
/// ```rust
/// use bbcov::dump::Dump;
///
/// let text = "BBCOV VERSION: 1\n\
///             Module Table: 0\n\
///             Module Table: id, base, end, entry, unload, name, path\n\
///             BB Table: 1 bbs\n\
///             module id, start, size:\n\
///             module[  0]: 0x00000010,   4\n";
/// let dump = Dump::parse(text.as_bytes())?;
/// assert_eq!(dump.records.len(), 1);
/// assert_eq!(dump.records[0].start, 0x10);
/// # Ok::<(), bbcov::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump {
    /// Layout version from the first line
    pub version: u32,
    /// Module table in id order
    pub modules: Vec<ModuleSummary>,
    /// Block records in dump order
    pub records: Vec<BlockRecord>,
    /// Encoding of the block section
    pub format: DumpFormat,
    /// Records carry branch detail
    pub detailed: bool,
}

impl Dump {
    /// Maps and parses the dump at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be opened or mapped, and
    /// [`crate::Error::Malformed`] if it is empty or not a valid dump.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(malformed_error!("empty dump file"));
        }

        let mmap = unsafe { Mmap::map(&file) }?;
        Self::parse(&mmap)
    }

    /// Parses a dump from memory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the data is not a valid dump.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { data, offset: 0 };

        let version: u32 = parse_number(cursor.line_after("BBCOV VERSION: ")?)?;
        if version != VERSION {
            return Err(malformed_error!("unsupported dump version {}", version));
        }

        let module_count: usize = parse_number(cursor.line_after("Module Table: ")?)?;
        let columns = cursor.line_after("Module Table: ")?;
        let with_metadata = columns.ends_with("checksum, timestamp");
        let modules = (0..module_count)
            .map(|_| parse_module_line(cursor.line()?, with_metadata))
            .collect::<Result<Vec<_>>>()?;

        let bbs = cursor.line_after("BB Table: ")?;
        let count: usize = parse_number(
            bbs.strip_suffix(" bbs")
                .ok_or_else(|| malformed_error!("invalid block table line: {}", bbs))?,
        )?;

        let rest = cursor.remaining();
        let (format, detailed, records) = if rest.starts_with(b"module id, start, size") {
            let header = cursor.line()?;
            let detailed = header.contains("cbr tgt");
            let records = (0..count)
                .map(|_| parse_record_line(cursor.line()?, detailed))
                .collect::<Result<Vec<_>>>()?;
            (DumpFormat::Text, detailed, records)
        } else {
            let detailed = if count == 0 {
                false
            } else if count.checked_mul(binary::PLAIN_RECORD_SIZE) == Some(rest.len()) {
                false
            } else if count.checked_mul(binary::DETAILED_RECORD_SIZE) == Some(rest.len()) {
                true
            } else {
                return Err(malformed_error!(
                    "{} bytes do not hold {} binary records",
                    rest.len(),
                    count
                ));
            };

            let mut offset = 0;
            let records = (0..count)
                .map(|_| binary::read_record(rest, &mut offset, detailed))
                .collect::<Result<Vec<_>>>()?;
            (DumpFormat::Binary, detailed, records)
        };

        Ok(Dump {
            version,
            modules,
            records,
            format,
            detailed,
        })
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn line(&mut self) -> Result<&'a str> {
        let rest = self.remaining();
        if rest.is_empty() {
            return Err(malformed_error!("unexpected end of dump"));
        }

        let len = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        self.offset += (len + 1).min(rest.len());
        let line = std::str::from_utf8(&rest[..len])
            .map_err(|_| malformed_error!("line at byte {} is not utf-8", self.offset))?;
        Ok(line.trim_end_matches('\r'))
    }

    fn line_after(&mut self, prefix: &str) -> Result<&'a str> {
        let line = self.line()?;
        line.strip_prefix(prefix)
            .ok_or_else(|| malformed_error!("expected '{}', found '{}'", prefix, line))
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.offset.min(self.data.len())..]
    }
}

fn parse_number<T: std::str::FromStr>(field: &str) -> Result<T> {
    field
        .trim()
        .parse()
        .map_err(|_| malformed_error!("invalid number '{}'", field))
}

fn parse_hex<T: TryFrom<u64>>(field: &str) -> Result<T> {
    let field = field.trim();
    let digits = field
        .strip_prefix("0x")
        .ok_or_else(|| malformed_error!("invalid hex value '{}'", field))?;
    u64::from_str_radix(digits, 16)
        .ok()
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| malformed_error!("invalid hex value '{}'", field))
}

fn parse_module_line(line: &str, with_metadata: bool) -> Result<ModuleSummary> {
    let fields: Vec<&str> = line.splitn(7, ", ").collect();
    let [id, start, end, entry, state, name, rest] = fields[..] else {
        return Err(malformed_error!("invalid module line '{}'", line));
    };

    let (path, checksum, timestamp) = if with_metadata {
        let mut tail = rest.rsplitn(3, ", ");
        match (tail.next(), tail.next(), tail.next()) {
            (Some(timestamp), Some(checksum), Some(path)) => {
                (path, Some(parse_hex(checksum)?), Some(parse_hex(timestamp)?))
            }
            _ => return Err(malformed_error!("missing module metadata in '{}'", line)),
        }
    } else {
        (rest, None, None)
    };

    let state: ModuleState = state
        .parse()
        .map_err(|_| malformed_error!("invalid module state '{}'", state))?;

    Ok(ModuleSummary {
        id: parse_number(id)?,
        descriptor: ModuleDescriptor {
            start: parse_hex(start)?,
            end: parse_hex(end)?,
            entry_point: parse_hex(entry)?,
            name: (name != UNKNOWN_NAME).then(|| name.to_string()),
            path: path.to_string(),
            checksum,
            timestamp,
        },
        state,
    })
}

fn parse_record_line(line: &str, detailed: bool) -> Result<BlockRecord> {
    let (id, fields) = line
        .strip_prefix("module[")
        .and_then(|rest| rest.split_once("]: "))
        .ok_or_else(|| malformed_error!("invalid block line '{}'", line))?;
    let fields: Vec<&str> = fields.split(", ").collect();

    let expected = if detailed { 5 } else { 2 };
    if fields.len() != expected {
        return Err(malformed_error!("invalid block line '{}'", line));
    }

    let mut record = BlockRecord {
        module_id: parse_number(id)?,
        start: parse_hex(fields[0])?,
        size: parse_number(fields[1])?,
        detail: None,
    };
    if detailed {
        let trace: u8 = parse_number(fields[3])?;
        record.detail = Some(BlockDetail {
            cbr_target: parse_hex(fields[2])?,
            num_instrs: parse_number(fields[4])?,
            trace: trace != 0,
        });
    }
    Ok(record)
}
