//! Dump and result file creation.
//!
//! Files are named `<dir>/bbcov.<app>.<id>.<seq>.<kind>`, where `id` is the process or
//! thread id padded to five digits and `seq` is the first four-digit sequence number for
//! which no file exists yet. Files are never overwritten.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use strum::Display;

use crate::{Error, Result};

/// Number of sequence numbers tried before giving up.
pub const MAX_LOG_ATTEMPTS: u32 = 10_000;

/// Application name used when the engine does not know it.
pub const UNKNOWN_APPLICATION: &str = "unknown";

/// Kind of output file, used as its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LogKind {
    /// Process-wide dump
    #[strum(serialize = "proc.log")]
    ProcessLog,
    /// Per-thread dump
    #[strum(serialize = "thd.log")]
    ThreadLog,
    /// Process-wide coverage result
    #[strum(serialize = "proc.res")]
    ProcessResult,
    /// Per-thread coverage result
    #[strum(serialize = "thd.res")]
    ThreadResult,
}

impl LogKind {
    /// The dump file kind of a process or thread context.
    #[must_use]
    pub fn dump(per_thread: bool) -> Self {
        if per_thread {
            LogKind::ThreadLog
        } else {
            LogKind::ProcessLog
        }
    }

    /// The coverage result file kind of a process or thread context.
    #[must_use]
    pub fn result(per_thread: bool) -> Self {
        if per_thread {
            LogKind::ThreadResult
        } else {
            LogKind::ProcessResult
        }
    }
}

/// Builds the common path prefix of a context's files.
#[must_use]
pub fn log_prefix(dir: &Path, application: Option<&str>, id: u64) -> PathBuf {
    let application = application.unwrap_or(UNKNOWN_APPLICATION);
    dir.join(format!("bbcov.{application}.{id:05}"))
}

/// A freshly created, buffered output file.
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    /// Creates `<prefix>.<seq>.<kind>` with the lowest free sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogFileExhausted`] if every sequence number is taken, or
    /// [`Error::Io`] if creation fails for any other reason than an existing file.
    pub fn create(prefix: &Path, kind: LogKind) -> Result<Self> {
        for seq in 0..MAX_LOG_ATTEMPTS {
            let mut name = prefix.as_os_str().to_owned();
            name.push(format!(".{seq:04}.{kind}"));
            let path = PathBuf::from(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok(Self {
                        path,
                        writer: BufWriter::new(file),
                    })
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => continue,
                Err(error) => return Err(Error::Io(error)),
            }
        }

        Err(Error::LogFileExhausted(prefix.display().to_string()))
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
