//! Process and thread contexts.
//!
//! In process-wide mode a single [`ProcessData`] owns the shared block table and the
//! process output files; every [`ThreadData`] aliases that table and only owns its module
//! cache. In per-thread mode each [`ThreadData`] owns its own table and output files and
//! there is no process context.

use std::{path::Path, sync::Arc};

use super::logfile::{LogFile, LogKind};
use crate::{block::BlockTable, engine::ThreadId, module::ModuleCache, Result};

/// Output files of one context.
#[derive(Debug)]
pub struct Outputs {
    /// Dump file
    pub log: LogFile,
    /// Coverage result file, present when coverage checking is enabled
    pub result: Option<LogFile>,
}

impl Outputs {
    /// Creates the dump file, and the result file if `check` is set, next to `prefix`.
    pub(crate) fn open(prefix: &Path, per_thread: bool, check: bool, verbose: u32) -> Result<Self> {
        let log = LogFile::create(prefix, LogKind::dump(per_thread))?;
        notify!(verbose, 1, "created log file {}", log.path().display());

        let result = if check {
            let result = LogFile::create(prefix, LogKind::result(per_thread))?;
            notify!(verbose, 1, "created result file {}", result.path().display());
            Some(result)
        } else {
            None
        };

        Ok(Self { log, result })
    }
}

/// The process-wide context.
#[derive(Debug)]
pub struct ProcessData {
    pub(crate) table: Arc<BlockTable>,
    pub(crate) outputs: Outputs,
}

impl ProcessData {
    pub(crate) fn new(outputs: Outputs) -> Self {
        Self {
            table: Arc::new(BlockTable::create(true)),
            outputs,
        }
    }

    /// The shared block table.
    #[must_use]
    pub fn table(&self) -> &BlockTable {
        &self.table
    }

    /// The process output files.
    #[must_use]
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }
}

/// State the engine glue keeps for one application thread.
#[derive(Debug)]
pub struct ThreadData {
    pub(crate) thread: ThreadId,
    pub(crate) table: Arc<BlockTable>,
    pub(crate) cache: ModuleCache,
    pub(crate) outputs: Option<Outputs>,
}

impl ThreadData {
    /// A context owning a fresh table and its own output files.
    pub(crate) fn private(thread: ThreadId, outputs: Outputs) -> Self {
        Self {
            thread,
            table: Arc::new(BlockTable::create(false)),
            cache: ModuleCache::new(),
            outputs: Some(outputs),
        }
    }

    /// A context recording into the shared process table.
    pub(crate) fn shared(thread: ThreadId, process: &ProcessData) -> Self {
        Self {
            thread,
            table: process.table.clone(),
            cache: ModuleCache::new(),
            outputs: None,
        }
    }

    /// The thread this context belongs to.
    #[must_use]
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// The table blocks of this thread are recorded into.
    #[must_use]
    pub fn table(&self) -> &BlockTable {
        &self.table
    }

    /// Returns `true` if the context owns its table and output files.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.outputs.is_some()
    }

    /// The thread's own output files, if it has any.
    #[must_use]
    pub fn outputs(&self) -> Option<&Outputs> {
        self.outputs.as_ref()
    }

    /// Returns `true` if both contexts record into the same table.
    #[must_use]
    pub fn shares_table_with(&self, other: &ThreadData) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }
}
