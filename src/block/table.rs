//! The append-only basic-block table.
//!
//! Records live in a [`boxcar::Vec`], which grows in geometrically sized buckets and never
//! moves a stored element. Appends are amortized O(1), never copy existing records, and
//! take `&self`: a table owned by one thread is appended without contention, while the
//! single process-wide table is shared through an `Arc` and appended concurrently without
//! a lock. Every append publishes a complete record; there are no torn entries.

use std::{io::Write, iter::FusedIterator};

use crate::{
    block::BlockRecord,
    dump::{self, DumpFormat},
    Result,
};

/// Initial number of records a table is preallocated for.
pub const INITIAL_CAPACITY: usize = 4096;

/// A growable, append-only sequence of [`BlockRecord`]s in insertion order.
///
/// # Examples
///
/// ```rust
/// use bbcov::block::{BlockRecord, BlockTable};
///
/// let table = BlockTable::create(false);
/// let index = table.append(BlockRecord::new(0, 0x10, 4)?);
/// assert_eq!(table.get(index).unwrap().start, 0x10);
/// assert_eq!(table.len(), 1);
/// # Ok::<(), bbcov::Error>(())
/// ```
#[derive(Debug)]
pub struct BlockTable {
    records: boxcar::Vec<BlockRecord>,
    synchronized: bool,
}

impl BlockTable {
    /// Creates a table with the default initial capacity.
    ///
    /// `synchronized` marks the table as the process-wide table appended by every thread;
    /// per-thread tables are only ever appended by their owner.
    #[must_use]
    pub fn create(synchronized: bool) -> Self {
        Self::with_capacity(INITIAL_CAPACITY, synchronized)
    }

    /// Creates a table preallocated for `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize, synchronized: bool) -> Self {
        Self {
            records: boxcar::Vec::with_capacity(capacity),
            synchronized,
        }
    }

    /// Returns `true` for the process-wide table shared by all threads.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Appends a record and returns its stable index.
    pub fn append(&self, record: BlockRecord) -> usize {
        self.records.push(record)
    }

    /// Returns the record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&BlockRecord> {
        self.records.get(index)
    }

    /// Number of records appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.count()
    }

    /// Returns `true` if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the records in insertion order.
    ///
    /// The iterator covers the records present when it was created. It is meant for the
    /// dump and check paths, which only run once no thread can append anymore.
    #[must_use]
    pub fn iter(&self) -> Records<'_> {
        Records {
            table: self,
            next: 0,
            end: self.len(),
        }
    }

    /// Visits every record in insertion order until `visit` returns `false`.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(usize, &BlockRecord) -> bool,
    {
        for index in 0..self.len() {
            if let Some(record) = self.records.get(index) {
                if !visit(index, record) {
                    break;
                }
            }
        }
    }

    /// Writes the block section of a dump in `format`.
    ///
    /// `detailed` selects the record layout carrying branch detail.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if writing fails.
    pub fn print<W: Write>(&self, writer: &mut W, format: DumpFormat, detailed: bool) -> Result<()> {
        dump::write_block_table(writer, self, format, detailed)
    }
}

impl<'a> IntoIterator for &'a BlockTable {
    type Item = &'a BlockRecord;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Insertion-order iterator over a [`BlockTable`].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    table: &'a BlockTable,
    next: usize,
    end: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a BlockRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let index = self.next;
            self.next += 1;
            if let Some(record) = self.table.records.get(index) {
                return Some(record);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.end - self.next))
    }
}

impl FusedIterator for Records<'_> {}
