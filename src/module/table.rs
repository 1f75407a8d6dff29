//! The process-wide module registry.
//!
//! Entries are appended to a [`boxcar::Vec`] so their index is their id, and indexed by
//! `(start, id)` in a [`SkipMap`] for range queries. Both structures are append-only: an
//! unload only flips the entry's load state. A single reader/writer lock serializes
//! load/unload (writers) against slow-path lookups (readers), so the id assignment, the
//! index and the load states are always observed consistently.

use std::{
    io::Write,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use crossbeam_skiplist::SkipMap;

use super::{ModuleCache, ModuleEntry, ModuleEntryRc, ModuleSummary};
use crate::{block::UNKNOWN_MODULE, dump, engine::ModuleDescriptor, Error, Result};

/// What to do when a module is loaded again at the range of an unloaded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReusePolicy {
    /// Always append a fresh entry; ids stay strictly monotonic
    #[default]
    AlwaysAppend,
    /// Revive an unloaded entry with identical range, path and platform metadata
    ReuseUnloaded,
}

/// Registry of every module loaded during the lifetime of the process.
///
/// # Thread Safety
///
/// All methods take `&self`. Loads and unloads are serialized by the table's write lock.
/// Lookups first consult the caller's [`ModuleCache`] without any lock and only take the
/// read lock on a miss.
///
/// # Examples
///
/// ```rust
/// use bbcov::{engine::ModuleDescriptor, module::{ModuleCache, ModuleTable}};
///
/// let table = ModuleTable::new();
/// let id = table.on_module_load(&ModuleDescriptor::new(0x40_0000, 0x45_0000, "/bin/app"))?;
///
/// let mut cache = ModuleCache::new();
/// let entry = table.lookup(0x40_1234, Some(&mut cache))?.unwrap();
/// assert_eq!(entry.id, id);
/// # Ok::<(), bbcov::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ModuleTable {
    entries: boxcar::Vec<ModuleEntryRc>,
    index: SkipMap<(u64, u32), ModuleEntryRc>,
    /// Largest module size seen, bounds how far below an address a covering start can be
    max_span: AtomicU64,
    lock: RwLock<()>,
    policy: ReusePolicy,
}

impl ModuleTable {
    /// Creates an empty table that always appends on load.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with the given reuse policy.
    #[must_use]
    pub fn with_policy(policy: ReusePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Registers a freshly loaded module and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModuleIdOverflow`] if the next id would reach the unknown-module
    /// sentinel, or [`Error::Lock`] on a poisoned lock.
    pub fn on_module_load(&self, descriptor: &ModuleDescriptor) -> Result<u32> {
        let _guard = write_lock!(self.lock);

        if self.policy == ReusePolicy::ReuseUnloaded {
            if let Some(entry) = self.find_in_range(descriptor, |entry| {
                !entry.is_loaded() && entry.descriptor == *descriptor
            }) {
                entry.set_loaded(true);
                return Ok(entry.id);
            }
        }

        let next = self.entries.count() as u64;
        if next >= u64::from(UNKNOWN_MODULE) {
            return Err(Error::ModuleIdOverflow(next));
        }

        let id = next as u32;
        let entry = Arc::new(ModuleEntry::new(id, descriptor.clone()));
        self.entries.push(entry.clone());
        self.index.insert((descriptor.start, id), entry);
        self.max_span.fetch_max(descriptor.size(), Ordering::AcqRel);

        Ok(id)
    }

    /// Marks the most recent loaded entry with the descriptor's range as unloaded.
    ///
    /// The entry and its id stay in the table so records taken while the module was
    /// mapped remain resolvable. Thread caches are not walked; stale slots are skipped
    /// lazily on their next use.
    ///
    /// Returns the id of the unloaded entry, or `None` if no loaded entry matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`] on a poisoned lock.
    pub fn on_module_unload(&self, descriptor: &ModuleDescriptor) -> Result<Option<u32>> {
        let _guard = write_lock!(self.lock);

        let entry = self.find_in_range(descriptor, |entry| {
            entry.is_loaded() && entry.end() == descriptor.end
        });
        Ok(entry.map(|entry| {
            entry.set_loaded(false);
            entry.id
        }))
    }

    /// Resolves `address` to the module containing it.
    ///
    /// The most recently loaded module that is still mapped wins. If no mapped module
    /// covers the address, the most recent unloaded module whose original range covers it
    /// is returned. Addresses outside every known module (e.g. generated code) resolve to
    /// `None`, which is an expected outcome and not an error.
    ///
    /// When a `cache` is supplied it is consulted first without locking, and loaded
    /// results of the slow path are installed into it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`] on a poisoned lock.
    pub fn lookup(
        &self,
        address: u64,
        cache: Option<&mut ModuleCache>,
    ) -> Result<Option<ModuleEntryRc>> {
        match cache {
            Some(cache) => {
                if let Some(entry) = cache.find(address) {
                    return Ok(Some(entry));
                }

                let found = self.lookup_locked(address)?;
                if let Some(entry) = found.as_ref().filter(|entry| entry.is_loaded()) {
                    cache.install(entry.clone());
                }
                Ok(found)
            }
            None => self.lookup_locked(address),
        }
    }

    fn lookup_locked(&self, address: u64) -> Result<Option<ModuleEntryRc>> {
        let _guard = read_lock!(self.lock);

        let max_span = self.max_span.load(Ordering::Acquire);
        let mut best: Option<ModuleEntryRc> = None;
        for candidate in self.index.range(..=(address, u32::MAX)).rev() {
            let (start, _) = *candidate.key();
            if address - start >= max_span {
                break;
            }

            let entry = candidate.value();
            if !entry.contains(address) {
                continue;
            }

            let better = match &best {
                None => true,
                Some(current) => {
                    (entry.is_loaded(), entry.id) > (current.is_loaded(), current.id)
                }
            };
            if better {
                best = Some(entry.clone());
            }
        }

        Ok(best)
    }

    /// Most recent entry with the descriptor's start address that satisfies `accept`.
    fn find_in_range<F>(&self, descriptor: &ModuleDescriptor, accept: F) -> Option<ModuleEntryRc>
    where
        F: Fn(&ModuleEntry) -> bool,
    {
        self.index
            .range((descriptor.start, 0)..=(descriptor.start, u32::MAX))
            .rev()
            .map(|candidate| candidate.value().clone())
            .find(|entry| accept(entry))
    }

    /// Returns the entry with the given id.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<ModuleEntryRc> {
        self.entries.get(id as usize).cloned()
    }

    /// Number of modules ever loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.count()
    }

    /// Returns `true` if no module has been loaded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry in id order, taken under the read lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`] on a poisoned lock.
    pub fn summaries(&self) -> Result<Vec<ModuleSummary>> {
        let _guard = read_lock!(self.lock);
        Ok((0..self.entries.count())
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.summary())
            .collect())
    }

    /// Writes the module summary section of a dump.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing fails or [`Error::Lock`] on a poisoned lock.
    pub fn print<W: Write>(&self, writer: &mut W) -> Result<()> {
        dump::write_module_table(writer, &self.summaries()?)
    }
}
