//! Thread-owned lookup cache in front of the module table.
//!
//! The cache is best-effort and non-authoritative: it holds strong references to a few
//! recently resolved entries so the common address-to-module query avoids the table lock.
//! Entries are never freed while referenced, so a stale slot is always safe to read. A
//! slot whose module has since been unloaded is skipped, which sends the query to the
//! table where the most recent loaded mapping wins.

use super::ModuleEntryRc;

/// Number of slots in each thread's module cache
pub const MODULE_CACHE_SLOTS: usize = 4;

/// A tiny most-recently-used cache of module entries, owned by exactly one thread.
#[derive(Debug, Default, Clone)]
pub struct ModuleCache {
    slots: [Option<ModuleEntryRc>; MODULE_CACHE_SLOTS],
}

impl ModuleCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds a loaded module covering `address`, moving the hit to the front slot.
    pub fn find(&mut self, address: u64) -> Option<ModuleEntryRc> {
        let hit = self.slots.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|entry| entry.is_loaded() && entry.contains(address))
        })?;

        if hit > 0 {
            self.slots.swap(0, hit);
        }
        self.slots[0].clone()
    }

    /// Installs `entry` in the front slot, evicting the least recently filled one.
    pub fn install(&mut self, entry: ModuleEntryRc) {
        self.slots.rotate_right(1);
        self.slots[0] = Some(entry);
    }

    /// Drops every cached reference.
    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{engine::ModuleDescriptor, module::ModuleEntry};

    fn entry(id: u32, start: u64, end: u64) -> ModuleEntryRc {
        Arc::new(ModuleEntry::new(
            id,
            ModuleDescriptor::new(start, end, format!("/lib/mod{id}.so")),
        ))
    }

    #[test]
    fn hit_moves_to_front() {
        let mut cache = ModuleCache::new();
        cache.install(entry(0, 0x1000, 0x2000));
        cache.install(entry(1, 0x3000, 0x4000));

        let hit = cache.find(0x1500).unwrap();
        assert_eq!(hit.id, 0);
        assert_eq!(cache.slots[0].as_ref().unwrap().id, 0);
        assert_eq!(cache.slots[1].as_ref().unwrap().id, 1);
    }

    #[test]
    fn evicts_oldest_fill() {
        let mut cache = ModuleCache::new();
        for id in 0..=MODULE_CACHE_SLOTS as u32 {
            let start = 0x1000 * (u64::from(id) + 1);
            cache.install(entry(id, start, start + 0x800));
        }

        assert_eq!(cache.len(), MODULE_CACHE_SLOTS);
        assert!(cache.find(0x1000).is_none());
        assert_eq!(cache.find(0x5000).unwrap().id, 4);
    }

    #[test]
    fn unloaded_entries_are_skipped() {
        let mut cache = ModuleCache::new();
        let module = entry(0, 0x1000, 0x2000);
        cache.install(module.clone());
        module.set_loaded(false);

        assert!(cache.find(0x1800).is_none());
        cache.clear();
        assert!(cache.is_empty());
    }
}
