//! Module table entries and their printable summaries.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use strum::{Display, EnumString};

use crate::engine::ModuleDescriptor;

/// A reference-counted pointer to a [`ModuleEntry`]
pub type ModuleEntryRc = Arc<ModuleEntry>;

/// Load state of a module, as printed in the module summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ModuleState {
    /// The module is currently mapped
    #[strum(serialize = "loaded")]
    Loaded,
    /// The module has been unmapped; its entry is kept for old records
    #[strum(serialize = "unloaded")]
    Unloaded,
}

/// A module observed during the lifetime of the process.
///
/// The id and descriptor are immutable once the entry is published. Only the load state
/// changes, and only under the module table's write lock, so readers holding an entry
/// through a thread cache may observe a stale state but never a torn entry.
#[derive(Debug)]
pub struct ModuleEntry {
    /// Stable identity, equal to the entry's position in the module table
    pub id: u32,
    /// Metadata reported by the engine on load
    pub descriptor: ModuleDescriptor,
    loaded: AtomicBool,
}

impl ModuleEntry {
    pub(crate) fn new(id: u32, descriptor: ModuleDescriptor) -> Self {
        Self {
            id,
            descriptor,
            loaded: AtomicBool::new(true),
        }
    }

    /// Base address of the module.
    #[must_use]
    pub fn start(&self) -> u64 {
        self.descriptor.start
    }

    /// One past the last address of the module.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.descriptor.end
    }

    /// Returns `true` if `address` lies in the module's original range.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        self.descriptor.contains(address)
    }

    /// Returns `true` while the module is mapped.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Current load state.
    #[must_use]
    pub fn state(&self) -> ModuleState {
        if self.is_loaded() {
            ModuleState::Loaded
        } else {
            ModuleState::Unloaded
        }
    }

    pub(crate) fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::Release);
    }

    /// Point-in-time copy of the entry for reporting.
    #[must_use]
    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary {
            id: self.id,
            descriptor: self.descriptor.clone(),
            state: self.state(),
        }
    }
}

/// A detached snapshot of a module entry.
///
/// Produced from the live module table for reports, and by the dump reader when
/// parsing a module summary back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary {
    /// Module id
    pub id: u32,
    /// Module metadata
    pub descriptor: ModuleDescriptor,
    /// Load state at the time of the snapshot
    pub state: ModuleState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn state_follows_flag() {
        let entry = ModuleEntry::new(3, ModuleDescriptor::new(0x1000, 0x2000, "/bin/true"));
        assert_eq!(entry.state(), ModuleState::Loaded);
        entry.set_loaded(false);
        assert_eq!(entry.state(), ModuleState::Unloaded);

        let summary = entry.summary();
        assert_eq!(summary.id, 3);
        assert_eq!(summary.state, ModuleState::Unloaded);
        assert_eq!(summary.descriptor.path, "/bin/true");
    }

    #[test]
    fn state_strings() {
        assert_eq!(ModuleState::Loaded.to_string(), "loaded");
        assert_eq!(
            ModuleState::from_str("unloaded").unwrap(),
            ModuleState::Unloaded
        );
        assert!(ModuleState::from_str("mapped").is_err());
    }
}
