//! Module registry and address resolution.
//!
//! Every basic block is attributed to the module containing its start address, so that
//! records store stable `(module id, offset)` pairs instead of raw addresses. Modules are
//! registered on load, flagged on unload, and never removed.
//!
//! # Key Components
//!
//! - [`ModuleTable`] - Append-only registry with a range index and a reader/writer lock
//! - [`ModuleCache`] - Lock-free, thread-owned cache in front of the table
//! - [`ModuleEntry`] / [`ModuleSummary`] - Live entries and their detached snapshots
//! - [`ReusePolicy`] - Whether reloading an identical module revives its old entry

mod cache;
mod entry;
mod table;

pub use cache::{ModuleCache, MODULE_CACHE_SLOTS};
pub use entry::{ModuleEntry, ModuleEntryRc, ModuleState, ModuleSummary};
pub use table::{ModuleTable, ReusePolicy};
