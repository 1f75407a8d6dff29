//! Basic-block records and their storage.
//!
//! Each block the engine compiles is reduced to a compact [`BlockRecord`] holding the
//! owning module id, the offset into that module and the block size, plus optional branch
//! detail used by the coverage check. Records are appended to a [`BlockTable`], either one
//! per thread or a single table shared by the process.
//!
//! # Key Components
//!
//! - [`BlockRecord`] / [`BlockDetail`] - One observation of a compiled block
//! - [`BlockTable`] - Append-only, growable record store
//! - [`BlockShape`] - Measures a block from the engine's instruction list

mod record;
mod shape;
mod table;

pub use record::{BlockDetail, BlockRecord, UNKNOWN_MODULE};
pub use shape::BlockShape;
pub use table::{BlockTable, Records, INITIAL_CAPACITY};
