// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
// - 'dump/reader.rs' uses mmap to map a dump file into memory

//! # bbcov
//!
//! Basic-block coverage collection for dynamic binary instrumentation engines.
//!
//! An instrumentation engine compiles application code into basic blocks before running
//! it. `bbcov` hooks into that process: every compiled block is recorded as a compact,
//! module-relative [`BlockRecord`], every loaded image is registered in a [`ModuleTable`],
//! and at thread or process exit the collected tables are written out as a dump. With
//! branch checking enabled, a second output lists conditional branch directions that were
//! never taken.
//!
//! ## Features
//!
//! - **Module-relative records** - Blocks are stored as 32-bit offsets into their module,
//!   so dumps stay valid across address space layout randomization
//! - **Lock-free recording** - Block tables are append-only and never block readers
//! - **Two collection modes** - One process-wide table for shared code caches, one table
//!   per thread for thread-private caches
//! - **Delayed instrumentation** - Threads may run natively until the N-th thread starts
//! - **Dump reader** - Text and binary dumps can be parsed back for offline analysis
//!
//! ## Quick Start
//!
//! The engine glue implements [`engine::Engine`] and forwards its events to a
//! [`Collector`]:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bbcov::prelude::*;
//!
//! let collector = Collector::from_option_string(Arc::new(engine), "-dump_text")?;
//! let mut data = collector.on_thread_init(ThreadId(1))?;
//! collector.on_module_load(&ModuleDescriptor::new(0x40_0000, 0x48_0000, "/bin/ls"))?;
//! collector.on_basic_block(&mut data, 0x40_1000, &instrs, false, false)?;
//! collector.on_thread_exit(data)?;
//! collector.on_exit()?;
//! # Ok::<(), bbcov::Error>(())
//! ```
//!
//! ### Reading a Dump
//!
//! ```rust,no_run
//! use bbcov::{check::CoverageReport, dump::Dump};
//! use std::path::Path;
//!
//! let dump = Dump::from_file(Path::new("bbcov.ls.01234.0000.proc.log"))?;
//! println!("{} modules, {} blocks", dump.modules.len(), dump.records.len());
//!
//! if dump.detailed {
//!     let report = CoverageReport::check(&dump.records, dump.modules.len());
//!     println!("{} branch directions never taken", report.misses().len());
//! }
//! # Ok::<(), bbcov::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Encoding violations such as a block
//! larger than 65535 bytes are fatal for the collection; see [`Error::is_fatal`].

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use bbcov::prelude::*;
///
/// let options = Options::parse_str("-check_cbr")?;
/// assert_eq!(options.format(), DumpFormat::Binary);
/// # Ok::<(), bbcov::Error>(())
/// ```
pub mod prelude;

/// Basic-block records and the append-only tables holding them
///
/// # Key Types
///
/// - [`block::BlockRecord`] - One observation of a compiled block
/// - [`block::BlockTable`] - Growable, concurrently appendable record storage
/// - [`block::BlockShape`] - Measurement of a block from its instruction list
pub mod block;

/// Conditional-branch edge coverage over a set of block records
pub mod check;

/// The collector and its engine event handlers
pub mod collector;

/// Parsing of the collector's option string
pub mod config;

/// Dump format: writing and reading module and block tables
///
/// # Key Components
///
/// - [`dump::DumpFormat`] - Text or binary block section
/// - [`dump::binary`] - Fixed-size little-endian record layout
/// - [`dump::Dump`] - Parsed dump file
pub mod dump;

/// The interface the collector consumes from the instrumentation engine
pub mod engine;

/// Module registry with address lookup and per-thread lookup caches
pub mod module;

/// `bbcov` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`]. Used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `bbcov` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Main entry point for engine integration
pub use collector::{Collector, ThreadData};

/// Core collection types
pub use block::{BlockRecord, BlockTable};
pub use config::Options;
pub use module::ModuleTable;
