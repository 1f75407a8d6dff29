//! # bbcov Prelude
//!
//! Commonly used types for engine glue and dump analysis.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all bbcov operations
pub use crate::Error;

/// The result type used throughout bbcov
pub use crate::Result;

// ================================================================================================
// Collection
// ================================================================================================

pub use crate::collector::{Collector, NativeHandoff, ThreadData, NUDGE_TERMINATE_PROCESS};
pub use crate::config::Options;

// ================================================================================================
// Engine Interface
// ================================================================================================

pub use crate::engine::{
    ElisionLimits, EmitFlags, Engine, Instr, InstrFlags, ModuleDescriptor, SyscallNumbers,
    ThreadId,
};

// ================================================================================================
// Records, Modules and Dumps
// ================================================================================================

pub use crate::block::{BlockDetail, BlockRecord, BlockShape, BlockTable, UNKNOWN_MODULE};
pub use crate::check::{CoverageReport, EdgeKind, EdgeMiss, ModuleCoverage};
pub use crate::dump::{Dump, DumpFormat};
pub use crate::module::{ModuleCache, ModuleState, ModuleSummary, ModuleTable};
