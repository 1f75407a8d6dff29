//! The interface the collector consumes from the instrumentation engine.
//!
//! The collector never drives execution itself. The engine decides block boundaries,
//! invokes the collector's event handlers inline on the thread that triggered them, and
//! performs the actual switch between native and instrumented execution. Everything the
//! collector needs from it is captured by the [`Engine`] trait and the plain data types in
//! this module.
//!
//! # Key Components
//!
//! - [`Engine`] - Process information, configuration queries and thread control primitives
//! - [`ModuleDescriptor`] - Metadata of a loaded module as reported by the engine
//! - [`Instr`] / [`InstrFlags`] - The instruction list of a compiled basic block
//! - [`EmitFlags`] - Hint returned from the block event
//!
//! # Thread Control
//!
//! The native-execution handoff relies on three primitives which must either succeed
//! as a whole or report failure: [`Engine::suspend_all_other_threads`] (enumerate and
//! freeze), [`Engine::retake_native_thread`] (classify and retake, together with
//! [`Engine::is_thread_native`]) and [`Engine::resume_all_other_threads`] (thaw).

use std::{fmt, path::PathBuf};

use bitflags::bitflags;
use strum::Display;

/// Engine-assigned identity of an application thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A code module (executable or shared library) mapped into the application.
///
/// The descriptor is passed in by the engine on load and unload events. The collector
/// keeps its own copy for the lifetime of the process; it never extracts metadata itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleDescriptor {
    /// First mapped address
    pub start: u64,
    /// One past the last mapped address
    pub end: u64,
    /// Entry point of the image
    pub entry_point: u64,
    /// Preferred module name, if the image carries one
    pub name: Option<String>,
    /// Full path of the image on disk
    pub path: String,
    /// Image checksum, on platforms that record one
    pub checksum: Option<u32>,
    /// Link timestamp, on platforms that record one
    pub timestamp: Option<u32>,
}

impl ModuleDescriptor {
    /// Creates a descriptor without name or platform metadata.
    pub fn new(start: u64, end: u64, path: impl Into<String>) -> Self {
        Self {
            start,
            end,
            entry_point: start,
            name: None,
            path: path.into(),
            checksum: None,
            timestamp: None,
        }
    }

    /// Size of the mapped range in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if `address` lies inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }

    /// Returns `true` if checksum or timestamp metadata is present.
    #[must_use]
    pub fn has_platform_metadata(&self) -> bool {
        self.checksum.is_some() || self.timestamp.is_some()
    }
}

bitflags! {
    /// Properties of an instruction in a basic block's instruction list.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstrFlags: u8 {
        /// The instruction comes from the application, as opposed to engine-inserted meta code
        const APP = 0x01;
        /// The opcode has been decoded
        const VALID_OPCODE = 0x02;
        /// The instruction is a conditional branch
        const CBR = 0x04;
    }
}

/// One instruction of a basic block as handed over by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    /// Application address; `None` for instructions without an application origin
    pub pc: Option<u64>,
    /// Encoded length in bytes
    pub length: u32,
    /// Instruction properties
    pub flags: InstrFlags,
    /// Branch target for direct branches
    pub target: Option<u64>,
}

impl Instr {
    /// An application instruction that does not transfer control.
    #[must_use]
    pub fn app(pc: u64, length: u32) -> Self {
        Self {
            pc: Some(pc),
            length,
            flags: InstrFlags::APP | InstrFlags::VALID_OPCODE,
            target: None,
        }
    }

    /// An application conditional branch to `target`.
    #[must_use]
    pub fn cbr(pc: u64, length: u32, target: u64) -> Self {
        Self {
            pc: Some(pc),
            length,
            flags: InstrFlags::APP | InstrFlags::VALID_OPCODE | InstrFlags::CBR,
            target: Some(target),
        }
    }

    /// An engine-inserted instruction, which does not contribute to block measurements.
    #[must_use]
    pub fn meta(length: u32) -> Self {
        Self {
            pc: None,
            length,
            flags: InstrFlags::empty(),
            target: None,
        }
    }

    /// Returns `true` for instructions originating from the application.
    #[must_use]
    pub fn is_app(&self) -> bool {
        self.flags.contains(InstrFlags::APP)
    }

    /// Returns `true` for decoded conditional branches.
    #[must_use]
    pub fn is_cbr(&self) -> bool {
        self.flags
            .contains(InstrFlags::VALID_OPCODE | InstrFlags::CBR)
    }
}

/// Instruction elision settings of the engine.
///
/// Block sizes are derived from application instruction addresses, which is only correct
/// when the engine does not elide unconditional jumps or calls into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElisionLimits {
    /// Maximum number of elided jumps per block
    pub max_elide_jmp: u64,
    /// Maximum number of elided calls per block
    pub max_elide_call: u64,
}

impl ElisionLimits {
    /// Returns `true` if the engine may elide control transfers.
    #[must_use]
    pub fn elides(&self) -> bool {
        self.max_elide_jmp != 0 || self.max_elide_call != 0
    }
}

/// System call numbers the collector intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyscallNumbers {
    /// Process replacement (`execve`), treated as a full teardown and report trigger
    pub exec: Option<i32>,
    /// Process termination aimed at another process, converted into a nudge
    pub terminate_process: Option<i32>,
}

impl SyscallNumbers {
    /// The process replacement syscall of the host architecture on Linux.
    #[must_use]
    pub fn linux() -> Self {
        Self {
            exec: Some(if cfg!(target_pointer_width = "64") { 59 } else { 11 }),
            terminate_process: None,
        }
    }
}

/// Hint returned to the engine from the block event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EmitFlags {
    /// Keep executing under instrumentation
    #[strum(serialize = "default")]
    Default,
    /// Let the thread continue natively
    #[strum(serialize = "go-native")]
    GoNative,
}

/// The instrumentation engine, as seen by the collector.
///
/// Implementations must be shareable across all application threads, since event
/// handlers run inline on whichever thread triggered them.
pub trait Engine: Send + Sync {
    /// Identity of the application process.
    fn process_id(&self) -> u32;

    /// Name of the application, if known.
    fn application_name(&self) -> Option<String>;

    /// Path of the collector library; its directory is the default log directory.
    fn client_path(&self) -> PathBuf;

    /// Returns `true` if every thread has a private code cache, which selects
    /// per-thread collection.
    fn uses_private_caches(&self) -> bool;

    /// Current instruction elision settings.
    fn elision_limits(&self) -> ElisionLimits {
        ElisionLimits::default()
    }

    /// System call numbers of the host platform.
    fn syscall_numbers(&self) -> SyscallNumbers {
        SyscallNumbers::linux()
    }

    /// Suspends every thread except `current`, including natively running ones.
    ///
    /// Returns the suspended threads, or `None` if not all of them could be suspended.
    fn suspend_all_other_threads(&self, current: ThreadId) -> Option<Vec<ThreadId>>;

    /// Returns `true` if the suspended `thread` executes natively.
    fn is_thread_native(&self, thread: ThreadId) -> bool;

    /// Brings a suspended, natively running thread back under instrumentation.
    fn retake_native_thread(&self, thread: ThreadId) -> bool;

    /// Resumes every thread returned by [`Engine::suspend_all_other_threads`].
    fn resume_all_other_threads(&self, threads: &[ThreadId]) -> bool;

    /// Reads the `index`-th parameter of the system call `thread` is about to issue.
    fn syscall_param(&self, _thread: ThreadId, _index: usize) -> u64 {
        0
    }

    /// Sets the result of a system call that is being skipped.
    fn set_syscall_result(&self, _thread: ThreadId, _value: u64) {}

    /// Translates a process handle into a process id.
    fn process_id_of_handle(&self, _handle: u64) -> Option<u32> {
        None
    }

    /// Delivers a nudge carrying `argument` to the collector instance in process `pid`.
    fn nudge_process(&self, _pid: u32, _argument: u64) -> bool {
        false
    }

    /// Terminates the application process with `code`, running all exit events.
    fn exit_process(&self, code: u32) {
        std::process::exit(code as i32);
    }
}
