//! The coverage collector and its event handlers.
//!
//! A [`Collector`] is created once per process by the engine glue and shared with every
//! thread. Each engine event maps to one method; handlers run inline on the thread that
//! triggered the event. Thread state lives in a [`ThreadData`] the glue keeps in the
//! thread's local storage and passes back in.
//!
//! # Collection Modes
//!
//! - **Process-wide** (shared code cache): one block table and one set of output files
//!   for the whole process, written at process exit.
//! - **Per-thread** (thread-private code caches): each thread owns its table and output
//!   files, written and destroyed at thread exit. Process exit only tears down the module
//!   table.
//!
//! # Key Components
//!
//! - [`Collector`] - Event handlers and lifecycle coordination
//! - [`ThreadData`] / [`ProcessData`] - Thread and process contexts
//! - [`NativeHandoff`] - One-shot retake of natively running threads
//! - [`LogFile`] - Require-new output files
//!
//! # Examples
//!
//! ```rust,ignore
//! let collector = Collector::from_option_string(engine.clone(), "-dump_text -check_cbr")?;
//! let mut data = collector.on_thread_init(thread)?;
//! collector.on_module_load(&descriptor)?;
//! collector.on_basic_block(&mut data, tag, &instrs, false, false)?;
//! collector.on_thread_exit(data)?;
//! collector.on_exit()?;
//! ```

mod context;
mod handoff;
mod logfile;

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

pub use context::{Outputs, ProcessData, ThreadData};
pub use handoff::{HandoffOutcome, NativeHandoff};
pub use logfile::{log_prefix, LogFile, LogKind, MAX_LOG_ATTEMPTS, UNKNOWN_APPLICATION};

use crate::{
    block::{BlockDetail, BlockRecord, BlockShape, BlockTable},
    check::CoverageReport,
    config::Options,
    dump,
    engine::{EmitFlags, Engine, Instr, ModuleDescriptor, SyscallNumbers, ThreadId},
    module::ModuleTable,
    Error, Result,
};

/// Low 32 bits of a nudge argument requesting process termination.
pub const NUDGE_TERMINATE_PROCESS: u32 = 1;

/// The basic-block coverage collector of one process.
pub struct Collector<E: Engine> {
    engine: Arc<E>,
    options: Options,
    per_thread: bool,
    modules: ModuleTable,
    global: Mutex<Option<ProcessData>>,
    handoff: NativeHandoff,
    syscalls: SyscallNumbers,
    exited: AtomicBool,
}

impl<E: Engine> Collector<E> {
    /// Initializes the collector.
    ///
    /// The collection mode follows the engine's code cache configuration. In process-wide
    /// mode the process context and its output files are created here.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedConfiguration`] if the engine elides control transfers
    /// - [`Error::LogFileExhausted`] or [`Error::Io`] if the output files cannot be created
    pub fn new(engine: Arc<E>, options: Options) -> Result<Self> {
        let limits = engine.elision_limits();
        if limits.elides() {
            return Err(Error::UnsupportedConfiguration(format!(
                "instruction elision is not supported (max_elide_jmp {}, max_elide_call {})",
                limits.max_elide_jmp, limits.max_elide_call
            )));
        }

        let per_thread = engine.uses_private_caches();
        let syscalls = engine.syscall_numbers();
        let handoff = NativeHandoff::new(options.native_until_thread);

        let collector = Self {
            engine,
            options,
            per_thread,
            modules: ModuleTable::new(),
            global: Mutex::new(None),
            handoff,
            syscalls,
            exited: AtomicBool::new(false),
        };

        if !per_thread {
            let outputs = collector.open_outputs(None)?;
            *lock!(collector.global) = Some(ProcessData::new(outputs));
        }
        notify!(
            collector.options.verbose,
            1,
            "bbcov initialized ({} collection)",
            if per_thread { "per-thread" } else { "process-wide" }
        );

        Ok(collector)
    }

    /// Parses `options` and initializes the collector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for an invalid option string, otherwise see
    /// [`Collector::new`].
    pub fn from_option_string(engine: Arc<E>, options: &str) -> Result<Self> {
        Self::new(engine, Options::parse_str(options)?)
    }

    /// The active options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The engine the collector runs in.
    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The module registry.
    #[must_use]
    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    /// Returns `true` if every thread collects into its own table.
    #[must_use]
    pub fn is_per_thread(&self) -> bool {
        self.per_thread
    }

    /// The native-execution handoff coordinator.
    #[must_use]
    pub fn handoff(&self) -> &NativeHandoff {
        &self.handoff
    }

    /// Returns `true` once the process exit event has run.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Runs `f` on the process context, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`] on a poisoned lock.
    pub fn with_process_data<R>(&self, f: impl FnOnce(Option<&ProcessData>) -> R) -> Result<R> {
        let global = lock!(self.global);
        Ok(f(global.as_ref()))
    }

    /// Module load event.
    ///
    /// # Errors
    ///
    /// See [`ModuleTable::on_module_load`].
    pub fn on_module_load(&self, descriptor: &ModuleDescriptor) -> Result<u32> {
        let id = self.modules.on_module_load(descriptor)?;
        notify!(
            self.options.verbose,
            2,
            "module {} loaded at {:#x}-{:#x}: {}",
            id,
            descriptor.start,
            descriptor.end,
            descriptor.path
        );
        Ok(id)
    }

    /// Module unload event. The entry stays in the table, flagged as unloaded.
    ///
    /// # Errors
    ///
    /// See [`ModuleTable::on_module_unload`].
    pub fn on_module_unload(&self, descriptor: &ModuleDescriptor) -> Result<()> {
        match self.modules.on_module_unload(descriptor)? {
            Some(id) => notify!(self.options.verbose, 2, "module {} unloaded", id),
            None => notify!(
                self.options.verbose,
                1,
                "unload of unknown module at {:#x}-{:#x}",
                descriptor.start,
                descriptor.end
            ),
        }
        Ok(())
    }

    /// Thread start event.
    ///
    /// Counts the thread for the native handoff (performing it if this is the threshold
    /// thread) and creates the thread's context.
    ///
    /// # Errors
    ///
    /// - Handoff failures, see [`NativeHandoff::on_thread_start`]
    /// - Output file creation failures in per-thread mode
    /// - [`Error::MissingContext`] if the process context is gone in process-wide mode
    pub fn on_thread_init(&self, thread: ThreadId) -> Result<ThreadData> {
        if let Some(outcome) =
            self.handoff
                .on_thread_start(self.engine.as_ref(), thread, self.options.verbose)?
        {
            notify!(
                self.options.verbose,
                1,
                "thread {} retook {} of {} suspended threads",
                thread,
                outcome.retaken.len(),
                outcome.suspended
            );
        }

        self.create_thread_data(thread)
    }

    fn create_thread_data(&self, thread: ThreadId) -> Result<ThreadData> {
        if self.per_thread {
            let outputs = self.open_outputs(Some(thread))?;
            return Ok(ThreadData::private(thread, outputs));
        }

        let global = lock!(self.global);
        let process = global.as_ref().ok_or(Error::MissingContext(thread.0))?;
        Ok(ThreadData::shared(thread, process))
    }

    /// Block compilation event.
    ///
    /// Measures the block, resolves its module and appends a record to the thread's
    /// table. Branch detail is recorded when coverage checking is enabled. Translation
    /// callbacks are ignored.
    ///
    /// Returns [`EmitFlags::GoNative`] while threads are meant to run natively.
    ///
    /// # Errors
    ///
    /// Returns an encoding error if the block cannot be represented in a record, see
    /// [`BlockShape::measure`] and [`BlockRecord::locate`].
    pub fn on_basic_block(
        &self,
        data: &mut ThreadData,
        tag: u64,
        instrs: &[Instr],
        for_trace: bool,
        translating: bool,
    ) -> Result<EmitFlags> {
        if translating {
            return Ok(EmitFlags::Default);
        }

        let shape = BlockShape::measure(tag, instrs)?;
        let module = self.modules.lookup(tag, Some(&mut data.cache))?;
        let module = module.as_deref();

        let mut record = BlockRecord::locate(module, tag, shape.size())?;
        if self.options.check_cbr {
            let detail = BlockDetail::locate(module, shape.cbr_target, shape.num_instrs, for_trace)?;
            record = record.with_detail(detail);
        }
        data.table.append(record);

        if self.handoff.is_native() {
            Ok(EmitFlags::GoNative)
        } else {
            Ok(EmitFlags::Default)
        }
    }

    /// Thread exit event.
    ///
    /// In per-thread mode the thread's table is dumped, optionally checked, and destroyed
    /// together with its output files. In process-wide mode only the lightweight context
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing the dump or the coverage result fails.
    pub fn on_thread_exit(&self, data: ThreadData) -> Result<()> {
        let ThreadData {
            thread,
            table,
            outputs,
            ..
        } = data;

        if let Some(mut outputs) = outputs {
            notify!(self.options.verbose, 2, "thread {} exiting, {} blocks", thread, table.len());
            self.report(&table, &mut outputs)?;
        }
        Ok(())
    }

    /// Process fork event, delivered on the child's thread.
    ///
    /// Process-wide mode opens fresh output files for the child and keeps the inherited
    /// table. Per-thread mode discards the calling thread's inherited context and creates
    /// a new one.
    ///
    /// # Errors
    ///
    /// Returns output file creation errors, or [`Error::MissingContext`] if the process
    /// context is gone in process-wide mode.
    pub fn on_fork(&self, thread: ThreadId, data: &mut Option<ThreadData>) -> Result<()> {
        if !self.per_thread {
            let outputs = self.open_outputs(None)?;
            let mut global = lock!(self.global);
            let process = global.as_mut().ok_or(Error::MissingContext(thread.0))?;
            process.outputs = outputs;
            return Ok(());
        }

        drop(data.take());
        *data = Some(self.create_thread_data(thread)?);
        Ok(())
    }

    /// Returns `true` for system calls the collector wants to see in
    /// [`Collector::on_pre_syscall`].
    #[must_use]
    pub fn filter_syscall(&self, sysnum: i32) -> bool {
        self.syscalls.exec == Some(sysnum)
            || (self.options.nudge_kills && self.syscalls.terminate_process == Some(sysnum))
    }

    /// Pre-syscall event. Returns whether the system call should be executed.
    ///
    /// Process replacement is handled as thread exit followed by process exit, after
    /// which the call proceeds. With `nudge_kills`, termination of another process under
    /// the same collector is turned into a nudge carrying the exit code; if the nudge is
    /// delivered the call is skipped with a success result.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Collector::on_thread_exit`] and [`Collector::on_exit`].
    pub fn on_pre_syscall(
        &self,
        thread: ThreadId,
        data: &mut Option<ThreadData>,
        sysnum: i32,
    ) -> Result<bool> {
        if self.syscalls.exec == Some(sysnum) {
            notify!(self.options.verbose, 1, "thread {} replacing the process image", thread);
            if let Some(data) = data.take() {
                self.on_thread_exit(data)?;
            }
            self.on_exit()?;
            return Ok(true);
        }

        if self.options.nudge_kills && self.syscalls.terminate_process == Some(sysnum) {
            let handle = self.engine.syscall_param(thread, 0);
            let target = self
                .engine
                .process_id_of_handle(handle)
                .filter(|&pid| pid != self.engine.process_id());

            if let Some(pid) = target {
                let code = self.engine.syscall_param(thread, 1);
                if code >> 32 != 0 {
                    log::warn!("exit code {code:#x} of process {pid} truncated to 32 bits");
                }
                let argument = u64::from(NUDGE_TERMINATE_PROCESS) | (code << 32);
                if self.engine.nudge_process(pid, argument) {
                    notify!(self.options.verbose, 1, "nudged process {} to exit with {}", pid, code as u32);
                    self.engine.set_syscall_result(thread, 0);
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Nudge event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedNudge`] for any request other than
    /// [`NUDGE_TERMINATE_PROCESS`].
    pub fn on_nudge(&self, argument: u64) -> Result<()> {
        let request = argument as u32;
        if request != NUDGE_TERMINATE_PROCESS {
            return Err(Error::UnsupportedNudge(request));
        }

        let code = (argument >> 32) as u32;
        notify!(self.options.verbose, 1, "terminating on request with {}", code);
        self.engine.exit_process(code);
        Ok(())
    }

    /// Process exit event. Runs at most once; later calls do nothing.
    ///
    /// In process-wide mode the shared table is dumped, optionally checked, and the
    /// process context destroyed. In per-thread mode nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing the dump or the coverage result fails.
    pub fn on_exit(&self) -> Result<()> {
        if self.exited.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let process = lock!(self.global).take();
        if let Some(mut process) = process {
            self.report(&process.table, &mut process.outputs)?;
        }
        notify!(
            self.options.verbose,
            1,
            "process exit, {} modules seen",
            self.modules.len()
        );
        Ok(())
    }

    fn report(&self, table: &BlockTable, outputs: &mut Outputs) -> Result<()> {
        let modules = self.modules.summaries()?;
        let detailed = self.options.check_cbr;

        dump::write_version(&mut outputs.log)?;
        dump::write_module_table(&mut outputs.log, &modules)?;
        table.print(&mut outputs.log, self.options.format(), detailed)?;
        outputs.log.flush()?;

        if let Some(result) = outputs.result.as_mut() {
            let report = CoverageReport::check(table, modules.len());
            report.write(result, &modules, self.options.summary_only)?;
            result.flush()?;
        }
        Ok(())
    }

    fn log_dir(&self) -> PathBuf {
        match &self.options.logdir {
            Some(dir) => dir.clone(),
            None => self
                .engine
                .client_path()
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        }
    }

    fn open_outputs(&self, thread: Option<ThreadId>) -> Result<Outputs> {
        let id = thread.map_or_else(|| u64::from(self.engine.process_id()), |thread| thread.0);
        let application = self.engine.application_name();
        let prefix = log_prefix(&self.log_dir(), application.as_deref(), id);
        Outputs::open(
            &prefix,
            thread.is_some(),
            self.options.check_cbr,
            self.options.verbose,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        block::UNKNOWN_MODULE,
        dump::{Dump, DumpFormat},
        engine::ElisionLimits,
        test::{module_descriptor, MockEngine},
    };

    fn collector(engine: MockEngine, options: &str) -> Collector<MockEngine> {
        Collector::from_option_string(Arc::new(engine), options).unwrap()
    }

    fn block(start: u64, len: u32) -> Vec<Instr> {
        vec![Instr::app(start, len)]
    }

    #[test]
    fn elision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new().with_client_dir(dir.path()).with_elision(ElisionLimits {
            max_elide_jmp: 0,
            max_elide_call: 16,
        });
        let result = Collector::new(Arc::new(engine), Options::default());
        assert!(matches!(result, Err(Error::UnsupportedConfiguration(_))));
    }

    #[test]
    fn records_are_module_relative() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(MockEngine::new().with_client_dir(dir.path()), "");
        collector
            .on_module_load(&module_descriptor(0x40_0000, 0x41_0000, "/bin/app"))
            .unwrap();

        let mut data = collector.on_thread_init(ThreadId(1)).unwrap();
        let instrs = [Instr::app(0x40_1000, 3), Instr::meta(8), Instr::cbr(0x40_1003, 2, 0x40_2000)];
        collector.on_basic_block(&mut data, 0x40_1000, &instrs, false, false).unwrap();
        collector.on_basic_block(&mut data, 0x9000, &block(0x9000, 4), false, false).unwrap();

        let records: Vec<_> = data.table().iter().copied().collect();
        assert_eq!(records.len(), 2);
        assert_eq!((records[0].module_id, records[0].start, records[0].size), (0, 0x1000, 5));
        assert!(records[0].detail.is_none());
        assert_eq!(records[1].module_id, UNKNOWN_MODULE);
        assert_eq!(records[1].start, 0x9000);
    }

    #[test]
    fn translation_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(MockEngine::new().with_client_dir(dir.path()), "");
        let mut data = collector.on_thread_init(ThreadId(1)).unwrap();
        let flags = collector
            .on_basic_block(&mut data, 0x1000, &block(0x1000, 4), false, true)
            .unwrap();
        assert_eq!(flags, EmitFlags::Default);
        assert!(data.table().is_empty());
    }

    #[test]
    fn branch_detail_when_checking() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(MockEngine::new().with_client_dir(dir.path()), "-check_cbr");
        collector
            .on_module_load(&module_descriptor(0x40_0000, 0x41_0000, "/bin/app"))
            .unwrap();

        let mut data = collector.on_thread_init(ThreadId(1)).unwrap();
        let instrs = [Instr::app(0x40_0010, 2), Instr::cbr(0x40_0012, 2, 0x40_0020)];
        collector.on_basic_block(&mut data, 0x40_0010, &instrs, true, false).unwrap();

        let detail = data.table().get(0).unwrap().detail.unwrap();
        assert_eq!(detail.cbr_target, 0x20);
        assert_eq!(detail.num_instrs, 2);
        assert!(detail.trace);
    }

    #[test]
    fn oversized_block_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(MockEngine::new().with_client_dir(dir.path()), "");
        let mut data = collector.on_thread_init(ThreadId(1)).unwrap();

        let ok = [Instr::app(0x1000, 65535)];
        collector.on_basic_block(&mut data, 0x1000, &ok, false, false).unwrap();

        let too_large = [Instr::app(0x1000, 65535), Instr::app(0x1000 + 65535, 1)];
        let error = collector
            .on_basic_block(&mut data, 0x1000, &too_large, false, false)
            .unwrap_err();
        assert!(matches!(error, Error::BlockTooLarge(65536)));
        assert!(error.is_fatal());
        assert_eq!(data.table().len(), 1);
    }

    #[test]
    fn process_mode_shares_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(MockEngine::new().with_client_dir(dir.path()), "-dump_text");
        assert!(!collector.is_per_thread());

        let mut first = collector.on_thread_init(ThreadId(1)).unwrap();
        let mut second = collector.on_thread_init(ThreadId(2)).unwrap();
        assert!(first.shares_table_with(&second));
        assert!(!first.is_private());

        collector.on_basic_block(&mut first, 0x1000, &block(0x1000, 4), false, false).unwrap();
        collector.on_basic_block(&mut second, 0x2000, &block(0x2000, 4), false, false).unwrap();
        collector.on_thread_exit(first).unwrap();
        collector.on_thread_exit(second).unwrap();

        let log = collector
            .with_process_data(|process| process.unwrap().outputs().log.path().to_path_buf())
            .unwrap();
        assert_eq!(fs::metadata(&log).unwrap().len(), 0);

        collector.on_exit().unwrap();
        collector.on_exit().unwrap();
        assert!(collector.has_exited());

        let dump = Dump::from_file(&log).unwrap();
        assert_eq!(dump.format, DumpFormat::Text);
        assert_eq!(dump.records.len(), 2);
        assert!(log.ends_with("bbcov.mock.04242.0000.proc.log"));
    }

    #[test]
    fn default_log_dir_is_client_dir() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new().with_client_dir(dir.path()).with_application(None);
        let collector = collector(engine, "");
        let log = collector
            .with_process_data(|process| process.unwrap().outputs().log.path().to_path_buf())
            .unwrap();
        assert_eq!(log.parent(), Some(dir.path()));
        assert!(log.ends_with("bbcov.unknown.04242.0000.proc.log"));
    }

    #[test]
    fn go_native_until_handoff() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new()
            .with_client_dir(dir.path())
            .with_threads(&[ThreadId(1)])
            .with_native(&[ThreadId(1)]);
        let collector = collector(engine, "-native_until_thread 2");

        let mut first = collector.on_thread_init(ThreadId(1)).unwrap();
        let flags = collector
            .on_basic_block(&mut first, 0x1000, &block(0x1000, 4), false, false)
            .unwrap();
        assert_eq!(flags, EmitFlags::GoNative);

        let _second = collector.on_thread_init(ThreadId(2)).unwrap();
        let flags = collector
            .on_basic_block(&mut first, 0x1004, &block(0x1004, 4), false, false)
            .unwrap();
        assert_eq!(flags, EmitFlags::Default);
        assert_eq!(collector.engine().retaken(), vec![ThreadId(1)]);
    }

    #[test]
    fn per_thread_reports_on_thread_exit() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new().with_client_dir(dir.path()).with_private_caches();
        let collector = collector(engine, "-check_cbr");
        assert!(collector.is_per_thread());
        collector.with_process_data(|process| assert!(process.is_none())).unwrap();

        let mut first = collector.on_thread_init(ThreadId(7)).unwrap();
        let second = collector.on_thread_init(ThreadId(8)).unwrap();
        assert!(first.is_private());
        assert!(!first.shares_table_with(&second));

        collector.on_basic_block(&mut first, 0x1000, &block(0x1000, 4), false, false).unwrap();
        let log = first.outputs().unwrap().log.path().to_path_buf();
        let result = first.outputs().unwrap().result.as_ref().unwrap().path().to_path_buf();
        assert!(log.ends_with("bbcov.mock.00007.0000.thd.log"));
        assert!(result.ends_with("bbcov.mock.00007.0000.thd.res"));

        collector.on_thread_exit(first).unwrap();
        collector.on_thread_exit(second).unwrap();
        collector.on_exit().unwrap();

        let dump = Dump::from_file(&log).unwrap();
        assert!(dump.detailed);
        assert_eq!(dump.records.len(), 1);
        assert!(fs::read_to_string(&result).unwrap().contains("Summary:"));

        let files = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 4);
    }

    #[test]
    fn fork_reopens_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let process = collector(MockEngine::new().with_client_dir(dir.path()), "");
        let mut data = Some(process.on_thread_init(ThreadId(1)).unwrap());

        process.on_fork(ThreadId(1), &mut data).unwrap();
        let log = process
            .with_process_data(|process| process.unwrap().outputs().log.path().to_path_buf())
            .unwrap();
        assert!(log.ends_with("bbcov.mock.04242.0001.proc.log"));
        assert!(data.is_some());

        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new().with_client_dir(dir.path()).with_private_caches();
        let per_thread = collector(engine, "");
        let mut data = Some(per_thread.on_thread_init(ThreadId(3)).unwrap());
        per_thread
            .on_basic_block(data.as_mut().unwrap(), 0x10, &block(0x10, 2), false, false)
            .unwrap();

        per_thread.on_fork(ThreadId(3), &mut data).unwrap();
        let data = data.unwrap();
        assert!(data.table().is_empty());
        assert!(data.outputs().unwrap().log.path().ends_with("bbcov.mock.00003.0001.thd.log"));
    }

    #[test]
    fn exec_reports_before_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(MockEngine::new().with_client_dir(dir.path()), "-dump_text");
        let mut data = Some(collector.on_thread_init(ThreadId(1)).unwrap());
        collector
            .on_basic_block(data.as_mut().unwrap(), 0x10, &block(0x10, 2), false, false)
            .unwrap();

        assert!(collector.filter_syscall(59));
        assert!(collector.on_pre_syscall(ThreadId(1), &mut data, 59).unwrap());
        assert!(data.is_none());
        assert!(collector.has_exited());

        let log = dir.path().join("bbcov.mock.04242.0000.proc.log");
        assert_eq!(Dump::from_file(&log).unwrap().records.len(), 1);
    }

    #[test]
    fn termination_of_other_process_becomes_nudge() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new()
            .with_client_dir(dir.path())
            .with_syscall_params(&[0x80, 9])
            .with_handle(0x80, 77)
            .delivering_nudges();
        let collector = collector(engine, "");
        let mut data = Some(collector.on_thread_init(ThreadId(1)).unwrap());

        assert!(collector.filter_syscall(44));
        assert!(!collector.filter_syscall(1));
        assert!(!collector.on_pre_syscall(ThreadId(1), &mut data, 44).unwrap());
        assert_eq!(collector.engine().nudges(), vec![(77, 1 | (9 << 32))]);
        assert_eq!(collector.engine().syscall_results(), vec![(ThreadId(1), 0)]);
        assert!(data.is_some());
    }

    #[test]
    fn termination_passes_through() {
        let dir = tempfile::tempdir().unwrap();

        // Own process.
        let engine = MockEngine::new()
            .with_client_dir(dir.path())
            .with_syscall_params(&[0x80, 9])
            .with_handle(0x80, 4242)
            .delivering_nudges();
        let own = collector(engine, "");
        assert!(own.on_pre_syscall(ThreadId(1), &mut None, 44).unwrap());
        assert!(own.engine().nudges().is_empty());

        // Undeliverable nudge.
        let engine = MockEngine::new()
            .with_client_dir(dir.path())
            .with_syscall_params(&[0x80, 9])
            .with_handle(0x80, 77);
        let undelivered = collector(engine, "");
        assert!(undelivered.on_pre_syscall(ThreadId(1), &mut None, 44).unwrap());
        assert!(undelivered.engine().syscall_results().is_empty());

        // Disabled.
        let engine = MockEngine::new()
            .with_client_dir(dir.path())
            .with_syscall_params(&[0x80, 9])
            .with_handle(0x80, 77)
            .delivering_nudges();
        let disabled = collector(engine, "-no_nudge_kills");
        assert!(!disabled.filter_syscall(44));
        assert!(disabled.on_pre_syscall(ThreadId(1), &mut None, 44).unwrap());
        assert!(disabled.engine().nudges().is_empty());
    }

    #[test]
    fn nudge_requests() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(MockEngine::new().with_client_dir(dir.path()), "");

        collector.on_nudge(1 | (3 << 32)).unwrap();
        assert_eq!(collector.engine().exit_codes(), vec![3]);

        assert!(matches!(collector.on_nudge(2), Err(Error::UnsupportedNudge(2))));
    }
}
