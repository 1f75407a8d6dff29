//! End-to-end tests driving the collector through a scripted engine.
//!
//! Every test runs against its own temporary log directory and parses the written dumps
//! back with [`Dump::from_file`].

mod common;

use std::{fs, sync::Arc, thread};

use bbcov::{prelude::*, Result};
use common::{branch_block, files_with_extension, straight_block, TestEngine, EXEC};

#[test]
fn test_blocks_after_unload_are_unknown() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Arc::new(TestEngine::new(dir.path()));
    let collector = Collector::from_option_string(engine, "-dump_text")?;

    let app = ModuleDescriptor::new(0x40_0000, 0x41_0000, "/usr/bin/app");
    let mut data = collector.on_thread_init(ThreadId(1))?;
    let id = collector.on_module_load(&app)?;

    for i in 0..5u64 {
        let start = 0x40_1000 + i * 0x10;
        collector.on_basic_block(&mut data, start, &straight_block(start, 4), false, false)?;
    }
    collector.on_module_unload(&app)?;
    collector.on_basic_block(&mut data, 0x50_0000, &straight_block(0x50_0000, 2), false, false)?;

    collector.on_thread_exit(data)?;
    collector.on_exit()?;

    let logs = files_with_extension(dir.path(), ".proc.log");
    assert_eq!(logs.len(), 1);
    let dump = Dump::from_file(&logs[0])?;

    assert_eq!(dump.version, 1);
    assert_eq!(dump.modules.len(), 1);
    assert_eq!(dump.modules[0].state, ModuleState::Unloaded);
    assert_eq!(dump.modules[0].descriptor.path, "/usr/bin/app");

    assert_eq!(dump.records.len(), 6);
    assert!(dump.records[..5].iter().all(|r| r.module_id == id && r.size == 8));
    assert_eq!(dump.records[0].start, 0x1000);
    assert_eq!(dump.records[4].start, 0x1040);
    assert!(dump.records[5].is_unknown_module());
    assert_eq!(dump.records[5].start, 0x50_0000);
    Ok(())
}

#[test]
fn test_per_thread_dumps_are_independent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Arc::new(TestEngine::new(dir.path()).private_caches());
    let collector = Arc::new(Collector::from_option_string(engine, "-dump_text")?);
    collector.on_module_load(&ModuleDescriptor::new(0x1_0000, 0x2_0000, "/lib/libwork.so"))?;

    let handles: Vec<_> = (1..=3u64)
        .map(|t| {
            let collector = collector.clone();
            thread::spawn(move || -> Result<()> {
                let mut data = collector.on_thread_init(ThreadId(t))?;
                for i in 0..t {
                    let start = 0x1_0000 + t * 0x1000 + i * 0x10;
                    collector.on_basic_block(&mut data, start, &straight_block(start, 2), false, false)?;
                }
                collector.on_thread_exit(data)
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }

    let before = files_with_extension(dir.path(), ".thd.log");
    collector.on_exit()?;
    assert_eq!(files_with_extension(dir.path(), ".thd.log"), before);
    assert!(files_with_extension(dir.path(), ".proc.log").is_empty());

    assert_eq!(before.len(), 3);
    for (t, log) in (1..=3u64).zip(&before) {
        assert!(log
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&format!("bbcov.app.{t:05}.")));

        let dump = Dump::from_file(log)?;
        assert_eq!(dump.records.len(), t as usize);
        assert!(dump
            .records
            .iter()
            .all(|r| r.module_id == 0 && (r.start >> 12) as u64 == t));
    }
    Ok(())
}

#[test]
fn test_branch_check_reports_missed_fallthrough() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Arc::new(TestEngine::new(dir.path()));
    let collector = Collector::from_option_string(engine, "-check_cbr")?;
    collector.on_module_load(&ModuleDescriptor::new(0x40_0000, 0x41_0000, "/usr/bin/app"))?;

    let mut data = collector.on_thread_init(ThreadId(1))?;
    collector.on_basic_block(&mut data, 0x40_0010, &branch_block(0x40_0010, 0x40_0020), false, false)?;
    collector.on_basic_block(&mut data, 0x40_0020, &straight_block(0x40_0020, 2), false, false)?;
    collector.on_thread_exit(data)?;
    collector.on_exit()?;

    let logs = files_with_extension(dir.path(), ".proc.log");
    let dump = Dump::from_file(&logs[0])?;
    assert_eq!(dump.format, DumpFormat::Binary);
    assert!(dump.detailed);
    assert_eq!(dump.records[0].branch_target(), Some(0x20));

    let results = files_with_extension(dir.path(), ".proc.res");
    assert_eq!(results.len(), 1);
    let result = fs::read_to_string(&results[0])?;
    assert!(result.contains("module[  0]: 0x00000010 to 0x00000015"));
    assert!(result.contains("\tunique conditional branch fallthroughs: 1, not exercised: 1,"));
    assert!(result.contains("\tunique conditional branch targets: 1, not exercised: 0,"));

    let report = CoverageReport::check(&dump.records, dump.modules.len());
    assert_eq!(report.module(0).unwrap().misses(), 1);
    Ok(())
}

#[test]
fn test_summary_only_omits_misses() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Arc::new(TestEngine::new(dir.path()));
    let collector = Collector::from_option_string(engine, "-check_cbr -summary_only")?;

    let mut data = collector.on_thread_init(ThreadId(1))?;
    collector.on_basic_block(&mut data, 0x10, &branch_block(0x10, 0x80), false, false)?;
    collector.on_exit()?;

    let results = files_with_extension(dir.path(), ".proc.res");
    let result = fs::read_to_string(&results[0])?;
    assert!(!result.contains("not exercised:\n"));
    assert!(result.contains("basic blocks from unknown module"));
    Ok(())
}

#[test]
fn test_native_threads_are_retaken() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Arc::new(TestEngine::new(dir.path()));
    let collector = Collector::from_option_string(engine.clone(), "-native_until_thread 3")?;

    let mut first = collector.on_thread_init(ThreadId(1))?;
    let hint = collector.on_basic_block(&mut first, 0x10, &straight_block(0x10, 1), false, false)?;
    assert_eq!(hint, EmitFlags::GoNative);
    engine.spawn(ThreadId(1), true);

    let _second = collector.on_thread_init(ThreadId(2))?;
    engine.spawn(ThreadId(2), true);
    assert!(collector.handoff().is_native());

    let mut third = collector.on_thread_init(ThreadId(3))?;
    assert!(!collector.handoff().is_native());
    assert_eq!(collector.handoff().thread_count(), 3);
    assert!(engine.native().is_empty());
    assert_eq!(engine.retaken().len(), 2);

    let hint = collector.on_basic_block(&mut third, 0x20, &straight_block(0x20, 1), false, false)?;
    assert_eq!(hint, EmitFlags::Default);
    Ok(())
}

#[test]
fn test_exec_writes_dump_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Arc::new(TestEngine::new(dir.path()));
    let collector = Collector::from_option_string(engine, "-dump_text")?;

    let mut data = Some(collector.on_thread_init(ThreadId(1))?);
    if let Some(data) = data.as_mut() {
        collector.on_basic_block(data, 0x10, &straight_block(0x10, 1), false, false)?;
    }

    assert!(collector.filter_syscall(EXEC));
    assert!(collector.on_pre_syscall(ThreadId(1), &mut data, EXEC)?);
    assert!(data.is_none());

    // The engine still delivers its own exit event afterwards.
    collector.on_exit()?;

    let logs = files_with_extension(dir.path(), ".proc.log");
    assert_eq!(logs.len(), 1);
    assert_eq!(Dump::from_file(&logs[0])?.records.len(), 1);
    Ok(())
}

#[test]
fn test_fork_child_gets_new_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Arc::new(TestEngine::new(dir.path()));
    let collector = Collector::from_option_string(engine, "")?;

    let mut data = Some(collector.on_thread_init(ThreadId(1))?);
    collector.on_fork(ThreadId(1), &mut data)?;
    collector.on_exit()?;

    let logs = files_with_extension(dir.path(), ".proc.log");
    assert_eq!(logs.len(), 2);
    assert!(logs[0].ends_with("bbcov.app.01234.0000.proc.log"));
    assert!(logs[1].ends_with("bbcov.app.01234.0001.proc.log"));
    assert_eq!(fs::metadata(&logs[0])?.len(), 0);
    assert_eq!(Dump::from_file(&logs[1])?.records.len(), 0);
    Ok(())
}

#[test]
fn test_existing_logs_are_preserved() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let taken = dir.path().join("bbcov.app.01234.0000.proc.log");
    fs::write(&taken, "previous run")?;

    let engine = Arc::new(TestEngine::new(dir.path()));
    let collector = Collector::from_option_string(engine, "")?;
    collector.on_exit()?;

    assert_eq!(fs::read_to_string(&taken)?, "previous run");
    assert!(dir.path().join("bbcov.app.01234.0001.proc.log").exists());
    Ok(())
}

#[test]
fn test_logdir_option() -> Result<()> {
    let client = tempfile::tempdir()?;
    let logs = tempfile::tempdir()?;
    let engine = Arc::new(TestEngine::new(client.path()));
    let options = format!("-logdir \"{}\"", logs.path().display());
    let collector = Collector::from_option_string(engine, &options)?;
    collector.on_exit()?;

    assert!(files_with_extension(client.path(), ".proc.log").is_empty());
    assert_eq!(files_with_extension(logs.path(), ".proc.log").len(), 1);
    Ok(())
}

#[test]
fn test_invalid_options_are_usage_errors() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(TestEngine::new(dir.path()));
    let error = Collector::from_option_string(engine, "-frobnicate").err().unwrap();
    assert!(error.is_usage());
    assert!(files_with_extension(dir.path(), ".log").is_empty());
}
