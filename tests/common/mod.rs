//! A minimal engine driving the collector from integration tests.

#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use bbcov::prelude::*;

pub const PID: u32 = 1234;
pub const EXEC: i32 = 59;

pub struct TestEngine {
    client_path: PathBuf,
    private_caches: bool,
    threads: Mutex<Vec<ThreadId>>,
    native: Mutex<Vec<ThreadId>>,
    retaken: Mutex<Vec<ThreadId>>,
}

impl TestEngine {
    pub fn new(dir: &Path) -> Self {
        Self {
            client_path: dir.join("libbbcov.so"),
            private_caches: false,
            threads: Mutex::new(Vec::new()),
            native: Mutex::new(Vec::new()),
            retaken: Mutex::new(Vec::new()),
        }
    }

    pub fn private_caches(mut self) -> Self {
        self.private_caches = true;
        self
    }

    /// Registers a running thread, optionally executing natively.
    pub fn spawn(&self, thread: ThreadId, native: bool) {
        self.threads.lock().unwrap().push(thread);
        if native {
            self.native.lock().unwrap().push(thread);
        }
    }

    pub fn native(&self) -> Vec<ThreadId> {
        self.native.lock().unwrap().clone()
    }

    pub fn retaken(&self) -> Vec<ThreadId> {
        self.retaken.lock().unwrap().clone()
    }
}

impl Engine for TestEngine {
    fn process_id(&self) -> u32 {
        PID
    }

    fn application_name(&self) -> Option<String> {
        Some("app".to_string())
    }

    fn client_path(&self) -> PathBuf {
        self.client_path.clone()
    }

    fn uses_private_caches(&self) -> bool {
        self.private_caches
    }

    fn syscall_numbers(&self) -> SyscallNumbers {
        SyscallNumbers {
            exec: Some(EXEC),
            terminate_process: None,
        }
    }

    fn suspend_all_other_threads(&self, current: ThreadId) -> Option<Vec<ThreadId>> {
        let threads = self.threads.lock().unwrap();
        Some(threads.iter().copied().filter(|&t| t != current).collect())
    }

    fn is_thread_native(&self, thread: ThreadId) -> bool {
        self.native.lock().unwrap().contains(&thread)
    }

    fn retake_native_thread(&self, thread: ThreadId) -> bool {
        self.native.lock().unwrap().retain(|&t| t != thread);
        self.retaken.lock().unwrap().push(thread);
        true
    }

    fn resume_all_other_threads(&self, _threads: &[ThreadId]) -> bool {
        true
    }
}

/// A block of `count` two-byte application instructions starting at `start`.
pub fn straight_block(start: u64, count: u32) -> Vec<Instr> {
    (0..count)
        .map(|i| Instr::app(start + u64::from(i) * 2, 2))
        .collect()
}

/// A block of two application instructions ending in a branch to `target`.
pub fn branch_block(start: u64, target: u64) -> Vec<Instr> {
    vec![Instr::app(start, 3), Instr::cbr(start + 3, 2, target)]
}

/// Files in `dir` with the given extension, sorted by name.
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.to_string_lossy().ends_with(extension))
        .collect();
    files.sort();
    files
}
