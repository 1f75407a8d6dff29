//! Delayed handoff from native to instrumented execution.
//!
//! With a threshold of `N > 0`, the first threads of the process run natively: every
//! block they compile asks the engine to let the thread go native. When the `N`-th thread
//! starts, that thread takes over everyone else exactly once:
//!
//! 1. suspend every other thread
//! 2. retake each suspended thread that runs natively, leaving instrumented ones alone
//! 3. resume every suspended thread
//!
//! Resume is attempted even after a failed retake, so no thread is left frozen. Any
//! failing step is fatal; there is no partial state to continue from.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::{
    engine::{Engine, ThreadId},
    Error, Result,
};

/// What a completed handoff did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffOutcome {
    /// Number of threads that were suspended
    pub suspended: usize,
    /// Natively running threads brought back under instrumentation
    pub retaken: Vec<ThreadId>,
}

/// One-shot coordinator of the native-execution handoff.
#[derive(Debug)]
pub struct NativeHandoff {
    threshold: u32,
    go_native: AtomicBool,
    thread_count: AtomicU32,
}

impl NativeHandoff {
    /// Creates the coordinator; a `threshold` of `0` disables native execution.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            go_native: AtomicBool::new(threshold > 0),
            thread_count: AtomicU32::new(0),
        }
    }

    /// Returns `true` while new blocks should let their thread go native.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.go_native.load(Ordering::Acquire)
    }

    /// Number of threads counted so far.
    #[must_use]
    pub fn thread_count(&self) -> u32 {
        self.thread_count.load(Ordering::Acquire)
    }

    /// Counts a starting thread and performs the handoff if it is the threshold thread.
    ///
    /// Returns the outcome if this call performed the handoff.
    ///
    /// # Errors
    ///
    /// - [`Error::SuspendFailed`] if not all other threads could be suspended
    /// - [`Error::RetakeFailed`] for the first native thread that could not be retaken
    /// - [`Error::ResumeFailed`] if the suspended threads could not be resumed
    pub fn on_thread_start<E>(
        &self,
        engine: &E,
        thread: ThreadId,
        verbose: u32,
    ) -> Result<Option<HandoffOutcome>>
    where
        E: Engine + ?Sized,
    {
        if self.threshold == 0 {
            return Ok(None);
        }

        let count = self.thread_count.fetch_add(1, Ordering::AcqRel) + 1;
        notify!(verbose, 1, "new thread #{} {}", count, thread);
        if count != self.threshold {
            return Ok(None);
        }

        if self
            .go_native
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }

        notify!(verbose, 1, "thread {} suspending all threads", thread);
        self.take_over(engine, thread, verbose).map(Some)
    }

    fn take_over<E>(&self, engine: &E, thread: ThreadId, verbose: u32) -> Result<HandoffOutcome>
    where
        E: Engine + ?Sized,
    {
        let threads = engine
            .suspend_all_other_threads(thread)
            .ok_or_else(|| {
                Error::SuspendFailed(format!("thread {thread} failed to suspend all other threads"))
            })?;
        notify!(verbose, 1, "suspended {} threads", threads.len());

        let mut retaken = Vec::new();
        let mut failure = None;
        for (index, &other) in threads.iter().enumerate() {
            if !engine.is_thread_native(other) {
                notify!(verbose, 2, "thread #{} {} under instrumentation", index, other);
                continue;
            }

            notify!(verbose, 2, "taking over thread #{} {}", index, other);
            if engine.retake_native_thread(other) {
                retaken.push(other);
            } else if failure.is_none() {
                failure = Some(Error::RetakeFailed(other.0));
            }
        }

        if !engine.resume_all_other_threads(&threads) {
            return Err(Error::ResumeFailed(threads.len()));
        }
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(HandoffOutcome {
            suspended: threads.len(),
            retaken,
        })
    }
}
