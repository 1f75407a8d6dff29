#![allow(unused_macros)]

/// Helper macro for locking items, propagating a poisoned lock as [`crate::Error::Lock`]
///
/// ```rust, ignore
///  let mut data = lock!(my_mutex);
///  data.some_field = 42;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::Lock)?
    };
}

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let data = read_lock!(my_rwlock);
///  println!("{}", data.some_field);
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().map_err(|_| crate::Error::Lock)?
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut data = write_lock!(my_rwlock);
///  data.some_field = 42;
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().map_err(|_| crate::Error::Lock)?
    };
}

/// Emits a diagnostic notice if the configured verbosity reaches `level`
///
/// Level 0 notices are always shown as warnings, level 1 maps to `info`,
/// anything above to `debug`.
///
/// ```rust, ignore
///  notify!(self.options.verbose, 1, "created log file {}", path.display());
/// ```
macro_rules! notify {
    ($verbose:expr, $level:expr, $($arg:tt)*) => {
        if $verbose >= $level {
            match $level {
                0 => log::warn!($($arg)*),
                1 => log::info!($($arg)*),
                _ => log::debug!($($arg)*),
            }
        }
    };
}
