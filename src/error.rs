use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants follow the failure taxonomy of the collector:
///
/// ## Encoding Violations (fatal)
/// - [`Error::BlockTooLarge`] - A basic block does not fit the 16-bit size field
/// - [`Error::ModuleIdOverflow`] - A module id collides with the unknown-module sentinel
/// - [`Error::OffsetOverflow`] - A module-relative offset does not fit 32 bits
/// - [`Error::ElisionUnsupported`] - The engine elided control transfers inside a block
///
/// ## Coordination Failures (fatal)
/// - [`Error::SuspendFailed`], [`Error::RetakeFailed`], [`Error::ResumeFailed`] - Native handoff
/// - [`Error::MissingContext`] - A thread event arrived without its context
/// - [`Error::LogFileExhausted`] - No fresh log file name could be created
/// - [`Error::UnsupportedNudge`] - A nudge carried an unknown request
/// - [`Error::Lock`] - A poisoned lock
///
/// ## Usage Errors
/// - [`Error::Usage`] - Invalid option string
/// - [`Error::UnsupportedConfiguration`] - The engine runs with options the collector cannot honor
///
/// ## Dump Parsing
/// - [`Error::Malformed`], [`Error::OutOfBounds`], [`Error::Io`]
///
/// # Examples
///
/// ```rust
/// use bbcov::{BlockRecord, Error};
///
/// match BlockRecord::new(0, 0x10, 0x1_0000) {
///     Err(Error::BlockTooLarge(size)) => assert_eq!(size, 0x1_0000),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The observed basic block is larger than the record's 16-bit size field.
    ///
    /// The engine's block-formation policy never produces such blocks under
    /// standard configuration, so this indicates a broken precondition.
    #[error("Basic block size {0} does not fit the 16-bit size field")]
    BlockTooLarge(u64),

    /// The module id can not be represented, because it reaches the unknown-module sentinel.
    #[error("Module id {0} overflows the module id field")]
    ModuleIdOverflow(u64),

    /// An address is too far from its module base to be stored as a 32-bit offset.
    #[error("Address {address:#x} is not encodable relative to module base {base:#x}")]
    OffsetOverflow {
        /// The address that was observed
        address: u64,
        /// Base address of the module containing it
        base: u64,
    },

    /// The engine handed over a block whose instructions have been elided or reordered.
    ///
    /// Block sizes are computed from application instruction addresses, which only works
    /// when the engine does not elide control transfer instructions.
    #[error("Elided block at {0:#x} - control transfer elision is not supported")]
    ElisionUnsupported(u64),

    /// The engine runs with a configuration the collector can not work with.
    #[error("Unsupported engine configuration - {0}")]
    UnsupportedConfiguration(String),

    /// The option string handed to the collector is invalid.
    #[error("Usage error - {0}")]
    Usage(String),

    /// Suspending all other threads for the native handoff failed.
    #[error("Failed to suspend threads - {0}")]
    SuspendFailed(String),

    /// A natively running thread could not be retaken under instrumentation.
    #[error("Failed to retake native thread {0}")]
    RetakeFailed(u64),

    /// Resuming the suspended threads after the native handoff failed.
    #[error("Failed to resume {0} suspended threads")]
    ResumeFailed(usize),

    /// A thread event was delivered for a thread without a collector context.
    #[error("Thread {0} has no coverage context")]
    MissingContext(u64),

    /// Every candidate log file name was already taken.
    #[error("Could not create a fresh log file for prefix {0}")]
    LogFileExhausted(String),

    /// A nudge was received with a request this collector does not understand.
    #[error("Unsupported nudge request {0}")]
    UnsupportedNudge(u32),

    /// The dump is damaged and could not be parsed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding binary records.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// File I/O error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    Lock,
}

impl Error {
    /// Returns `true` for errors after which the coverage data can no longer be trusted.
    ///
    /// Engine glue is expected to abort the process with a diagnostic on any fatal error,
    /// since continuing would produce silently wrong coverage. Usage errors are reported
    /// before instrumentation starts; parsing errors only concern offline tooling.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Usage(_)
                | Error::UnsupportedConfiguration(_)
                | Error::Malformed { .. }
                | Error::OutOfBounds
        )
    }

    /// Returns `true` if the error is a configuration problem detected at startup.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_) | Error::UnsupportedConfiguration(_))
    }
}
