use thiserror::Error;

/// Builds an [`Error::Codegen`] carrying the source location of the failure.
macro_rules! codegen_error {
    ($msg:expr) => {
        crate::Error::Codegen(format!("{} ({}:{})", $msg, file!(), line!()))
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Codegen(format!("{} ({}:{})", format!($fmt, $($arg)*), file!(), line!()))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only conditions that abort a whole run are represented here. A template that does not match
/// is not an error (matchers return `None`), and a failed sandbox evaluation is terminal for a
/// single site only; see [`crate::oracle::OracleError`].
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Parse`] - The script could not be parsed; no output is produced
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// ## Output Errors
/// - [`Error::Codegen`] - The mutated tree could not be printed or a snippet could not be reparsed
///
/// ## Runtime Errors
/// - [`Error::Sandbox`] - The sandbox worker could not be started
/// - [`Error::Error`] - Generic error
///
/// # Examples
///
/// ```rust
/// use deconfuser::Error;
///
/// match deconfuser::deobfuscate("function (") {
///     Err(Error::Parse { message, offset }) => eprintln!("parse error at {offset}: {message}"),
///     Err(e) => eprintln!("other error: {e}"),
///     Ok(text) => println!("{text}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input script could not be parsed.
    ///
    /// A hard parse failure aborts the run; recoverable parser diagnostics are tolerated
    /// and kept on the tree instead.
    #[error("Parse error at offset {offset}: {message}")]
    Parse {
        /// Parser diagnostic
        message: String,
        /// Byte offset into the input where the parser gave up
        offset: u32,
    },

    /// Printing the tree or reparsing a generated snippet failed.
    #[error("Code generation failed - {0}")]
    Codegen(String),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// The sandbox worker thread could not be started.
    #[error("Sandbox unavailable - {0}")]
    Sandbox(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
