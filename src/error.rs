use thiserror::Error;

/// The main error type for the chartwright crate.
///
/// All fallible operations in the library return this type. It uses the
/// `thiserror` crate to provide automatic implementation of
/// `std::error::Error` and `Display`, making error handling consistent and
/// ergonomic.
///
/// Errors are fatal at the point of detection: there is no recovery and no
/// partial output. The `Display` rendering is the user-visible failure
/// message, one of `*** PARSE ERROR: <msg>` or `*** ERROR: <msg>`, matching
/// what an embedding command-line shell prints to the error stream before
/// exiting with code 1.
#[derive(Error, Debug)]
pub enum ChartwrightError {
    /// A syntax or semantic error in the chart script.
    ///
    /// The message carries the full rendered diagnostic: the macro call
    /// stack (innermost last), the `file (line,column):` location header,
    /// the offending source line, and a caret under the reference column.
    #[error("*** PARSE ERROR: {0}")]
    Parse(String),

    /// Invalid data encountered outside the parse path, such as an
    /// impossible axis range constructed from otherwise well-formed input.
    #[error("*** ERROR: {0}")]
    Data(String),

    /// I/O failure while reading script files or loading segments.
    ///
    /// This variant automatically converts `std::io::Error` instances, so
    /// the `?` operator works directly on file operations.
    #[error("*** ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// An unexpected internal condition, indicating a bug in the library
    /// rather than in the input.
    #[error("*** ERROR: internal: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChartwrightError>;
