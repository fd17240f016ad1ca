#![deny(missing_docs)]

//! # CLI Errors
//!
//! Error types for the CLI crate.

use apiprobe_core::AppError;
use derive_more::{Display, From};

/// Main error enum for CLI operations.
#[derive(Debug, Display, From)]
pub enum CliError {
    /// Failure reported by the core library.
    #[display("{}", _0)]
    Core(AppError),

    /// IO Error wrapper.
    #[display("IO Error: {}", _0)]
    Io(std::io::Error),

    /// A command line value could not be used.
    #[from(ignore)]
    #[display("Invalid argument: {}", _0)]
    Argument(String),

    /// General failure message.
    #[display("Operation failed: {}", _0)]
    General(String),
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Core(AppError::Json(err))
    }
}

/// Manual implementation of the standard Error trait.
///
/// `General(String)` and `Argument(String)` hold no error source.
impl std::error::Error for CliError {}

/// Result type alias.
pub type CliResult<T> = Result<T, CliError>;
