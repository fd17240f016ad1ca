#![deny(missing_docs)]

//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace.
//!
//! Only failures that callers must react to are errors. An inconclusive fine
//! validation or an exhausted domain exploration is reported through the
//! return value of those routines instead.

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// A schema fragment could not be turned into a parameter node.
    #[from(ignore)]
    #[display("Creation Error: {_0}")]
    Creation(String),

    /// A mutating call reached a node owned by a read-only template.
    #[from(ignore)]
    #[display("Read-only Violation: {_0}")]
    ReadOnly(String),

    /// An externally supplied value does not fit the node's declared type.
    #[from(ignore)]
    #[display("Type Mismatch: {_0}")]
    TypeMismatch(String),

    /// A structural or REST path string is malformed or points nowhere.
    #[from(ignore)]
    #[display("Invalid Path: {_0}")]
    InvalidPath(String),

    /// A node handle does not belong to (or no longer lives in) the operation.
    #[from(ignore)]
    #[display("Unknown Node: {_0}")]
    UnknownNode(String),

    /// Wrapper for JSON errors.
    #[display("JSON Error: {_0}")]
    Json(serde_json::Error),

    /// Wrapper for YAML errors.
    #[display("YAML Error: {_0}")]
    Yaml(serde_yaml::Error),

    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Shorthand for a read-only violation naming the rejected call.
    pub(crate) fn read_only(action: &str) -> Self {
        AppError::ReadOnly(format!("cannot {} on a read-only operation", action))
    }

    /// Returns true if the error is a read-only violation.
    pub fn is_read_only(&self) -> bool {
        matches!(self, AppError::ReadOnly(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_conversion() {
        let io_err = Error::new(ErrorKind::Other, "test");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_string_conversion() {
        let msg = String::from("something wrong");
        let app_err: AppError = msg.into();
        match app_err {
            AppError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to AppError::General"),
        }
    }

    #[test]
    fn test_read_only_display() {
        let err = AppError::read_only("set value");
        assert!(err.is_read_only());
        assert_eq!(
            format!("{}", err),
            "Read-only Violation: cannot set value on a read-only operation"
        );
    }
}
