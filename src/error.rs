//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use thiserror::Error;

/// Main error type for pfdeconv operations
#[derive(Error, Debug)]
pub enum DeconvError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input path was not provided
    #[error("Missing file name: {what}")]
    FileNameMissing { what: String },

    /// Malformed table rows, out-of-range PLAF, mismatched loci across files
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors (invalid CLI argument combinations)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Parse errors with the offending line number
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// All emissions vanished at a locus during an HMM pass
    #[error("Numeric underflow at locus {locus}")]
    NumericUnderflow { locus: usize },
}

/// Type alias for Results using DeconvError
pub type Result<T> = std::result::Result<T, DeconvError>;

impl DeconvError {
    /// Create a missing-file-name error
    pub fn file_name_missing(what: impl Into<String>) -> Self {
        Self::FileNameMissing { what: what.into() }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
