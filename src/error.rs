//! Error types and exit codes for bundlescope

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for bundlescope operations
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("IO error: {0}")]
    FileIo(#[from] std::io::Error),

    #[error("Failed to parse source: {message}")]
    ParseFailed { message: String },

    #[error("Function boundary not resolved within {limit} bytes of offset {offset}; retry with the tree-based fallback (drop --no-ast-fallback)")]
    BoundaryScanExceeded { offset: usize, limit: usize },

    #[error("Offset {offset} is not inside any function (module scope)")]
    OffsetOutsideFunction { offset: usize },

    #[error("Invalid pattern: {message}")]
    PatternInvalid { message: String },

    #[error("Pattern not found: {pattern}")]
    PatternNotFound { pattern: String },

    #[error("Pattern is ambiguous ({count} matches): {pattern}")]
    PatternAmbiguous { pattern: String, count: usize },
}

impl BundleError {
    /// Convert error to the documented exit code:
    /// - 0: Success
    /// - 1: Failure, not found, or invalid arguments
    /// - 2: Ambiguous pattern (uniqueness-checking commands)
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::PatternAmbiguous { .. } => ExitCode::from(2),
            _ => ExitCode::from(1),
        }
    }
}

/// Result type alias for bundlescope operations
pub type Result<T> = std::result::Result<T, BundleError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ExitCode carries no PartialEq; compare through Debug
    fn code_repr(code: ExitCode) -> String {
        format!("{:?}", code)
    }

    #[test]
    fn test_ambiguous_maps_to_exit_2() {
        let err = BundleError::PatternAmbiguous {
            pattern: "dup".to_string(),
            count: 2,
        };
        assert_eq!(code_repr(err.exit_code()), code_repr(ExitCode::from(2)));
    }

    #[test]
    fn test_other_errors_map_to_exit_1() {
        let err = BundleError::PatternNotFound {
            pattern: "missing".to_string(),
        };
        assert_eq!(code_repr(err.exit_code()), code_repr(ExitCode::from(1)));

        let err = BundleError::OffsetOutsideFunction { offset: 0 };
        assert_eq!(code_repr(err.exit_code()), code_repr(ExitCode::from(1)));
    }
}
