//! Error types for market clearing.
//!
//! [`ClearingError`] is the taxonomy of failures for one market period: bad
//! tables, a dispatch the solver could not produce, or a price scan that
//! could not settle on a price. All three are fatal to the period and are
//! surfaced to the caller as-is.
//!
//! [`CpmError`] wraps clearing failures together with the I/O, parsing and
//! configuration errors of the surrounding tooling, so binaries can use a
//! single error type at their boundary.
//!
//! ```ignore
//! use cpm_core::{CpmError, CpmResult};
//!
//! fn run(path: &str) -> CpmResult<()> {
//!     let period = load_period(path)?;
//!     clear(&period)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Failure to clear a single market period.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClearingError {
    /// Malformed bid tables, detected before any solve.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The solver reported an infeasible, unbounded, timed-out or unknown
    /// outcome. No partial dispatch is returned.
    #[error("dispatch infeasible: {0}")]
    DispatchInfeasible(String),

    /// The merit-order scan could not settle on a price, which means the
    /// dispatch is inconsistent with the generator table.
    #[error("price resolution failed: {0}")]
    PriceResolutionFailed(String),
}

impl ClearingError {
    /// Short machine-friendly tag for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClearingError::InvalidInput(_) => "invalid_input",
            ClearingError::DispatchInfeasible(_) => "dispatch_infeasible",
            ClearingError::PriceResolutionFailed(_) => "price_resolution_failed",
        }
    }
}

/// Unified error type for library and tool boundaries.
#[derive(Error, Debug)]
pub enum CpmError {
    /// I/O errors (reading tables, writing reports)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Market clearing errors
    #[error(transparent)]
    Clearing(#[from] ClearingError),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias for results using [`CpmError`].
pub type CpmResult<T> = Result<T, CpmError>;

impl From<anyhow::Error> for CpmError {
    fn from(err: anyhow::Error) -> Self {
        CpmError::Other(err.to_string())
    }
}

impl From<String> for CpmError {
    fn from(s: String) -> Self {
        CpmError::Other(s)
    }
}

impl From<&str> for CpmError {
    fn from(s: &str) -> Self {
        CpmError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CpmError {
    fn from(err: serde_json::Error) -> Self {
        CpmError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClearingError::DispatchInfeasible("capacity 100 MW < load 120 MW".into());
        assert!(err.to_string().starts_with("dispatch infeasible"));
        assert!(err.to_string().contains("120 MW"));
        assert_eq!(err.kind(), "dispatch_infeasible");
    }

    #[test]
    fn test_clearing_error_converts_transparently() {
        let err: CpmError = ClearingError::InvalidInput("empty generator table".into()).into();
        assert!(matches!(err, CpmError::Clearing(ClearingError::InvalidInput(_))));
        assert_eq!(err.to_string(), "invalid input: empty generator table");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CpmError = io_err.into();
        assert!(matches!(err, CpmError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> Result<(), ClearingError> {
            Err(ClearingError::PriceResolutionFailed("scan ran off the table".into()))
        }

        fn outer() -> CpmResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
