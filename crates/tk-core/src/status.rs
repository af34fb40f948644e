//! Value-based validation results.
//!
//! Every recoverable failure a caller can trigger with shapes, dtypes or
//! operator parameters is reported as a [`StatusError`] through [`Status`].
//! Misuse of a configured kernel is a defect in the calling code instead and
//! aborts through [`contract_violation!`](crate::contract_violation).

use std::fmt;

use thiserror::Error;
use tk_tensor::TensorError;

/// Closed error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Incompatible dimensions or a failed broadcast.
    ShapeMismatch,
    /// Element type not handled by the operator, or mixed where equal types
    /// are required.
    UnsupportedDataType,
    /// Parameters that are individually well-formed but not supported together.
    UnsupportedParameterCombination,
    /// Strides inconsistent with the shape and element size.
    InvalidStride,
    /// Configure or run called against the contract. Fatal: this kind is
    /// only ever used in panic messages, never returned in a [`Status`].
    ProgrammerContractViolation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ShapeMismatch => "shape mismatch",
            ErrorKind::UnsupportedDataType => "unsupported data type",
            ErrorKind::UnsupportedParameterCombination => "unsupported parameter combination",
            ErrorKind::InvalidStride => "invalid stride",
            ErrorKind::ProgrammerContractViolation => "programmer contract violation",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StatusError {
    kind: ErrorKind,
    message: String,
}

impl StatusError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        StatusError {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<TensorError> for StatusError {
    fn from(e: TensorError) -> Self {
        let kind = match &e {
            TensorError::ShapeMismatch { .. }
            | TensorError::BroadcastError { .. }
            | TensorError::ZeroExtent { .. }
            | TensorError::RankTooLarge { .. }
            | TensorError::OutOfBounds { .. } => ErrorKind::ShapeMismatch,
            TensorError::DTypeMismatch { .. } => ErrorKind::UnsupportedDataType,
            TensorError::InvalidStride { .. } => ErrorKind::InvalidStride,
            TensorError::NotResizable | TensorError::Other(_) => {
                ErrorKind::UnsupportedParameterCombination
            }
        };
        StatusError::new(kind, e.to_string())
    }
}

/// Result of a validation: `Ok(())` or the first failure found.
pub type Status = std::result::Result<(), StatusError>;

/// Return a [`StatusError`] of the given kind from the enclosing function
/// when the condition does not hold.
///
/// ```ignore
/// ensure_status!(a.dtype() == b.dtype(), UnsupportedDataType, "{} vs {}", a.dtype(), b.dtype());
/// ```
#[macro_export]
macro_rules! ensure_status {
    ($cond:expr, $kind:ident, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::status::StatusError::new(
                $crate::status::ErrorKind::$kind,
                format!($($arg)+),
            ));
        }
    };
}

/// Abort on a programmer contract violation.
#[macro_export]
macro_rules! contract_violation {
    ($($arg:tt)+) => {
        panic!(
            "{}: {}",
            $crate::status::ErrorKind::ProgrammerContractViolation,
            format_args!($($arg)+)
        )
    };
}

/// Abort on a programmer contract violation unless the condition holds.
#[macro_export]
macro_rules! contract_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::contract_violation!($($arg)+);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_positive(v: i32) -> Status {
        ensure_status!(v > 0, UnsupportedParameterCombination, "value {} must be positive", v);
        Ok(())
    }

    #[test]
    fn test_ensure_status() {
        assert!(check_positive(3).is_ok());
        let err = check_positive(-1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameterCombination);
        assert_eq!(err.message(), "value -1 must be positive");
        assert_eq!(
            err.to_string(),
            "unsupported parameter combination: value -1 must be positive"
        );
    }

    #[test]
    fn test_from_tensor_error() {
        let e: StatusError = TensorError::BroadcastError {
            a: vec![3, 3],
            b: vec![4, 4],
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::ShapeMismatch);

        let e: StatusError = TensorError::InvalidStride {
            dim: 1,
            stride: 3,
            reason: "odd".to_string(),
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::InvalidStride);
    }

    #[test]
    #[should_panic(expected = "programmer contract violation: window too large")]
    fn test_contract_violation_panics() {
        contract_assert!(1 + 1 == 3, "window too {}", "large");
    }
}
