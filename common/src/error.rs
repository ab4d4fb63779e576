use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Raised when something tries to move a signal out of a terminal status.
///
/// This is a programming-contract violation rather than a data problem:
/// callers assert on it in debug builds and log-and-ignore in release builds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("signal {id} is already terminal ({status}); outcome is immutable")]
    AlreadyTerminal { id: Uuid, status: &'static str },
}

impl TransitionError {
    /// Panics in debug builds; release builds log and carry on.
    pub fn report(&self) {
        warn!("Illegal status transition: {}", self);
        debug_assert!(false, "{}", self);
    }
}

/// Malformed input rejected at the boundary, before it reaches scoring.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} is out of range: {value} (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("price levels inconsistent with {direction}: entry={entry}, target={target}, stop={stop}")]
    InconsistentLevels {
        direction: &'static str,
        entry: String,
        target: String,
        stop: String,
    },

    #[error("signal records require a BULLISH or BEARISH direction")]
    NotActionable,

    #[error("unknown {kind} label: {label}")]
    UnknownLabel { kind: &'static str, label: String },
}

/// Check that a float is finite, naming the field in the error.
pub fn ensure_finite(field: &'static str, value: f64) -> Result<f64, InputError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InputError::NonFinite { field, value })
    }
}

/// Check that a float is finite and lies inside `[min, max]`.
pub fn ensure_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    expected: &'static str,
) -> Result<f64, InputError> {
    ensure_finite(field, value)?;
    if value < min || value > max {
        return Err(InputError::OutOfRange {
            field,
            value,
            expected,
        });
    }
    Ok(value)
}
