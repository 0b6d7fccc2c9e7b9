use thiserror::Error;

use crate::units::UnitError;

/// Errors produced while parsing or evaluating a formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Math domain error: {0}")]
    Domain(String),

    #[error("{function}() takes {expected} argument(s), got {got}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("Result is not a finite number")]
    NotFinite,

    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl FormulaError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> FormulaError {
        FormulaError::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Failures that depend only on the input magnitudes rather than on the
    /// shape of the formula.
    pub fn is_numeric_domain(&self) -> bool {
        matches!(
            self,
            FormulaError::DivisionByZero | FormulaError::Domain(_) | FormulaError::NotFinite
        )
    }
}
