//! Error types for calctable core.

use calctable_engine::engine::CycleError;
use calctable_engine::uncertainty::PropagationError;
use calctable_engine::{FormulaError, UnitError};
use thiserror::Error;

/// Errors from structural table operations.
///
/// Any operation returning one of these left the table untouched. Per-cell
/// evaluation failures are stored in the cells instead.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Formula syntax error: {0}")]
    FormulaSyntax(FormulaError),

    #[error("Formula evaluation error: {0}")]
    FormulaEvaluation(FormulaError),

    #[error("Unit mismatch: {0}")]
    UnitMismatch(String),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("{0}")]
    CycleDetected(#[from] CycleError),

    #[error("Uncertainty propagation error: {0}")]
    Propagation(#[from] PropagationError),

    #[error("Column '{0}' is not editable")]
    NotEditable(String),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TableError {
    pub(crate) fn validation(message: impl Into<String>) -> TableError {
        TableError::Validation(message.into())
    }
}

impl From<UnitError> for TableError {
    fn from(err: UnitError) -> TableError {
        match err {
            UnitError::InvalidUnit(_) | UnitError::ExponentOverflow => {
                TableError::InvalidUnit(err.to_string())
            }
            UnitError::UnitMismatch { .. } => TableError::UnitMismatch(err.to_string()),
        }
    }
}

impl From<FormulaError> for TableError {
    fn from(err: FormulaError) -> TableError {
        match err {
            FormulaError::Syntax { .. }
            | FormulaError::UnsupportedOperation(_)
            | FormulaError::Arity { .. } => TableError::FormulaSyntax(err),
            FormulaError::Unit(unit) => unit.into(),
            FormulaError::UnknownReference(name) => {
                TableError::Validation(format!("Unknown reference: {}", name))
            }
            other => TableError::FormulaEvaluation(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TableError>;
