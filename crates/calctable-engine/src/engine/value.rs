//! Cell values stored in table columns.
//!
//! - [`Value`] - empty, number, text, boolean or an in-band error marker
//! - [`CellError`] - a per-cell failure with a [`CellErrorKind`] and a message
//! - [`ElementType`] - what a DATA column accepts

use serde::{Deserialize, Serialize};

use crate::formula::FormulaError;
use crate::units::UnitError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellErrorKind {
    Evaluation,
    UnitMismatch,
    DivisionNearZero,
    Propagation,
    Resolution,
    Interpolation,
}

impl CellErrorKind {
    /// Marker shown in place of the value.
    pub fn marker(self) -> &'static str {
        match self {
            CellErrorKind::Evaluation => "#ERR!",
            CellErrorKind::UnitMismatch => "#UNIT!",
            CellErrorKind::DivisionNearZero => "#DIV0!",
            CellErrorKind::Propagation => "#UNC!",
            CellErrorKind::Resolution => "#REF!",
            CellErrorKind::Interpolation => "#INTERP!",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellError {
    pub kind: CellErrorKind,
    pub message: String,
}

impl CellError {
    pub fn new(kind: CellErrorKind, message: impl Into<String>) -> CellError {
        CellError {
            kind,
            message: message.into(),
        }
    }

    pub fn resolution(message: impl Into<String>) -> CellError {
        CellError::new(CellErrorKind::Resolution, message)
    }

    pub fn division_near_zero(message: impl Into<String>) -> CellError {
        CellError::new(CellErrorKind::DivisionNearZero, message)
    }

    pub fn propagation(message: impl Into<String>) -> CellError {
        CellError::new(CellErrorKind::Propagation, message)
    }

    pub fn interpolation(message: impl Into<String>) -> CellError {
        CellError::new(CellErrorKind::Interpolation, message)
    }
}

impl From<&FormulaError> for CellError {
    fn from(err: &FormulaError) -> CellError {
        let kind = match err {
            FormulaError::Unit(UnitError::UnitMismatch { .. }) => CellErrorKind::UnitMismatch,
            FormulaError::UnknownReference(_) => CellErrorKind::Resolution,
            _ => CellErrorKind::Evaluation,
        };
        CellError::new(kind, err.to_string())
    }
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.marker(), self.message)
    }
}

/// The value held by one cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(CellError),
}

impl Value {
    /// Interpret user input.
    /// - Empty string or whitespace -> Empty
    /// - `TRUE` / `FALSE` (any case) -> Bool
    /// - Quoted string -> Text (without quotes)
    /// - Valid number -> Number
    /// - Otherwise -> Text
    pub fn from_input(input: &str) -> Value {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }

        if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
            return Value::Text(trimmed[1..trimmed.len() - 1].to_string());
        }

        if let Ok(n) = trimmed.parse::<f64>() {
            return Value::Number(n);
        }

        Value::Text(trimmed.to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn error(&self) -> Option<&CellError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Element type inferred from a single value; `None` for empty and errors.
    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            Value::Number(_) => Some(ElementType::Numeric),
            Value::Text(_) => Some(ElementType::Text),
            Value::Bool(_) => Some(ElementType::Boolean),
            Value::Empty | Value::Error(_) => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<CellError> for Value {
    fn from(e: CellError) -> Value {
        Value::Error(e)
    }
}

/// What a column's cells hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    #[default]
    Numeric,
    Text,
    Boolean,
}

impl ElementType {
    /// Infer from the first non-empty value; numeric when there is none.
    pub fn infer(values: &[Value]) -> ElementType {
        values
            .iter()
            .find_map(Value::element_type)
            .unwrap_or_default()
    }

    /// Whether a value may be stored in a column of this type. Empty always fits.
    pub fn accepts(self, value: &Value) -> bool {
        match value.element_type() {
            Some(t) => t == self,
            None => value.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_input() {
        assert_eq!(Value::from_input("  "), Value::Empty);
        assert_eq!(Value::from_input("3.5"), Value::Number(3.5));
        assert_eq!(Value::from_input("-1e3"), Value::Number(-1000.0));
        assert_eq!(Value::from_input("TRUE"), Value::Bool(true));
        assert_eq!(Value::from_input("\"42\""), Value::Text("42".into()));
        assert_eq!(Value::from_input("sample A"), Value::Text("sample A".into()));
    }

    #[test]
    fn test_element_type_accepts() {
        assert!(ElementType::Numeric.accepts(&Value::Number(1.0)));
        assert!(ElementType::Numeric.accepts(&Value::Empty));
        assert!(!ElementType::Numeric.accepts(&Value::Text("x".into())));
        assert!(!ElementType::Text.accepts(&Value::Error(CellError::resolution("gone"))));
    }

    #[test]
    fn test_infer_skips_empty_cells() {
        let values = vec![Value::Empty, Value::Bool(false), Value::Number(1.0)];
        assert_eq!(ElementType::infer(&values), ElementType::Boolean);
        assert_eq!(ElementType::infer(&[]), ElementType::Numeric);
    }

    #[test]
    fn test_formula_errors_map_to_cell_kinds() {
        let unit = FormulaError::Unit(UnitError::UnitMismatch {
            op: "add",
            left: "m".into(),
            right: "s".into(),
        });
        assert_eq!(CellError::from(&unit).kind, CellErrorKind::UnitMismatch);
        let missing = FormulaError::UnknownReference("x".into());
        assert_eq!(CellError::from(&missing).kind, CellErrorKind::Resolution);
        assert_eq!(
            CellError::from(&FormulaError::DivisionByZero).kind,
            CellErrorKind::Evaluation
        );
    }
}
