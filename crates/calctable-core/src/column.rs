//! Column definitions.

use calctable_engine::engine::{ElementType, Value};
use calctable_engine::generators::{DifferenceMethod, InterpolationMethod, RangeSpec};
use calctable_engine::Unit;
use serde::{Deserialize, Serialize};

/// How an UNCERTAINTY column gets its values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UncertaintyMode {
    /// Entered by hand, like a DATA column.
    #[default]
    Manual,
    /// Computed from the referenced CALCULATED column's formula.
    Propagated,
}

/// What a column holds and how its values are produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnKind {
    Data,
    Calculated {
        formula: String,
        propagate_uncertainty: bool,
    },
    Derivative {
        numerator: String,
        denominator: String,
        order: u8,
        method: DifferenceMethod,
    },
    Range(RangeSpec),
    Interpolation {
        x: String,
        y: String,
        /// Evaluation points; the x column when unset.
        eval: Option<String>,
        method: InterpolationMethod,
    },
    Uncertainty {
        reference: String,
        mode: UncertaintyMode,
    },
}

/// Kind tag without parameters, for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Data,
    Calculated,
    Derivative,
    Range,
    Interpolation,
    Uncertainty,
}

impl ColumnKind {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnKind::Data => ColumnType::Data,
            ColumnKind::Calculated { .. } => ColumnType::Calculated,
            ColumnKind::Derivative { .. } => ColumnType::Derivative,
            ColumnKind::Range(_) => ColumnType::Range,
            ColumnKind::Interpolation { .. } => ColumnType::Interpolation,
            ColumnKind::Uncertainty { .. } => ColumnType::Uncertainty,
        }
    }

    /// Whether cells accept direct edits.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            ColumnKind::Data
                | ColumnKind::Uncertainty {
                    mode: UncertaintyMode::Manual,
                    ..
                }
        )
    }

    /// Whether the unit is set by the user rather than derived.
    pub(crate) fn has_user_unit(&self) -> bool {
        self.is_editable() || matches!(self, ColumnKind::Range(_))
    }

    /// The formula text of a CALCULATED column.
    pub fn formula(&self) -> Option<&str> {
        match self {
            ColumnKind::Calculated { formula, .. } => Some(formula),
            _ => None,
        }
    }

    /// Column names this kind reads directly, excluding formula references.
    pub(crate) fn links(&self) -> Vec<&str> {
        match self {
            ColumnKind::Derivative {
                numerator,
                denominator,
                ..
            } => vec![numerator, denominator],
            ColumnKind::Interpolation { x, y, eval, .. } => {
                let mut links = vec![x.as_str(), y.as_str()];
                if let Some(e) = eval {
                    links.push(e);
                }
                links
            }
            ColumnKind::Uncertainty { reference, .. } => vec![reference],
            _ => Vec::new(),
        }
    }

    /// Relabel every link equal to `old`.
    pub(crate) fn relabel(&mut self, old: &str, new: &str) {
        let swap = |name: &mut String| {
            if name == old {
                *name = new.to_string();
            }
        };
        match self {
            ColumnKind::Derivative {
                numerator,
                denominator,
                ..
            } => {
                swap(numerator);
                swap(denominator);
            }
            ColumnKind::Interpolation { x, y, eval, .. } => {
                swap(x);
                swap(y);
                if let Some(e) = eval {
                    swap(e);
                }
            }
            ColumnKind::Uncertainty { reference, .. } => swap(reference),
            _ => {}
        }
    }
}

/// What happens to UNCERTAINTY columns linked to a removed column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Delete them along with their source.
    #[default]
    Cascade,
    /// Keep them as plain DATA columns with their current values.
    Orphan,
}

/// A named column and its values.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) kind: ColumnKind,
    pub(crate) element_type: ElementType,
    pub(crate) unit: Option<Unit>,
    pub(crate) precision: usize,
    pub(crate) description: Option<String>,
    pub(crate) values: Vec<Value>,
}

impl Column {
    pub(crate) fn new(name: &str, kind: ColumnKind, rows: usize, precision: usize) -> Column {
        Column {
            name: name.to_string(),
            kind,
            element_type: ElementType::Numeric,
            unit: None,
            precision,
            description: None,
            values: vec![Value::Empty; rows],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn column_type(&self) -> ColumnType {
        self.kind.column_type()
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// `None` means dimensionless.
    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn is_editable(&self) -> bool {
        self.kind.is_editable()
    }

    /// Store a unit, dropping plain dimensionless ones.
    pub(crate) fn set_unit(&mut self, unit: Option<Unit>) {
        self.unit = unit.filter(|u| !u.is_plain());
    }

    /// Grow or shrink to `rows`. Data-like columns repeat their last value;
    /// everything else pads with empties until recalculated.
    pub(crate) fn resize(&mut self, rows: usize, repeat_last: bool) {
        let fill = if repeat_last {
            self.values.last().cloned().unwrap_or_default()
        } else {
            Value::Empty
        };
        self.values.resize(rows, fill);
    }
}
