use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use calctable_engine::engine::{CellError, CellErrorKind, Value};
use calctable_engine::generators::{DifferenceMethod, derivative, interpolate};
use calctable_engine::uncertainty::UncertaintyPropagator;
use calctable_engine::{Bindings, ConstantLookup, Formula, FormulaError, Quantity, Unit};
use log::trace;

use super::state::TableState;
use crate::column::{Column, ColumnKind, UncertaintyMode};
use crate::registry::ColumnRegistry;

/// Marks a recalculation in progress; cleared on drop, unwinding included.
pub(crate) struct RecalcGuard {
    flag: Rc<Cell<bool>>,
}

impl RecalcGuard {
    /// `None` if a recalculation is already running.
    pub(crate) fn acquire(flag: &Rc<Cell<bool>>) -> Option<RecalcGuard> {
        if flag.replace(true) {
            return None;
        }
        Some(RecalcGuard {
            flag: Rc::clone(flag),
        })
    }
}

impl Drop for RecalcGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Inputs to recalculation that live outside the table state.
pub(crate) struct RecalcContext<'a> {
    pub(crate) constants: Option<&'a dyn ConstantLookup>,
    pub(crate) derivative_epsilon: f64,
}

/// Column values at one row, falling back to workspace constants.
pub(crate) struct RowBindings<'a> {
    registry: &'a ColumnRegistry,
    row: usize,
    constants: Option<&'a dyn ConstantLookup>,
}

impl Bindings for RowBindings<'_> {
    fn resolve(&self, name: &str) -> Option<Quantity> {
        match self.registry.get(name) {
            Some(column) => {
                let value = column.values.get(self.row)?.as_number()?;
                Some(Quantity::new(value, column.unit.clone().unwrap_or_default()))
            }
            None => self.constants?.lookup(name),
        }
    }

    fn constant(&self, name: &str) -> Option<Quantity> {
        self.constants?.lookup(name)
    }
}

/// Every referenced column bound to 1.0 in its own unit. With
/// `allow_dangling`, names that are neither columns nor constants bind to a
/// dimensionless 1.0.
struct UnitProbe<'a> {
    registry: &'a ColumnRegistry,
    constants: Option<&'a dyn ConstantLookup>,
    allow_dangling: bool,
}

impl Bindings for UnitProbe<'_> {
    fn resolve(&self, name: &str) -> Option<Quantity> {
        match self.registry.get(name) {
            Some(column) => Some(Quantity::new(1.0, column.unit.clone().unwrap_or_default())),
            None => self
                .constants
                .and_then(|c| c.lookup(name))
                .or_else(|| self.allow_dangling.then(|| Quantity::dimensionless(1.0))),
        }
    }

    fn constant(&self, name: &str) -> Option<Quantity> {
        self.constants?.lookup(name)
    }
}

/// Unit a formula produces given the current column units.
pub(crate) fn probe_unit(
    registry: &ColumnRegistry,
    formula: &Formula,
    constants: Option<&dyn ConstantLookup>,
    allow_dangling: bool,
) -> Result<Unit, FormulaError> {
    let probe = UnitProbe {
        registry,
        constants,
        allow_dangling,
    };
    formula.evaluate(&probe).map(|q| q.unit)
}

struct Computed {
    values: Vec<Value>,
    unit: Option<Unit>,
}

impl Computed {
    fn filled(rows: usize, error: CellError, unit: Option<Unit>) -> Computed {
        Computed {
            values: vec![Value::Error(error); rows],
            unit,
        }
    }
}

impl TableState {
    pub(crate) fn recalculate(&mut self, order: &[String], ctx: &RecalcContext) {
        for name in order {
            self.recalculate_column(name, ctx);
        }
    }

    fn recalculate_column(&mut self, name: &str, ctx: &RecalcContext) {
        let Some(column) = self.registry.get(name) else {
            return;
        };
        trace!("recalculating column {} ({:?})", name, column.column_type());

        let computed = match &column.kind {
            ColumnKind::Data
            | ColumnKind::Uncertainty {
                mode: UncertaintyMode::Manual,
                ..
            } => return,
            ColumnKind::Calculated { formula, .. } => self.compute_formula(formula, ctx),
            ColumnKind::Derivative {
                numerator,
                denominator,
                order,
                method,
            } => self.compute_derivative(numerator, denominator, *order, *method, ctx),
            ColumnKind::Range(spec) => {
                let mut values: Vec<Value> = spec.generate().into_iter().map(Value::Number).collect();
                values.resize(self.row_count, Value::Empty);
                Computed {
                    values,
                    unit: column.unit.clone(),
                }
            }
            ColumnKind::Interpolation { x, y, eval, method } => {
                let eval = eval.as_deref().unwrap_or(x);
                match (self.values_of(x), self.values_of(y), self.values_of(eval)) {
                    (Ok(xs), Ok(ys), Ok(at)) => Computed {
                        values: interpolate(xs, ys, at, *method),
                        unit: self.registry.get(y).and_then(|c| c.unit.clone()),
                    },
                    (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                        Computed::filled(self.row_count, e, None)
                    }
                }
            }
            ColumnKind::Uncertainty {
                reference,
                mode: UncertaintyMode::Propagated,
            } => self.compute_propagated(name, reference, ctx),
        };

        if let Some(column) = self.registry.get_mut(name) {
            let mut values = computed.values;
            values.resize(self.row_count, Value::Empty);
            column.values = values;
            column.set_unit(computed.unit);
        }
    }

    fn values_of(&self, name: &str) -> Result<&[Value], CellError> {
        self.registry
            .get(name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| CellError::resolution(format!("unknown column {{{}}}", name)))
    }

    /// A value that short-circuits evaluation of `row`: empty when an input
    /// is empty, an error when an input is an error, missing or non-numeric.
    fn blocked_row(&self, references: &[String], row: usize, ctx: &RecalcContext) -> Option<Value> {
        for name in references {
            match self.registry.get(name) {
                Some(column) => match column.values.get(row) {
                    None | Some(Value::Empty) => return Some(Value::Empty),
                    Some(Value::Number(_)) => {}
                    Some(Value::Error(e)) => {
                        return Some(
                            CellError::resolution(format!("{{{}}} is {}", name, e.kind.marker()))
                                .into(),
                        );
                    }
                    Some(Value::Text(_) | Value::Bool(_)) => {
                        return Some(
                            CellError::new(
                                CellErrorKind::Evaluation,
                                format!("{{{}}} is not numeric", name),
                            )
                            .into(),
                        );
                    }
                },
                None if ctx.constants.and_then(|c| c.lookup(name)).is_some() => {}
                None => {
                    return Some(CellError::resolution(format!("unknown column {{{}}}", name)).into());
                }
            }
        }
        None
    }

    fn compute_formula(&self, source: &str, ctx: &RecalcContext) -> Computed {
        let formula = match Formula::parse(source) {
            Ok(f) => f,
            Err(e) => return Computed::filled(self.row_count, CellError::from(&e), None),
        };

        let mut unit: Option<Unit> = None;
        let values = (0..self.row_count)
            .map(|row| {
                if let Some(blocked) = self.blocked_row(formula.references(), row, ctx) {
                    return blocked;
                }
                let bindings = RowBindings {
                    registry: &self.registry,
                    row,
                    constants: ctx.constants,
                };
                match formula.evaluate(&bindings) {
                    Ok(q) => {
                        if unit.is_none() {
                            unit = Some(q.unit);
                        }
                        Value::Number(q.value)
                    }
                    Err(e) => Value::Error(CellError::from(&e)),
                }
            })
            .collect();

        let unit = unit.or_else(|| probe_unit(&self.registry, &formula, ctx.constants, false).ok());
        Computed { values, unit }
    }

    fn compute_derivative(
        &self,
        numerator: &str,
        denominator: &str,
        order: u8,
        method: DifferenceMethod,
        ctx: &RecalcContext,
    ) -> Computed {
        let (num, den) = match (self.registry.get(numerator), self.registry.get(denominator)) {
            (Some(n), Some(d)) => (n, d),
            (None, _) => return self.unresolved(numerator),
            (_, None) => return self.unresolved(denominator),
        };
        let num_unit = num.unit.clone().unwrap_or_default();
        let den_unit = den.unit.clone().unwrap_or_default();
        let unit = match den_unit
            .powi(i32::from(order))
            .and_then(|den| num_unit.div(&den))
        {
            Ok(unit) => unit,
            Err(e) => {
                return Computed::filled(self.row_count, CellError::from(&FormulaError::from(e)), None);
            }
        };
        Computed {
            values: derivative(&num.values, &den.values, order, method, ctx.derivative_epsilon),
            unit: Some(unit),
        }
    }

    fn compute_propagated(&self, name: &str, reference: &str, ctx: &RecalcContext) -> Computed {
        let Some(target) = self.registry.get(reference) else {
            return self.unresolved(reference);
        };
        let unit = target.unit.clone();
        let Some(source) = target.kind.formula() else {
            let err = CellError::propagation(format!("{} is not a calculated column", reference));
            return Computed::filled(self.row_count, err, unit);
        };
        let formula = match Formula::parse(source) {
            Ok(f) => f,
            Err(e) => {
                return Computed::filled(self.row_count, CellError::propagation(e.to_string()), unit);
            }
        };
        let propagator = UncertaintyPropagator::new(&formula);

        let sources: HashMap<&str, &Column> = formula
            .references()
            .iter()
            .filter_map(|input| {
                let source = self.registry.uncertainty_source(input)?;
                (source.name != name).then_some((input.as_str(), source))
            })
            .collect();

        let values = (0..self.row_count)
            .map(|row| {
                match target.values.get(row) {
                    Some(Value::Number(_)) => {}
                    Some(Value::Error(e)) => {
                        return CellError::resolution(format!(
                            "{{{}}} is {}",
                            reference,
                            e.kind.marker()
                        ))
                        .into();
                    }
                    _ => return Value::Empty,
                }
                if let Some(blocked) = self.blocked_row(formula.references(), row, ctx) {
                    return blocked;
                }
                if let Some((input, _)) = sources
                    .iter()
                    .find(|(_, col)| matches!(col.values.get(row), Some(Value::Error(_))))
                {
                    return CellError::propagation(format!("uncertainty of {{{}}} is an error", input))
                        .into();
                }

                let bindings = RowBindings {
                    registry: &self.registry,
                    row,
                    constants: ctx.constants,
                };
                let sigma = |input: &str| sources.get(input)?.values.get(row)?.as_number();
                match propagator.propagate(&bindings, &sigma) {
                    Ok(delta) => Value::Number(delta),
                    Err(e) => CellError::propagation(e.to_string()).into(),
                }
            })
            .collect();
        Computed { values, unit }
    }

    fn unresolved(&self, name: &str) -> Computed {
        let err = CellError::resolution(format!("unknown column {{{}}}", name));
        Computed::filled(self.row_count, err, None)
    }
}
