use calctable_engine::engine::{ElementType, Value};
use calctable_engine::generators::{DifferenceMethod, InterpolationMethod, RangeSpec};
use calctable_engine::{Formula, Unit};
use log::debug;

use super::recalc::probe_unit;
use super::state::TableState;
use super::{DataTable, Staging};
use crate::column::{Column, ColumnKind, ColumnType, RemovalPolicy, UncertaintyMode};
use crate::error::{Result, TableError};

/// Significant digits beyond this add nothing for an f64.
const MAX_PRECISION: usize = 17;

fn parse_unit(text: Option<&str>) -> Result<Option<Unit>> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => Ok(Some(Unit::parse(t)?)),
        None => Ok(None),
    }
}

impl TableState {
    /// Parse and dry-run a formula with every known column at 1.0 in its own
    /// unit. References to missing columns are allowed and bind to a
    /// dimensionless 1.0; unit errors are not.
    fn check_formula(&self, formula: &str, staging: &Staging) -> Result<()> {
        let parsed = Formula::parse(formula)?;
        match probe_unit(&self.registry, &parsed, staging.constants, true) {
            Ok(_) => Ok(()),
            Err(e) if e.is_numeric_domain() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Change the row count. Editable columns repeat their last value when
    /// `repeat_last`, otherwise pad with empties; computed columns are
    /// cleared until recalculated. Returns whether anything changed.
    fn resize(&mut self, rows: usize, repeat_last: bool, max_rows: usize) -> Result<bool> {
        if rows > max_rows {
            return Err(TableError::validation(format!(
                "{} rows exceeds the limit of {}",
                rows, max_rows
            )));
        }
        if rows == self.row_count {
            return Ok(false);
        }
        debug!("resizing table from {} to {} rows", self.row_count, rows);
        for column in self.registry.iter_mut() {
            let repeat = repeat_last && column.is_editable();
            column.resize(rows, repeat);
        }
        self.row_count = rows;
        Ok(true)
    }

    /// RANGE columns must all produce the same number of points.
    fn check_range_agreement(&self, name: &str, count: usize) -> Result<()> {
        let conflict = self
            .registry
            .columns_of_kind(ColumnType::Range)
            .into_iter()
            .filter(|c| c.name != name)
            .find_map(|c| match &c.kind {
                ColumnKind::Range(spec) if spec.count() != count => {
                    Some((c.name.clone(), spec.count()))
                }
                _ => None,
            });
        match conflict {
            Some((other, other_count)) => Err(TableError::validation(format!(
                "Range '{}' has {} points but '{}' has {}",
                name, count, other, other_count
            ))),
            None => Ok(()),
        }
    }

    /// Bring the graph, row count and propagated columns in line with the
    /// current definition of `name`. Returns whether the row count changed.
    fn apply_definition(&mut self, name: &str, staging: &Staging) -> Result<bool> {
        let kind = self.registry.require(name)?.kind.clone();
        let mut rows_changed = false;
        match &kind {
            ColumnKind::Calculated { formula, .. } => self.check_formula(formula, staging)?,
            ColumnKind::Range(spec) => {
                let count = spec.count();
                self.check_range_agreement(name, count)?;
                rows_changed = self.resize(count, true, staging.config.max_rows)?;
            }
            _ => {}
        }
        self.register(name)?;
        self.refresh_propagated()?;
        Ok(rows_changed)
    }

    /// Add a column, aligning its values to the table. The first column of an
    /// empty table sets the row count.
    fn insert_column(&mut self, mut column: Column, staging: &Staging) -> Result<bool> {
        let len = column.values.len();
        let mut rows_changed = false;
        if self.registry.is_empty() && len > 0 {
            rows_changed = self.resize(len, false, staging.config.max_rows)?;
        } else if len > self.row_count {
            return Err(TableError::validation(format!(
                "Column '{}' has {} values but the table has {} rows",
                column.name, len, self.row_count
            )));
        }
        column.values.resize(self.row_count, Value::Empty);

        let name = column.name.clone();
        self.registry.add(column, staging.config.max_range_points)?;
        Ok(self.apply_definition(&name, staging)? || rows_changed)
    }
}

impl DataTable {
    fn new_column(&self, name: &str, kind: ColumnKind) -> Column {
        Column::new(name, kind, self.state.row_count, self.config.default_precision)
    }

    /// Stage `columns` in one transaction, then recalculate from them.
    fn add_columns(&mut self, columns: Vec<Column>) -> Result<()> {
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let action = format!("add column '{}'", names.join("', '"));
        let rows_changed = self.transact(&action, |state, staging| {
            let mut rows_changed = false;
            for column in columns {
                rows_changed |= state.insert_column(column, staging)?;
            }
            Ok(rows_changed)
        })?;
        self.recalculate_from(&names, rows_changed, Vec::new());
        Ok(())
    }

    fn recalculate_from<S: AsRef<str>>(&mut self, changed: &[S], full: bool, removed: Vec<String>) {
        let order = if full {
            self.state.graph.full_order()
        } else {
            self.state.graph.recalculation_order(changed)
        };
        self.run_recalculation(order, removed);
    }

    pub fn add_data_column(
        &mut self,
        name: &str,
        unit: Option<&str>,
        initial_values: Vec<Value>,
    ) -> Result<()> {
        let unit = parse_unit(unit)?;
        if initial_values.iter().any(|v| v.error().is_some()) {
            return Err(TableError::validation("Data columns cannot hold error values"));
        }
        let element_type = ElementType::infer(&initial_values);
        if let Some(bad) = initial_values.iter().find(|v| !element_type.accepts(v)) {
            return Err(TableError::validation(format!(
                "Value {:?} does not match column type {:?}",
                bad, element_type
            )));
        }

        let mut column = self.new_column(name, ColumnKind::Data);
        column.element_type = element_type;
        column.set_unit(unit);
        column.values = initial_values;
        self.add_columns(vec![column])
    }

    /// Add a formula column. With `propagate_uncertainty` a propagated
    /// uncertainty column named `<name><uncertainty_suffix>` is added too.
    pub fn add_calculated_column(
        &mut self,
        name: &str,
        formula: &str,
        propagate_uncertainty: bool,
    ) -> Result<()> {
        let mut columns = vec![self.new_column(
            name,
            ColumnKind::Calculated {
                formula: formula.to_string(),
                propagate_uncertainty,
            },
        )];
        if propagate_uncertainty {
            columns.push(self.propagated_column_for(name));
        }
        self.add_columns(columns)
    }

    fn propagated_column_for(&self, name: &str) -> Column {
        let u_name = format!("{}{}", name, self.config.uncertainty_suffix);
        self.new_column(
            &u_name,
            ColumnKind::Uncertainty {
                reference: name.to_string(),
                mode: UncertaintyMode::Propagated,
            },
        )
    }

    /// Forward-difference derivative of `numerator` with respect to `denominator`.
    pub fn add_derivative_column(
        &mut self,
        name: &str,
        numerator: &str,
        denominator: &str,
        order: u8,
    ) -> Result<()> {
        self.add_derivative_column_with(name, numerator, denominator, order, DifferenceMethod::Forward)
    }

    pub fn add_derivative_column_with(
        &mut self,
        name: &str,
        numerator: &str,
        denominator: &str,
        order: u8,
        method: DifferenceMethod,
    ) -> Result<()> {
        let column = self.new_column(
            name,
            ColumnKind::Derivative {
                numerator: numerator.to_string(),
                denominator: denominator.to_string(),
                order,
                method,
            },
        );
        self.add_columns(vec![column])
    }

    /// Add a generated sequence. The table is resized to the sequence length.
    pub fn add_range_column(&mut self, name: &str, spec: RangeSpec) -> Result<()> {
        let column = self.new_column(name, ColumnKind::Range(spec));
        self.add_columns(vec![column])
    }

    /// Interpolate `y(x)` at the rows of `eval` (the x column when `None`).
    pub fn add_interpolation_column(
        &mut self,
        name: &str,
        x: &str,
        y: &str,
        eval: Option<&str>,
        method: InterpolationMethod,
    ) -> Result<()> {
        let column = self.new_column(
            name,
            ColumnKind::Interpolation {
                x: x.to_string(),
                y: y.to_string(),
                eval: eval.map(str::to_string),
                method,
            },
        );
        self.add_columns(vec![column])
    }

    /// Add a hand-entered uncertainty column for `reference`, in its unit.
    pub fn add_uncertainty_column(&mut self, name: &str, reference: &str) -> Result<()> {
        let mut column = self.new_column(
            name,
            ColumnKind::Uncertainty {
                reference: reference.to_string(),
                mode: UncertaintyMode::Manual,
            },
        );
        column.set_unit(self.column(reference).and_then(|c| c.unit.clone()));
        self.add_columns(vec![column])
    }

    /// Write one cell of an editable column and recalculate its dependents.
    pub fn set_cell(&mut self, column: &str, row: usize, value: Value) -> Result<()> {
        let rows = self.state.row_count;
        let col = self.state.registry.require_mut(column)?;
        if !col.is_editable() {
            return Err(TableError::NotEditable(column.to_string()));
        }
        if row >= rows {
            return Err(TableError::validation(format!(
                "Row {} out of range (table has {} rows)",
                row, rows
            )));
        }
        if value.error().is_some() {
            return Err(TableError::validation("Error values cannot be entered"));
        }
        if !col.element_type.accepts(&value) {
            // an all-empty column takes the type of its first value
            match value.element_type() {
                Some(t) if col.values.iter().all(Value::is_empty) => col.element_type = t,
                _ => {
                    return Err(TableError::validation(format!(
                        "Value {:?} does not match column type {:?}",
                        value, col.element_type
                    )));
                }
            }
        }
        col.values[row] = value;
        self.recalculate_from(&[column], false, Vec::new());
        Ok(())
    }

    /// Remove a column. Columns that read it stay and show resolution
    /// errors; linked uncertainty columns follow `policy`.
    pub fn remove_column(&mut self, name: &str, policy: RemovalPolicy) -> Result<()> {
        let linked = self.state.registry.linked_uncertainties(name);
        let mut touched = vec![name.to_string()];
        touched.extend(linked.iter().cloned());
        // dependents under the old edges, before any are dropped
        let affected = self.state.graph.recalculation_order(&touched);

        let removed = self.transact(&format!("remove column '{}'", name), |state, _| {
            state.registry.remove(name)?;
            state.graph.unregister(name);
            let mut removed = vec![name.to_string()];
            for u in linked {
                match policy {
                    RemovalPolicy::Cascade => {
                        state.registry.remove(&u)?;
                        state.graph.unregister(&u);
                        removed.push(u);
                    }
                    RemovalPolicy::Orphan => {
                        let column = state.registry.require_mut(&u)?;
                        column.kind = ColumnKind::Data;
                        column.element_type = ElementType::Numeric;
                        state.register(&u)?;
                    }
                }
            }
            state.refresh_propagated()?;
            Ok(removed)
        })?;
        self.recalculate_from(&affected, false, removed);
        Ok(())
    }

    /// Rename a column, rewriting every formula reference and link to it.
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        self.transact(&format!("rename column '{}'", old), |state, _| {
            state.registry.require(old)?;
            if state.graph.is_referenced(new) {
                return Err(TableError::validation(format!(
                    "'{}' is already referenced by another column",
                    new
                )));
            }
            state.registry.rename(old, new)?;
            state.graph.rename(old, new);
            state.refresh_propagated()?;
            Ok(())
        })?;
        self.recalculate_from(&[new], false, vec![old.to_string()]);
        Ok(())
    }

    /// Replace a column's definition. Values of DATA and manual uncertainty
    /// columns are kept when a column becomes one of those kinds.
    pub fn update_column(&mut self, name: &str, kind: ColumnKind) -> Result<()> {
        let mut touched = vec![name.to_string()];
        touched.extend(self.state.registry.linked_uncertainties(name));
        let affected = self.state.graph.recalculation_order(&touched);
        let wants_propagated = matches!(
            kind,
            ColumnKind::Calculated {
                propagate_uncertainty: true,
                ..
            }
        );
        let propagated = self.propagated_column_for(name);

        let rows_changed = self.transact(&format!("update column '{}'", name), |state, staging| {
            state
                .registry
                .validate_kind(name, &kind, staging.config.max_range_points)?;
            let links_ok = matches!(kind.column_type(), ColumnType::Data | ColumnType::Calculated);
            if !links_ok && !state.registry.linked_uncertainties(name).is_empty() {
                return Err(TableError::validation(format!(
                    "'{}' has uncertainty columns and must stay a data or calculated column",
                    name
                )));
            }

            let column = state.registry.require_mut(name)?;
            let keeps_user_unit = kind.has_user_unit();
            column.kind = kind;
            if column.kind.is_editable() {
                column.element_type = ElementType::infer(&column.values);
            } else {
                column.element_type = ElementType::Numeric;
            }
            if !keeps_user_unit {
                column.unit = None;
            }

            let mut rows_changed = state.apply_definition(name, staging)?;
            if wants_propagated && !state.registry.contains(&propagated.name) {
                rows_changed |= state.insert_column(propagated, staging)?;
            }
            Ok(rows_changed)
        })?;
        self.recalculate_from(&affected, rows_changed, Vec::new());
        Ok(())
    }

    /// Replace the formula of a CALCULATED column.
    pub fn set_formula(&mut self, name: &str, formula: &str) -> Result<()> {
        let column = self.state.registry.require(name)?;
        let ColumnKind::Calculated {
            propagate_uncertainty,
            ..
        } = column.kind
        else {
            return Err(TableError::validation(format!(
                "'{}' is not a calculated column",
                name
            )));
        };
        self.update_column(
            name,
            ColumnKind::Calculated {
                formula: formula.to_string(),
                propagate_uncertainty,
            },
        )
    }

    /// Move a column to display position `to`. Reordering can change which
    /// uncertainty column feeds propagation, so propagated columns refresh.
    pub fn move_column(&mut self, name: &str, to: usize) -> Result<()> {
        let propagated = self.transact(&format!("move column '{}'", name), |state, _| {
            state.registry.move_column(name, to)?;
            state.refresh_propagated()
        })?;
        let mut changed = vec![name.to_string()];
        changed.extend(propagated);
        self.recalculate_from(&changed, false, Vec::new());
        Ok(())
    }

    pub fn set_precision(&mut self, name: &str, precision: usize) -> Result<()> {
        if precision > MAX_PRECISION {
            return Err(TableError::validation(format!(
                "Precision must be at most {}",
                MAX_PRECISION
            )));
        }
        self.state.registry.require_mut(name)?.precision = precision;
        self.subscribers.notify(&[name.to_string()]);
        Ok(())
    }

    pub fn set_description(&mut self, name: &str, description: Option<&str>) -> Result<()> {
        self.state.registry.require_mut(name)?.description = description.map(str::to_string);
        self.subscribers.notify(&[name.to_string()]);
        Ok(())
    }

    /// Set the unit of a DATA, manual uncertainty or RANGE column. Derived
    /// units downstream follow on recalculation.
    pub fn set_unit(&mut self, name: &str, unit: Option<&str>) -> Result<()> {
        let unit = parse_unit(unit)?;
        let column = self.state.registry.require_mut(name)?;
        if !column.kind.has_user_unit() {
            return Err(TableError::NotEditable(name.to_string()));
        }
        column.set_unit(unit);
        self.recalculate_from(&[name], false, Vec::new());
        Ok(())
    }

    /// Change the row count. Editable columns are padded with empty cells or
    /// truncated; a RANGE column pins the row count to its length.
    pub fn resize_rows(&mut self, rows: usize) -> Result<()> {
        let changed = self.transact("resize rows", |state, staging| {
            if let Some(range) = state
                .registry
                .columns_of_kind(ColumnType::Range)
                .into_iter()
                .find(|c| matches!(&c.kind, ColumnKind::Range(spec) if spec.count() != rows))
            {
                return Err(TableError::validation(format!(
                    "Range column '{}' fixes the row count",
                    range.name
                )));
            }
            state.resize(rows, false, staging.config.max_rows)
        })?;
        if changed {
            self.recalculate_all();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use calctable_engine::engine::CellErrorKind;
    use pretty_assertions::assert_eq;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|v| Value::Number(*v)).collect()
    }

    fn table_with_motion() -> DataTable {
        let mut table = DataTable::new();
        table
            .add_data_column("t", Some("s"), nums(&[0.0, 1.0, 2.0, 3.0]))
            .unwrap();
        table
            .add_data_column("x", Some("m"), nums(&[0.0, 1.0, 4.0, 9.0]))
            .unwrap();
        table
    }

    #[test]
    fn test_first_column_sets_row_count() {
        let table = table_with_motion();
        assert_eq!(table.row_count(), 4);
    }

    #[test]
    fn test_short_data_column_is_padded_and_long_one_rejected() {
        let mut table = table_with_motion();
        table.add_data_column("note", None, nums(&[1.0])).unwrap();
        assert_eq!(table.column_values("note").unwrap()[3], Value::Empty);
        assert!(matches!(
            table.add_data_column("long", None, nums(&[1.0; 5])),
            Err(TableError::Validation(_))
        ));
        assert!(matches!(
            table.add_data_column("bad", Some("furlongs per fortnight"), Vec::new()),
            Err(TableError::InvalidUnit(_))
        ));
    }

    #[test]
    fn test_eager_unit_mismatch() {
        let mut table = table_with_motion();
        assert!(matches!(
            table.add_calculated_column("bad", "{x} + {t}", false),
            Err(TableError::UnitMismatch(_))
        ));
        assert!(table.column("bad").is_none());
        table.add_calculated_column("v", "{x} / {t}", false).unwrap();
        assert_eq!(table.column("v").unwrap().unit().map(Unit::format), Some("m/s".to_string()));
    }

    #[test]
    fn test_set_cell_rules() {
        let mut table = table_with_motion();
        table.add_calculated_column("v", "{x} / {t}", false).unwrap();
        assert!(matches!(
            table.set_cell("v", 0, Value::Number(1.0)),
            Err(TableError::NotEditable(_))
        ));
        assert!(matches!(
            table.set_cell("x", 9, Value::Number(1.0)),
            Err(TableError::Validation(_))
        ));
        assert!(matches!(
            table.set_cell("x", 0, Value::Text("far".into())),
            Err(TableError::Validation(_))
        ));
        assert!(matches!(
            table.set_cell("nope", 0, Value::Number(1.0)),
            Err(TableError::ColumnNotFound(_))
        ));

        table.set_cell("x", 2, Value::Number(8.0)).unwrap();
        assert_eq!(table.column_values("v").unwrap()[2], Value::Number(4.0));
    }

    #[test]
    fn test_empty_and_error_inputs() {
        let mut table = table_with_motion();
        table.add_calculated_column("v", "{x} / {t}", false).unwrap();
        let v = table.column_values("v").unwrap();
        // 0/0 on the first row
        assert_eq!(v[0].error().map(|e| e.kind), Some(CellErrorKind::Evaluation));
        assert_eq!(v[1], Value::Number(1.0));

        table.add_calculated_column("w", "{v} * 2", false).unwrap();
        let w = table.column_values("w").unwrap();
        assert_eq!(w[0].error().map(|e| e.kind), Some(CellErrorKind::Resolution));

        table.set_cell("x", 1, Value::Empty).unwrap();
        assert_eq!(table.column_values("w").unwrap()[1], Value::Empty);
    }

    #[test]
    fn test_range_resizes_table_repeating_last_value() {
        let mut table = table_with_motion();
        table
            .add_range_column(
                "r",
                RangeSpec::Linspace {
                    start: 0.0,
                    stop: 1.0,
                    count: 6,
                },
            )
            .unwrap();
        assert_eq!(table.row_count(), 6);
        assert_eq!(table.column_values("x").unwrap()[5], Value::Number(9.0));

        let other = RangeSpec::Linspace {
            start: 0.0,
            stop: 1.0,
            count: 3,
        };
        assert!(table.add_range_column("r2", other).is_err());
        assert!(table.resize_rows(10).is_err());
        assert_eq!(table.row_count(), 6);
    }

    #[test]
    fn test_resize_rows_pads_with_empty() {
        let mut table = table_with_motion();
        table.add_calculated_column("v", "{x} / {t}", false).unwrap();
        table.resize_rows(6).unwrap();
        assert_eq!(table.column_values("x").unwrap()[5], Value::Empty);
        assert_eq!(table.column_values("v").unwrap()[5], Value::Empty);
        table.resize_rows(2).unwrap();
        assert_eq!(table.column_values("v").unwrap().len(), 2);
        assert_eq!(table.column_values("v").unwrap()[1], Value::Number(1.0));

        let mut limited = DataTable::with_config(EngineConfig {
            max_rows: 3,
            ..Default::default()
        });
        assert!(limited.resize_rows(4).is_err());
        assert_eq!(limited.row_count(), 0);
    }

    #[test]
    fn test_set_formula_and_update_column() {
        let mut table = table_with_motion();
        table.add_calculated_column("y", "{x} * 2", false).unwrap();
        table.set_formula("y", "{x} + {x}").unwrap();
        assert_eq!(table.column_values("y").unwrap()[3], Value::Number(18.0));
        assert!(table.set_formula("x", "1").is_err());
        assert!(table.set_formula("y", "{y} + 1").is_err());
        assert_eq!(table.column("y").unwrap().kind().formula(), Some("{x} + {x}"));

        table.update_column("y", ColumnKind::Data).unwrap();
        assert!(table.column("y").unwrap().is_editable());
        assert_eq!(table.column_values("y").unwrap()[3], Value::Number(18.0));
    }

    #[test]
    fn test_precision_description_and_unit() {
        let mut table = table_with_motion();
        table.add_calculated_column("v", "{x} / {t}", false).unwrap();
        table.set_precision("v", 3).unwrap();
        assert!(table.set_precision("v", 40).is_err());
        table.set_description("v", Some("speed")).unwrap();
        assert_eq!(table.column("v").unwrap().description(), Some("speed"));

        table.set_unit("x", Some("km")).unwrap();
        assert_eq!(table.column("v").unwrap().unit().map(Unit::format), Some("km/s".to_string()));
        assert!(matches!(table.set_unit("v", Some("m")), Err(TableError::NotEditable(_))));
    }

    #[test]
    fn test_move_column() {
        let mut table = table_with_motion();
        table.move_column("x", 0).unwrap();
        assert_eq!(table.column_names(), vec!["x", "t"]);
    }
}
