//! The calculated table.
//!
//! [`DataTable`] owns every column, the dependency graph between them and
//! the row count. Structural changes are staged on a copy of that state and
//! swapped in only when they succeed. Cell edits and structural changes
//! recalculate just the affected columns, in dependency order, and report
//! the changed names to subscribers.

mod notify;
mod ops;
mod recalc;
mod state;

use std::cell::Cell;
use std::rc::Rc;

use calctable_engine::engine::{Value, format_value};
use calctable_engine::{ConstantLookup, Formula, Unit};
use log::{debug, warn};

pub use notify::SubscriptionId;

use crate::column::{Column, ColumnType};
use crate::config::EngineConfig;
use crate::error::{Result, TableError};
use notify::Subscribers;
use recalc::{RecalcContext, RecalcGuard, probe_unit};
use state::TableState;

pub struct DataTable {
    /// Columns, graph and row count
    state: TableState,
    /// Limits and defaults
    config: EngineConfig,
    /// Workspace constants for bare identifiers and unmatched references
    constants: Option<Box<dyn ConstantLookup>>,
    /// Change listeners
    subscribers: Subscribers,
    /// Set while a recalculation batch runs
    recalculating: Rc<Cell<bool>>,
}

impl Default for DataTable {
    fn default() -> Self {
        DataTable::new()
    }
}

impl DataTable {
    pub fn new() -> Self {
        DataTable::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        DataTable {
            state: TableState::default(),
            config,
            constants: None,
            subscribers: Subscribers::default(),
            recalculating: Rc::new(Cell::new(false)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn row_count(&self) -> usize {
        self.state.row_count
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.state.registry.names()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.state.registry.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.state.registry.iter()
    }

    pub fn columns_of_kind(&self, column_type: ColumnType) -> Vec<&Column> {
        self.state.registry.columns_of_kind(column_type)
    }

    pub fn editable_columns(&self) -> Vec<&str> {
        self.state.registry.editable_columns()
    }

    /// Columns that read `name` directly.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.state.graph.dependents(name)
    }

    pub fn column_values(&self, name: &str) -> Result<&[Value]> {
        Ok(&self.state.registry.require(name)?.values)
    }

    /// Cell text at the column's display precision.
    pub fn display_value(&self, name: &str, row: usize) -> Result<String> {
        let column = self.state.registry.require(name)?;
        let value = column.values.get(row).ok_or_else(|| {
            TableError::validation(format!(
                "Row {} out of range (table has {} rows)",
                row, self.state.row_count
            ))
        })?;
        Ok(format_value(value, column.precision))
    }

    /// Install workspace constants. Call [`recalculate_all`](Self::recalculate_all)
    /// afterwards to refresh values that use them.
    pub fn set_constants(&mut self, constants: Box<dyn ConstantLookup>) {
        self.constants = Some(constants);
    }

    pub fn clear_constants(&mut self) {
        self.constants = None;
    }

    /// Check a formula against the current columns and constants without
    /// changing anything.
    pub fn validate_formula(&self, formula: &str) -> Result<()> {
        let parsed = Formula::parse(formula)?;
        let mut available: Vec<String> = self
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        available.extend(self.resolvable_constants(&parsed));
        calctable_engine::validate_formula(formula, &available)?;
        Ok(())
    }

    /// The unit `formula` would produce with the current column units.
    /// `None` for a dimensionless result.
    pub fn preview_formula_unit(&self, formula: &str) -> Result<Option<Unit>> {
        let parsed = Formula::parse(formula)?;
        let unit = probe_unit(&self.state.registry, &parsed, self.constants.as_deref(), false)?;
        Ok(Some(unit).filter(|u| !u.is_plain()))
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&[String]) + 'static,
    {
        self.subscribers.add(Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn is_recalculating(&self) -> bool {
        self.recalculating.get()
    }

    /// Recalculate every column in dependency order.
    pub fn recalculate_all(&mut self) {
        let order = self.state.graph.full_order();
        self.run_recalculation(order, Vec::new());
    }

    /// Names among the formula's identifiers and references that the
    /// injected constants resolve.
    fn resolvable_constants(&self, formula: &Formula) -> Vec<String> {
        let Some(constants) = self.constants.as_deref() else {
            return Vec::new();
        };
        formula
            .identifiers()
            .into_iter()
            .chain(formula.references().iter().cloned())
            .filter(|name| constants.lookup(name).is_some())
            .collect()
    }

    /// Recalculate `order` and notify subscribers with `removed` followed by
    /// the recalculated names.
    fn run_recalculation(&mut self, order: Vec<String>, removed: Vec<String>) {
        let Some(guard) = RecalcGuard::acquire(&self.recalculating) else {
            warn!("recalculation already in progress, skipping {:?}", order);
            return;
        };
        debug!("recalculating {} column(s): {:?}", order.len(), order);
        let ctx = RecalcContext {
            constants: self.constants.as_deref(),
            derivative_epsilon: self.config.derivative_epsilon,
        };
        self.state.recalculate(&order, &ctx);
        drop(guard);

        let mut changed = removed;
        changed.extend(order);
        self.subscribers.notify(&changed);
    }

    /// Apply `change` to a copy of the state and keep it only on success.
    fn transact<T>(
        &mut self,
        action: &str,
        change: impl FnOnce(&mut TableState, &Staging) -> Result<T>,
    ) -> Result<T> {
        let mut next = self.state.clone();
        let staging = Staging {
            config: &self.config,
            constants: self.constants.as_deref(),
        };
        match change(&mut next, &staging) {
            Ok(value) => {
                self.state = next;
                Ok(value)
            }
            Err(err) => {
                warn!("{} rejected: {}", action, err);
                Err(err)
            }
        }
    }
}

/// Read-only context handed to staged changes.
struct Staging<'a> {
    config: &'a EngineConfig,
    constants: Option<&'a dyn ConstantLookup>,
}
