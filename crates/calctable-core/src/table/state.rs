use calctable_engine::engine::DependencyGraph;
use calctable_engine::Formula;

use crate::column::{Column, ColumnKind, UncertaintyMode};
use crate::error::Result;
use crate::registry::ColumnRegistry;

/// Everything a structural change touches. Cloned, edited and swapped in
/// as a whole so a failed change leaves no trace.
#[derive(Clone, Debug, Default)]
pub(crate) struct TableState {
    /// Columns in display order
    pub(crate) registry: ColumnRegistry,
    /// Column -> columns it reads
    pub(crate) graph: DependencyGraph,
    /// Shared length of every column
    pub(crate) row_count: usize,
}

impl TableState {
    /// Names `column` reads, as graph edges.
    ///
    /// A propagated uncertainty column reads its calculated reference plus
    /// the uncertainty source of each of that formula's inputs.
    pub(crate) fn edges_for(&self, column: &Column) -> Vec<String> {
        match &column.kind {
            ColumnKind::Data | ColumnKind::Range(_) => Vec::new(),
            ColumnKind::Calculated { formula, .. } => Formula::parse(formula)
                .map(|f| f.references().to_vec())
                .unwrap_or_default(),
            ColumnKind::Uncertainty {
                mode: UncertaintyMode::Manual,
                ..
            } => Vec::new(),
            ColumnKind::Uncertainty {
                reference,
                mode: UncertaintyMode::Propagated,
            } => {
                let mut edges = vec![reference.clone()];
                let inputs = self
                    .registry
                    .get(reference)
                    .and_then(|c| c.kind.formula())
                    .and_then(|f| Formula::parse(f).ok())
                    .map(|f| f.references().to_vec())
                    .unwrap_or_default();
                for input in inputs {
                    if let Some(source) = self.registry.uncertainty_source(&input) {
                        if source.name != column.name && !edges.contains(&source.name) {
                            edges.push(source.name.clone());
                        }
                    }
                }
                edges
            }
            kind => kind.links().into_iter().map(str::to_string).collect(),
        }
    }

    /// (Re)register `name` in the graph from its current definition.
    pub(crate) fn register(&mut self, name: &str) -> Result<()> {
        let column = self.registry.require(name)?;
        let edges = self.edges_for(column);
        self.graph.register(name, &edges)?;
        Ok(())
    }

    /// Re-register every propagated uncertainty column, since their edges
    /// follow other columns' formulas and uncertainty links. Returns their
    /// names.
    pub(crate) fn refresh_propagated(&mut self) -> Result<Vec<String>> {
        let propagated: Vec<String> = self
            .registry
            .iter()
            .filter(|c| {
                matches!(
                    c.kind,
                    ColumnKind::Uncertainty {
                        mode: UncertaintyMode::Propagated,
                        ..
                    }
                )
            })
            .map(|c| c.name.clone())
            .collect();
        for name in &propagated {
            self.register(name)?;
        }
        Ok(propagated)
    }
}
