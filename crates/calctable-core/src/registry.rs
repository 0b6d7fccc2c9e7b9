//! Ordered column storage with name lookup and per-kind validation.

use calctable_engine::engine::rename_reference;
use calctable_engine::generators::RangeSpec;
use calctable_engine::Formula;

use crate::column::{Column, ColumnKind, ColumnType};
use crate::error::{Result, TableError};

const RESERVED_NAME_CHARS: &[char] = &['{', '}', '[', ']', '(', ')', ',', ';'];
const MAX_DERIVATIVE_ORDER: u8 = 3;

/// Check a column name: non-empty and free of characters that clash with
/// formula syntax.
pub fn validate_column_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(TableError::validation("Column name must not be empty"));
    }
    if let Some(c) = name.chars().find(|c| RESERVED_NAME_CHARS.contains(c)) {
        return Err(TableError::validation(format!(
            "Column name '{}' contains reserved character '{}'",
            name, c
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, Default)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
}

impl ColumnRegistry {
    pub fn new() -> ColumnRegistry {
        ColumnRegistry::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub(crate) fn require(&self, name: &str) -> Result<&Column> {
        self.get(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    pub(crate) fn require_mut(&mut self, name: &str) -> Result<&mut Column> {
        self.get_mut(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns_of_kind(&self, column_type: ColumnType) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.column_type() == column_type)
            .collect()
    }

    /// Names of columns whose cells accept direct edits.
    pub fn editable_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_editable())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// The first UNCERTAINTY column whose reference is `input`.
    pub fn uncertainty_source(&self, input: &str) -> Option<&Column> {
        self.columns.iter().find(|c| {
            matches!(&c.kind, ColumnKind::Uncertainty { reference, .. } if reference == input)
        })
    }

    /// Every UNCERTAINTY column whose reference is `name`.
    pub fn linked_uncertainties(&self, name: &str) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| {
                matches!(&c.kind, ColumnKind::Uncertainty { reference, .. } if reference == name)
            })
            .map(|c| c.name.clone())
            .collect()
    }

    /// Validate `kind` as the definition of column `name`.
    pub fn validate_kind(&self, name: &str, kind: &ColumnKind, max_range_points: usize) -> Result<()> {
        match kind {
            ColumnKind::Data => Ok(()),
            ColumnKind::Calculated { formula, .. } => {
                if formula.trim().is_empty() {
                    return Err(TableError::validation(format!(
                        "Calculated column '{}' needs a formula",
                        name
                    )));
                }
                Formula::parse(formula)?;
                Ok(())
            }
            ColumnKind::Derivative {
                numerator,
                denominator,
                order,
                ..
            } => {
                if numerator == denominator {
                    return Err(TableError::validation(
                        "Derivative numerator and denominator must differ",
                    ));
                }
                self.require_existing(numerator)?;
                self.require_existing(denominator)?;
                if !(1..=MAX_DERIVATIVE_ORDER).contains(order) {
                    return Err(TableError::validation(format!(
                        "Derivative order must be 1..={}, got {}",
                        MAX_DERIVATIVE_ORDER, order
                    )));
                }
                Ok(())
            }
            ColumnKind::Range(spec) => validate_range(spec, max_range_points),
            ColumnKind::Interpolation { x, y, eval, .. } => {
                self.require_existing(x)?;
                self.require_existing(y)?;
                if let Some(e) = eval {
                    self.require_existing(e)?;
                }
                Ok(())
            }
            ColumnKind::Uncertainty { reference, .. } => {
                let source = self.require_existing(reference)?;
                match source.column_type() {
                    ColumnType::Data | ColumnType::Calculated => Ok(()),
                    other => Err(TableError::validation(format!(
                        "Uncertainty reference '{}' must be a data or calculated column, not {:?}",
                        reference, other
                    ))),
                }
            }
        }
    }

    /// Append a column after validating its name and definition.
    pub fn add(&mut self, column: Column, max_range_points: usize) -> Result<()> {
        validate_column_name(&column.name)?;
        if self.contains(&column.name) {
            return Err(TableError::validation(format!(
                "Column '{}' already exists",
                column.name
            )));
        }
        self.validate_kind(&column.name, &column.kind, max_range_points)?;
        self.columns.push(column);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Column> {
        let index = self
            .index_of(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))?;
        Ok(self.columns.remove(index))
    }

    /// Rename a column and rewrite every reference to it.
    ///
    /// Formulas are rewritten and re-parsed; a formula that no longer parses
    /// fails the whole rename. Callers work on a copy.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        validate_column_name(new)?;
        if self.contains(new) {
            return Err(TableError::validation(format!("Column '{}' already exists", new)));
        }
        self.require_mut(old)?.name = new.to_string();

        for column in &mut self.columns {
            if let ColumnKind::Calculated { formula, .. } = &mut column.kind {
                let rewritten = rename_reference(formula, old, new);
                if rewritten != *formula {
                    Formula::parse(&rewritten).map_err(|e| {
                        TableError::validation(format!(
                            "Renaming '{}' breaks formula of '{}': {}",
                            old, column.name, e
                        ))
                    })?;
                    *formula = rewritten;
                }
            }
            column.kind.relabel(old, new);
        }
        Ok(())
    }

    /// Move `name` to position `to` (clamped to the end).
    pub fn move_column(&mut self, name: &str, to: usize) -> Result<()> {
        let from = self
            .index_of(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))?;
        let column = self.columns.remove(from);
        let to = to.min(self.columns.len());
        self.columns.insert(to, column);
        Ok(())
    }

    fn require_existing(&self, name: &str) -> Result<&Column> {
        self.get(name).ok_or_else(|| {
            TableError::validation(format!("Referenced column '{}' does not exist", name))
        })
    }
}

fn validate_range(spec: &RangeSpec, max_range_points: usize) -> Result<()> {
    spec.validate(max_range_points)
        .map_err(|e| TableError::validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calctable_engine::generators::DifferenceMethod;
    use pretty_assertions::assert_eq;

    fn data(name: &str) -> Column {
        Column::new(name, ColumnKind::Data, 0, 6)
    }

    fn calculated(name: &str, formula: &str) -> Column {
        Column::new(
            name,
            ColumnKind::Calculated {
                formula: formula.to_string(),
                propagate_uncertainty: false,
            },
            0,
            6,
        )
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_column_name("x pos").is_ok());
        assert!(validate_column_name("").is_err());
        assert!(validate_column_name("  ").is_err());
        for bad in ["a{b", "a}", "f(x)", "a,b", "a;b", "a[0]"] {
            assert!(validate_column_name(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_kinds() {
        let mut reg = ColumnRegistry::new();
        reg.add(data("t"), 1000).unwrap();
        assert!(matches!(reg.add(data("t"), 1000), Err(TableError::Validation(_))));
        assert!(reg.add(calculated("v", "  "), 1000).is_err());
        assert!(matches!(
            reg.add(calculated("v", "{t} +"), 1000),
            Err(TableError::FormulaSyntax(_))
        ));

        let derivative = |num: &str, den: &str, order| {
            Column::new(
                "d",
                ColumnKind::Derivative {
                    numerator: num.into(),
                    denominator: den.into(),
                    order,
                    method: DifferenceMethod::Forward,
                },
                0,
                6,
            )
        };
        reg.add(data("x"), 1000).unwrap();
        assert!(reg.add(derivative("x", "x", 1), 1000).is_err());
        assert!(reg.add(derivative("x", "missing", 1), 1000).is_err());
        assert!(reg.add(derivative("x", "t", 4), 1000).is_err());
        reg.add(derivative("x", "t", 2), 1000).unwrap();
        assert_eq!(reg.names(), vec!["t", "x", "d"]);
    }

    #[test]
    fn test_uncertainty_reference_kind() {
        let mut reg = ColumnRegistry::new();
        reg.add(data("x"), 1000).unwrap();
        let range = Column::new(
            "r",
            ColumnKind::Range(RangeSpec::Linspace {
                start: 0.0,
                stop: 1.0,
                count: 3,
            }),
            0,
            6,
        );
        reg.add(range, 1000).unwrap();
        let u = |reference: &str| {
            Column::new(
                "u",
                ColumnKind::Uncertainty {
                    reference: reference.into(),
                    mode: Default::default(),
                },
                0,
                6,
            )
        };
        assert!(reg.add(u("r"), 1000).is_err());
        reg.add(u("x"), 1000).unwrap();
        assert_eq!(reg.uncertainty_source("x").map(Column::name), Some("u"));
        assert_eq!(reg.linked_uncertainties("x"), vec!["u".to_string()]);
    }

    #[test]
    fn test_rename_rewrites_formulas_and_links() {
        let mut reg = ColumnRegistry::new();
        reg.add(data("t"), 1000).unwrap();
        reg.add(data("x"), 1000).unwrap();
        reg.add(calculated("v", "{x} / {t}"), 1000).unwrap();
        reg.rename("t", "time").unwrap();
        assert_eq!(reg.get("v").unwrap().kind.formula(), Some("{x} / {time}"));
        assert!(reg.get("t").is_none());
        assert!(reg.rename("x", "v").is_err());
        assert!(reg.rename("x", "a{b").is_err());
    }

    #[test]
    fn test_move_and_filter() {
        let mut reg = ColumnRegistry::new();
        for name in ["a", "b", "c"] {
            reg.add(data(name), 1000).unwrap();
        }
        reg.add(calculated("d", "{a}"), 1000).unwrap();
        reg.move_column("d", 0).unwrap();
        assert_eq!(reg.names(), vec!["d", "a", "b", "c"]);
        reg.move_column("d", 99).unwrap();
        assert_eq!(reg.names(), vec!["a", "b", "c", "d"]);
        assert_eq!(reg.columns_of_kind(ColumnType::Calculated).len(), 1);
        assert_eq!(reg.editable_columns(), vec!["a", "b", "c"]);
        assert!(matches!(reg.move_column("zz", 0), Err(TableError::ColumnNotFound(_))));
    }
}
