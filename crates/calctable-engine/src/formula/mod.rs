//! Safe formula evaluation.
//!
//! Formulas are arithmetic expressions over braced column references, e.g.
//! `0.5 * {m} * {v}**2` or `sqrt({x}**2 + {y}**2)`. They are tokenized and
//! parsed into an [`Expr`] tree and interpreted directly; there is no path from
//! formula text to anything but the interpreter in this module.
//!
//! - [`Formula::parse`] compiles once, [`Formula::evaluate`] runs per row
//! - [`Bindings`] supplies `{name}` values and bare-identifier constants
//! - [`validate_formula`] is a dry run used before a formula is committed

mod ast;
mod error;
mod eval;
mod functions;
mod lexer;
mod parser;

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use error::FormulaError;
pub use functions::Function;

use crate::units::Quantity;

/// Name lookup used during evaluation.
pub trait Bindings {
    /// Value of a braced `{name}` reference.
    fn resolve(&self, name: &str) -> Option<Quantity>;

    /// Value of a bare identifier. Checked before the built-in `pi` and `e`.
    fn constant(&self, _name: &str) -> Option<Quantity> {
        None
    }
}

impl<S: BuildHasher> Bindings for HashMap<String, Quantity, S> {
    fn resolve(&self, name: &str) -> Option<Quantity> {
        self.get(name).cloned()
    }
}

impl Bindings for BTreeMap<String, Quantity> {
    fn resolve(&self, name: &str) -> Option<Quantity> {
        self.get(name).cloned()
    }
}

/// Source of workspace constants.
pub trait ConstantLookup {
    fn lookup(&self, name: &str) -> Option<Quantity>;
}

impl<S: BuildHasher> ConstantLookup for HashMap<String, Quantity, S> {
    fn lookup(&self, name: &str) -> Option<Quantity> {
        self.get(name).cloned()
    }
}

impl ConstantLookup for BTreeMap<String, Quantity> {
    fn lookup(&self, name: &str) -> Option<Quantity> {
        self.get(name).cloned()
    }
}

/// Bindings layered over workspace constants.
///
/// Braced references look at `bindings` first and fall back to `constants`;
/// bare identifiers only consult `constants`.
pub struct WithConstants<'a> {
    pub bindings: &'a dyn Bindings,
    pub constants: &'a dyn ConstantLookup,
}

impl Bindings for WithConstants<'_> {
    fn resolve(&self, name: &str) -> Option<Quantity> {
        self.bindings
            .resolve(name)
            .or_else(|| self.constants.lookup(name))
    }

    fn constant(&self, name: &str) -> Option<Quantity> {
        self.bindings
            .constant(name)
            .or_else(|| self.constants.lookup(name))
    }
}

/// A parsed formula.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
    references: Vec<String>,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Formula, FormulaError> {
        let expr = parser::parse(source)?;
        let references = expr.references();
        Ok(Formula {
            source: source.to_string(),
            expr,
            references,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Braced references in first-appearance order.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Bare identifiers, resolved against constants at evaluation time.
    pub fn identifiers(&self) -> Vec<String> {
        self.expr.identifiers()
    }

    pub fn evaluate(&self, bindings: &dyn Bindings) -> Result<Quantity, FormulaError> {
        eval::eval(&self.expr, bindings)
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(source: &str, bindings: &dyn Bindings) -> Result<Quantity, FormulaError> {
    Formula::parse(source)?.evaluate(bindings)
}

/// Evaluate an already-built expression tree.
pub fn evaluate_expr(expr: &Expr, bindings: &dyn Bindings) -> Result<Quantity, FormulaError> {
    eval::eval(expr, bindings)
}

/// Check a formula against the names it may use without touching any state.
///
/// Every name is bound to a dimensionless 1.0 for a dry run. Failures that
/// come from those dummy magnitudes (division by zero, domain errors) do not
/// count against the formula.
pub fn validate_formula<S: AsRef<str>>(
    source: &str,
    available_names: &[S],
) -> Result<(), FormulaError> {
    let formula = Formula::parse(source)?;
    let known = |name: &str| available_names.iter().any(|n| n.as_ref() == name);

    if let Some(missing) = formula.references().iter().find(|r| !known(r.as_str())) {
        return Err(FormulaError::UnknownReference(missing.clone()));
    }

    let dry_run = DryRun { known: &known };
    match formula.evaluate(&dry_run) {
        Ok(_) => Ok(()),
        Err(e) if e.is_numeric_domain() => Ok(()),
        Err(e) => Err(e),
    }
}

struct DryRun<'a> {
    known: &'a dyn Fn(&str) -> bool,
}

impl Bindings for DryRun<'_> {
    fn resolve(&self, name: &str) -> Option<Quantity> {
        (self.known)(name).then(|| Quantity::dimensionless(1.0))
    }

    fn constant(&self, name: &str) -> Option<Quantity> {
        self.resolve(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use pretty_assertions::assert_eq;

    fn bind(pairs: &[(&str, f64, &str)]) -> HashMap<String, Quantity> {
        pairs
            .iter()
            .map(|(name, value, unit)| {
                (name.to_string(), Quantity::parse(*value, Some(unit)).unwrap())
            })
            .collect()
    }

    fn eval_plain(source: &str) -> f64 {
        evaluate(source, &HashMap::<String, Quantity>::new()).unwrap().value
    }

    #[test]
    fn test_arithmetic_follows_python() {
        assert_eq!(eval_plain("1 + 2 * 3"), 7.0);
        assert_eq!(eval_plain("-2**2"), -4.0);
        assert_eq!(eval_plain("2**-1"), 0.5);
        assert_eq!(eval_plain("-7 // 2"), -4.0);
        assert_eq!(eval_plain("-7 % 2"), 1.0);
        assert_eq!(eval_plain("round(2.5)"), 2.0);
        assert_eq!(eval_plain("round(3.14159, 2)"), 3.14);
        assert!((eval_plain("pi") - std::f64::consts::PI).abs() < 1e-15);
        assert!((eval_plain("log(e)") - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_units_flow_through_operations() {
        let b = bind(&[("d", 10.0, "m"), ("t", 2.0, "s")]);
        let speed = evaluate("{d}/{t}", &b).unwrap();
        assert_eq!(speed.value, 5.0);
        assert_eq!(speed.unit.format(), "m/s");

        let err = evaluate("{d}+{t}", &b).unwrap_err();
        assert!(matches!(err, FormulaError::Unit(_)));

        let area = evaluate("{d}**2", &b).unwrap();
        assert_eq!(area.unit.format(), "m^2");
    }

    #[test]
    fn test_power_with_unit_needs_constant_exponent() {
        let b = bind(&[("d", 4.0, "m"), ("n", 2.0, "")]);
        assert!(matches!(evaluate("{d}**{n}", &b), Err(FormulaError::Unit(_))));
        assert!(matches!(evaluate("{d}**pi", &b), Err(FormulaError::Unit(_))));
        let root = evaluate("{d}**0.5", &b).unwrap();
        assert_eq!(root.value, 2.0);
        assert_eq!(root.unit.format(), "m^(1/2)");
    }

    #[test]
    fn test_numeric_failures() {
        let none = HashMap::<String, Quantity>::new();
        assert_eq!(evaluate("1/0", &none), Err(FormulaError::DivisionByZero));
        assert_eq!(evaluate("1 % 0", &none), Err(FormulaError::DivisionByZero));
        assert!(matches!(evaluate("(-8)**0.5", &none), Err(FormulaError::Domain(_))));
        assert_eq!(evaluate("10**400", &none), Err(FormulaError::NotFinite));
        assert_eq!(
            evaluate("{missing} + 1", &none),
            Err(FormulaError::UnknownReference("missing".into()))
        );
    }

    #[test]
    fn test_constants_layer_over_bindings() {
        let columns = bind(&[("x", 2.0, "")]);
        let constants = bind(&[("g", 9.81, "m/s^2"), ("e", 1.602e-19, "C")]);
        let scope = WithConstants {
            bindings: &columns,
            constants: &constants,
        };
        let weight = evaluate("{x} * g", &scope).unwrap();
        assert!((weight.value - 19.62).abs() < 1e-12);
        assert_eq!(weight.unit.dimension(), Unit::parse("N/kg").unwrap().dimension());

        // workspace constants shadow the built-in e
        let charge = evaluate("e", &scope).unwrap();
        assert_eq!(charge.unit.format(), "C");

        // braced references fall back to constants
        assert!(evaluate("{g}", &scope).is_ok());
    }

    #[test]
    fn test_validate_formula_dry_run() {
        let names = ["a", "b"];
        assert_eq!(validate_formula("{a} + {b}", &names), Ok(()));
        // 1/(a-b) divides by zero with dummy values but is still a valid formula
        assert_eq!(validate_formula("1 / ({a} - {b})", &names), Ok(()));
        assert_eq!(
            validate_formula("{a} + {c}", &names),
            Err(FormulaError::UnknownReference("c".into()))
        );
        assert!(matches!(
            validate_formula("{a} +", &names),
            Err(FormulaError::Syntax { .. })
        ));
        assert!(matches!(
            validate_formula("{a} if {b} else 0", &names),
            Err(FormulaError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_references_in_first_appearance_order() {
        let f = Formula::parse("{b} * {a} + {b}").unwrap();
        assert_eq!(f.references(), ["b".to_string(), "a".to_string()]);
        assert_eq!(f.source(), "{b} * {a} + {b}");

        let f = Formula::parse("g * {t}**2 / 2 + pi * g").unwrap();
        assert_eq!(f.identifiers(), vec!["g".to_string(), "pi".to_string()]);
        assert_eq!(f.references(), ["t".to_string()]);
    }
}
