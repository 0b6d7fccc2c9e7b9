//! Uncertainty propagation.
//!
//! For `f(x1..xn)` with known uncertainties `δxi`:
//!
//! ```text
//! δf = sqrt( Σ (∂f/∂xi · δxi)² )
//! ```
//!
//! The partials are derived symbolically once per formula
//! ([`UncertaintyPropagator::new`]) and evaluated per row over SI
//! magnitudes: every input and its `δxi` is scaled by its unit's factor
//! (degrees become radians). The combined `δf` is then expressed in the
//! unit the formula itself produces.

mod diff;

use std::collections::HashMap;
use std::hash::BuildHasher;

use thiserror::Error;

use crate::formula::{Bindings, Expr, Formula, FormulaError};
use crate::units::Quantity;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropagationError {
    #[error("Cannot propagate through '{operation}' with respect to {variable}")]
    NotDifferentiable {
        operation: &'static str,
        variable: String,
    },

    #[error("Partial derivative with respect to {variable} failed: {source}")]
    Evaluation {
        variable: String,
        source: FormulaError,
    },

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

#[derive(Clone, Debug)]
struct Partial {
    variable: String,
    derivative: Result<Expr, PropagationError>,
}

/// Partial derivatives of one formula, ready to evaluate row by row.
#[derive(Clone, Debug)]
pub struct UncertaintyPropagator {
    formula: Formula,
    partials: Vec<Partial>,
}

impl UncertaintyPropagator {
    pub fn new(formula: &Formula) -> UncertaintyPropagator {
        let partials = formula
            .references()
            .iter()
            .map(|variable| Partial {
                variable: variable.clone(),
                derivative: diff::differentiate(formula.expr(), variable),
            })
            .collect();
        UncertaintyPropagator {
            formula: formula.clone(),
            partials,
        }
    }

    /// The formula's references, in first-appearance order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.partials.iter().map(|p| p.variable.as_str())
    }

    /// The symbolic partial `∂f/∂variable`, if it could be derived.
    pub fn partial(&self, variable: &str) -> Option<&Result<Expr, PropagationError>> {
        self.partials
            .iter()
            .find(|p| p.variable == variable)
            .map(|p| &p.derivative)
    }

    /// Combined uncertainty for one row.
    ///
    /// `uncertainty(name)` returns the input's uncertainty in the input's own
    /// unit, or `None` when it has none. Inputs without uncertainty are
    /// skipped entirely, so a non-differentiable term only fails rows where
    /// it actually matters. The result is in the formula's result unit.
    pub fn propagate(
        &self,
        values: &dyn Bindings,
        uncertainty: &dyn Fn(&str) -> Option<f64>,
    ) -> Result<f64, PropagationError> {
        let magnitudes = SiMagnitudes(values);
        let mut sum = 0.0;
        for partial in &self.partials {
            let delta = match uncertainty(&partial.variable) {
                Some(d) if d != 0.0 => d,
                _ => continue,
            };
            let derivative = partial.derivative.as_ref().map_err(Clone::clone)?;
            let slope = crate::formula::evaluate_expr(derivative, &magnitudes).map_err(|source| {
                PropagationError::Evaluation {
                    variable: partial.variable.clone(),
                    source,
                }
            })?;
            let scale = values
                .resolve(&partial.variable)
                .map_or(1.0, |q| q.unit.scale());
            let term = slope.value * delta * scale;
            sum += term * term;
        }
        if sum == 0.0 {
            return Ok(0.0);
        }
        let result = self.formula.evaluate(values)?;
        Ok(sum.sqrt() / result.unit.scale())
    }
}

/// Parse `formula` and propagate the given uncertainties through it.
pub fn propagate_uncertainty<S: BuildHasher>(
    formula: &str,
    values: &dyn Bindings,
    uncertainties: &HashMap<String, f64, S>,
) -> Result<f64, PropagationError> {
    let formula = Formula::parse(formula)?;
    UncertaintyPropagator::new(&formula).propagate(values, &|name| uncertainties.get(name).copied())
}

/// Rebinds every quantity as its bare SI magnitude, so `1 km` reads as
/// `1000` and `90 deg` as `π/2`.
struct SiMagnitudes<'a>(&'a dyn Bindings);

fn si_magnitude(q: Quantity) -> Quantity {
    Quantity::dimensionless(q.value * q.unit.scale())
}

impl Bindings for SiMagnitudes<'_> {
    fn resolve(&self, name: &str) -> Option<Quantity> {
        self.0.resolve(name).map(si_magnitude)
    }

    fn constant(&self, name: &str) -> Option<Quantity> {
        self.0.constant(name).map(si_magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64, &str)]) -> HashMap<String, Quantity> {
        pairs
            .iter()
            .map(|(n, v, u)| (n.to_string(), Quantity::parse(*v, Some(u)).unwrap()))
            .collect()
    }

    fn sigmas(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(n, d)| (n.to_string(), *d)).collect()
    }

    #[test]
    fn test_sum_adds_in_quadrature() {
        let v = values(&[("a", 2.0, ""), ("b", 3.0, "")]);
        let d = propagate_uncertainty("{a} + {b}", &v, &sigmas(&[("a", 0.1), ("b", 0.2)])).unwrap();
        assert!((d - 0.05f64.sqrt()).abs() < 1e-12);
        assert!((d - 0.2236).abs() < 1e-4);
    }

    #[test]
    fn test_product_uses_partials() {
        // d(xy) = sqrt((y dx)^2 + (x dy)^2)
        let v = values(&[("x", 2.0, "m"), ("y", 5.0, "s")]);
        let d = propagate_uncertainty("{x} * {y}", &v, &sigmas(&[("x", 0.1), ("y", 0.2)])).unwrap();
        let expected = ((5.0f64 * 0.1).powi(2) + (2.0f64 * 0.2).powi(2)).sqrt();
        assert!((d - expected).abs() < 1e-12);
    }

    #[test]
    fn test_no_uncertain_inputs_gives_zero() {
        let v = values(&[("a", 2.0, "")]);
        assert_eq!(propagate_uncertainty("{a}**2", &v, &sigmas(&[])).unwrap(), 0.0);
    }

    #[test]
    fn test_non_differentiable_only_fails_when_uncertain() {
        let v = values(&[("a", 2.4, ""), ("b", 1.0, "")]);
        let f = Formula::parse("round({a}) + {b}").unwrap();
        let p = UncertaintyPropagator::new(&f);

        let only_b = sigmas(&[("b", 0.5)]);
        assert_eq!(p.propagate(&v, &|n| only_b.get(n).copied()).unwrap(), 0.5);

        let with_a = sigmas(&[("a", 0.1)]);
        assert!(matches!(
            p.propagate(&v, &|n| with_a.get(n).copied()),
            Err(PropagationError::NotDifferentiable { operation: "round", .. })
        ));
    }

    #[test]
    fn test_mixed_prefixes_propagate_in_the_result_unit() {
        // 1 km ± 0.1 km plus 500 m ± 200 m is in km: sqrt(0.1² + 0.2²)
        let v = values(&[("a", 1.0, "km"), ("b", 500.0, "m")]);
        let d = propagate_uncertainty("{a} + {b}", &v, &sigmas(&[("a", 0.1), ("b", 200.0)])).unwrap();
        assert!((d - 0.05f64.sqrt()).abs() < 1e-12);

        // Same inputs, other order: the result is in m
        let d = propagate_uncertainty("{b} + {a}", &v, &sigmas(&[("a", 0.1), ("b", 200.0)])).unwrap();
        assert!((d - 50_000.0f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_product_uses_si_slopes() {
        // 2 km * 3 s with δ = 0.1 km, 0.5 s gives km*s
        let v = values(&[("x", 2.0, "km"), ("t", 3.0, "s")]);
        let d = propagate_uncertainty("{x} * {t}", &v, &sigmas(&[("x", 0.1), ("t", 0.5)])).unwrap();
        let expected = ((3.0f64 * 0.1).powi(2) + (2.0f64 * 0.5).powi(2)).sqrt();
        assert!((d - expected).abs() < 1e-12);
    }

    #[test]
    fn test_angles_in_degrees_propagate_in_radians() {
        // d sin(t) = cos(t) δt with t and δt in radians
        let v = values(&[("t", 90.0, "deg")]);
        let d = propagate_uncertainty("sin({t})", &v, &sigmas(&[("t", 1.0)])).unwrap();
        assert!(d.abs() < 1e-12);

        let v = values(&[("t", 60.0, "deg")]);
        let d = propagate_uncertainty("sin({t})", &v, &sigmas(&[("t", 1.0)])).unwrap();
        let expected = 0.5 * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-12);

        // A result still in degrees reports δ in degrees
        let d = propagate_uncertainty("{t} * 2", &v, &sigmas(&[("t", 1.0)])).unwrap();
        assert!((d - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_evaluation_failure_is_reported() {
        // d sqrt(x)/dx = 0.5/sqrt(x) divides by zero at x = 0
        let v = values(&[("x", 0.0, "")]);
        let err = propagate_uncertainty("sqrt({x})", &v, &sigmas(&[("x", 0.1)])).unwrap_err();
        assert!(matches!(err, PropagationError::Evaluation { .. }));
    }
}
