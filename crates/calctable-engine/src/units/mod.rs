//! Dimensional analysis over physical units.
//!
//! A [`Unit`] is an exponent vector over the seven SI base dimensions plus an
//! SI scale factor. The symbols a unit was written with are kept alongside so
//! that `km/h` still prints as `km/h` after arithmetic:
//!
//! - [`Unit::mul`] / [`Unit::div`] add or subtract exponents
//! - [`Unit::pow`] scales exponents by a rational
//! - exponents stay within [`MAX_EXPONENT_PART`]; arithmetic that would leave
//!   that range fails with [`UnitError::ExponentOverflow`]
//! - [`Quantity::add`] / [`Quantity::sub`] require identical dimensions and
//!   convert the right operand into the left operand's scale
//! - [`Unit::format`] renders `m/s^2`, or `dimensionless`

mod format;
mod parse;
mod registry;

use std::fmt;

use num_rational::Ratio;
use num_traits::{CheckedAdd, CheckedMul, One, Zero};
use thiserror::Error;

/// Rational exponent of a base dimension or unit symbol.
pub type Exponent = Ratio<i32>;

/// Number of SI base dimensions tracked.
pub const BASE_DIMENSIONS: usize = 7;

/// Largest numerator or denominator a unit exponent may carry.
pub const MAX_EXPONENT_PART: u32 = 1_000_000;

/// Unit errors raised by parsing and by quantity arithmetic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Unit mismatch: cannot {op} '{left}' and '{right}'")]
    UnitMismatch {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("Unit exponent out of range (limit {MAX_EXPONENT_PART})")]
    ExponentOverflow,
}

/// Accept `exp` only when it exists and both parts are within range.
pub(crate) fn checked_exponent(exp: Option<Exponent>) -> Result<Exponent, UnitError> {
    exp.filter(|e| {
        e.numer().unsigned_abs() <= MAX_EXPONENT_PART && e.denom().unsigned_abs() <= MAX_EXPONENT_PART
    })
    .ok_or(UnitError::ExponentOverflow)
}

/// Exponents over [length, mass, time, current, temperature, amount, luminosity].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dimension([Exponent; BASE_DIMENSIONS]);

impl Dimension {
    pub fn none() -> Dimension {
        Dimension([Exponent::zero(); BASE_DIMENSIONS])
    }

    pub(crate) fn from_ints(exponents: [i32; BASE_DIMENSIONS]) -> Dimension {
        Dimension(exponents.map(Exponent::from_integer))
    }

    pub fn exponents(&self) -> &[Exponent; BASE_DIMENSIONS] {
        &self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.iter().all(|e| e.is_zero())
    }

    fn combine(&self, other: &Dimension, sign: i32) -> Result<Dimension, UnitError> {
        let mut out = self.0;
        for (slot, rhs) in out.iter_mut().zip(other.0.iter()) {
            let rhs = if sign < 0 { -*rhs } else { *rhs };
            *slot = checked_exponent(slot.checked_add(&rhs))?;
        }
        Ok(Dimension(out))
    }

    fn scaled(&self, by: Exponent) -> Result<Dimension, UnitError> {
        let mut out = self.0;
        for slot in out.iter_mut() {
            *slot = checked_exponent(slot.checked_mul(&by))?;
        }
        Ok(Dimension(out))
    }
}

/// A physical unit: dimension vector, SI scale factor and display terms.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    dimension: Dimension,
    scale: f64,
    terms: Vec<(String, Exponent)>,
}

impl Unit {
    pub fn dimensionless() -> Unit {
        Unit {
            dimension: Dimension::none(),
            scale: 1.0,
            terms: Vec::new(),
        }
    }

    /// Parse a unit string such as `m/s^2`, `kg*m**2`, `m s⁻¹` or `J/(kg*K)`.
    pub fn parse(text: &str) -> Result<Unit, UnitError> {
        parse::parse_unit(text)
    }

    /// Parse an optional unit string, treating blank input as dimensionless.
    pub fn parse_optional(text: Option<&str>) -> Result<Unit, UnitError> {
        match text {
            Some(t) => Unit::parse(t),
            None => Ok(Unit::dimensionless()),
        }
    }

    /// A unit made of one symbol raised to the first power.
    pub(crate) fn from_symbol(symbol: &str) -> Option<Unit> {
        let (dimension, scale) = registry::lookup(symbol)?;
        Some(Unit {
            dimension,
            scale,
            terms: vec![(symbol.to_string(), Exponent::one())],
        })
    }

    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn terms(&self) -> &[(String, Exponent)] {
        &self.terms
    }

    /// True when the dimension vector is all zeros (angles included).
    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_none()
    }

    /// True for the bare number unit: no symbols, scale 1.
    pub fn is_plain(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn same_dimension(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Require identical dimension vectors, as addition and subtraction do.
    pub fn check_compatible(&self, other: &Unit, op: &'static str) -> Result<(), UnitError> {
        if self.same_dimension(other) {
            Ok(())
        } else {
            Err(UnitError::UnitMismatch {
                op,
                left: self.format(),
                right: other.format(),
            })
        }
    }

    /// Factor converting a magnitude expressed in `self` into `target`.
    pub fn conversion_factor(&self, target: &Unit) -> f64 {
        self.scale / target.scale
    }

    pub fn mul(&self, other: &Unit) -> Result<Unit, UnitError> {
        self.combine(other, 1)
    }

    pub fn div(&self, other: &Unit) -> Result<Unit, UnitError> {
        self.combine(other, -1)
    }

    pub fn pow(&self, by: Exponent) -> Result<Unit, UnitError> {
        let by = checked_exponent(Some(by))?;
        if by.is_zero() {
            return Ok(Unit::dimensionless());
        }
        let terms = self
            .terms
            .iter()
            .map(|(symbol, exp)| Ok((symbol.clone(), checked_exponent(exp.checked_mul(&by))?)))
            .collect::<Result<Vec<_>, UnitError>>()?;
        Ok(Unit {
            dimension: self.dimension.scaled(by)?,
            scale: self.scale.powf(exponent_to_f64(by)),
            terms,
        })
    }

    pub fn powi(&self, by: i32) -> Result<Unit, UnitError> {
        self.pow(Exponent::from_integer(by))
    }

    fn combine(&self, other: &Unit, sign: i32) -> Result<Unit, UnitError> {
        let mut terms = self.terms.clone();
        for (symbol, exp) in &other.terms {
            let exp = if sign < 0 { -*exp } else { *exp };
            match terms.iter_mut().find(|(s, _)| s == symbol) {
                Some((_, existing)) => *existing = checked_exponent(existing.checked_add(&exp))?,
                None => terms.push((symbol.clone(), exp)),
            }
        }
        terms.retain(|(_, exp)| !exp.is_zero());

        let scale = if sign > 0 {
            self.scale * other.scale
        } else {
            self.scale / other.scale
        };

        Ok(Unit {
            dimension: self.dimension.combine(&other.dimension, sign)?,
            scale,
            terms,
        })
    }

    /// Canonical rendering: `m/s^2`, `kg*m/s^2`, `1/s`, `dimensionless`.
    pub fn format(&self) -> String {
        format::format_canonical(self)
    }

    /// Display rendering with interpuncts and superscripts: `m·s⁻²`.
    /// Dimensionless units render as an empty string.
    pub fn format_pretty(&self) -> String {
        format::format_pretty(self)
    }
}

impl Default for Unit {
    fn default() -> Self {
        Unit::dimensionless()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl std::str::FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

pub(crate) fn exponent_to_f64(exp: Exponent) -> f64 {
    f64::from(*exp.numer()) / f64::from(*exp.denom())
}

/// Smallest-denominator rational within 1e-9 of `value`, if any up to `max_denom`.
pub fn rational_approximation(value: f64, max_denom: i32) -> Option<Exponent> {
    if !value.is_finite() {
        return None;
    }
    for denom in 1..=max_denom {
        let scaled = (value * f64::from(denom)).round();
        if scaled.abs() > f64::from(i32::MAX) {
            return None;
        }
        if (scaled / f64::from(denom) - value).abs() < 1e-9 {
            return Some(Exponent::new(scaled as i32, denom));
        }
    }
    None
}

/// A magnitude paired with its unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Quantity {
        Quantity { value, unit }
    }

    pub fn dimensionless(value: f64) -> Quantity {
        Quantity::new(value, Unit::dimensionless())
    }

    /// Build a quantity from a value and an optional unit string.
    pub fn parse(value: f64, unit: Option<&str>) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(value, Unit::parse_optional(unit)?))
    }

    /// Magnitude as a bare number, converting angle-like units to radians.
    pub fn to_plain(&self, context: &'static str) -> Result<f64, UnitError> {
        if self.unit.is_dimensionless() {
            Ok(self.value * self.unit.scale)
        } else {
            Err(UnitError::UnitMismatch {
                op: context,
                left: self.unit.format(),
                right: Unit::dimensionless().format(),
            })
        }
    }

    /// Magnitude of `self` expressed in `target`'s scale; dimensions must match.
    pub fn value_in(&self, target: &Unit, op: &'static str) -> Result<f64, UnitError> {
        target.check_compatible(&self.unit, op)?;
        Ok(self.value * self.unit.conversion_factor(target))
    }

    pub fn add(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        let rhs_value = rhs.value_in(&self.unit, "add")?;
        Ok(Quantity::new(self.value + rhs_value, self.unit.clone()))
    }

    pub fn sub(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        let rhs_value = rhs.value_in(&self.unit, "subtract")?;
        Ok(Quantity::new(self.value - rhs_value, self.unit.clone()))
    }

    pub fn mul(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        let unit = self.unit.mul(&rhs.unit)?;
        Ok(Quantity::new(self.value * rhs.value, unit).fold_cancelled())
    }

    pub fn div(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        let unit = self.unit.div(&rhs.unit)?;
        Ok(Quantity::new(self.value / rhs.value, unit).fold_cancelled())
    }

    /// `m/km` style results collapse into a plain number; a lone `deg` stays.
    fn fold_cancelled(self) -> Quantity {
        if self.unit.is_dimensionless() && self.unit.terms.len() > 1 {
            Quantity::dimensionless(self.value * self.unit.scale)
        } else {
            self
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_plain() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.unit)
        }
    }
}
