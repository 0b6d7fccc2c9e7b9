//! The whitelisted formula functions.
//!
//! Unit handling: `abs` and `round` keep the argument's unit, `min`/`max`
//! convert every argument into the first one's unit, `sqrt` halves the
//! exponents, everything else needs a dimensionless argument (angles in
//! `deg` are converted to radians first).

use super::FormulaError;
use crate::units::{Exponent, Quantity, Unit};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    Abs,
    Round,
    Min,
    Max,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Log,
    Log10,
    Exp,
}

const ALL: &[Function] = &[
    Function::Abs,
    Function::Round,
    Function::Min,
    Function::Max,
    Function::Sqrt,
    Function::Sin,
    Function::Cos,
    Function::Tan,
    Function::Asin,
    Function::Acos,
    Function::Atan,
    Function::Log,
    Function::Log10,
    Function::Exp,
];

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Round => "round",
            Function::Min => "min",
            Function::Max => "max",
            Function::Sqrt => "sqrt",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Log => "log",
            Function::Log10 => "log10",
            Function::Exp => "exp",
        }
    }

    /// All whitelisted function names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        ALL.iter().map(|f| f.name())
    }

    pub(crate) fn check_arity(self, got: usize) -> Result<(), FormulaError> {
        let (ok, expected) = match self {
            Function::Round | Function::Log => ((1..=2).contains(&got), "1 or 2"),
            Function::Min | Function::Max => (got >= 1, "at least 1"),
            _ => (got == 1, "1"),
        };
        if ok {
            Ok(())
        } else {
            Err(FormulaError::Arity {
                function: self.name(),
                expected,
                got,
            })
        }
    }

    pub(crate) fn apply(self, args: &[Quantity]) -> Result<Quantity, FormulaError> {
        self.check_arity(args.len())?;
        let first = &args[0];
        match self {
            Function::Abs => Ok(Quantity::new(first.value.abs(), first.unit.clone())),
            Function::Round => {
                let digits = match args.get(1) {
                    Some(d) => d.to_plain("round")?,
                    None => 0.0,
                };
                Ok(Quantity::new(round_half_even(first.value, digits), first.unit.clone()))
            }
            Function::Min | Function::Max => {
                let mut best = first.value;
                for arg in &args[1..] {
                    let v = arg.value_in(&first.unit, "compare")?;
                    let better = if self == Function::Min { v < best } else { v > best };
                    if better || v.is_nan() {
                        best = v;
                    }
                }
                Ok(Quantity::new(best, first.unit.clone()))
            }
            Function::Sqrt => {
                if first.value < 0.0 {
                    return Err(FormulaError::Domain("sqrt of a negative number".into()));
                }
                Ok(Quantity::new(
                    first.value.sqrt(),
                    first.unit.pow(Exponent::new(1, 2))?,
                ))
            }
            Function::Sin => plain(first.to_plain("sin")?.sin()),
            Function::Cos => plain(first.to_plain("cos")?.cos()),
            Function::Tan => plain(first.to_plain("tan")?.tan()),
            Function::Asin => {
                let x = first.to_plain("asin")?;
                if !(-1.0..=1.0).contains(&x) {
                    return Err(FormulaError::Domain("asin argument outside [-1, 1]".into()));
                }
                plain(x.asin())
            }
            Function::Acos => {
                let x = first.to_plain("acos")?;
                if !(-1.0..=1.0).contains(&x) {
                    return Err(FormulaError::Domain("acos argument outside [-1, 1]".into()));
                }
                plain(x.acos())
            }
            Function::Atan => plain(first.to_plain("atan")?.atan()),
            Function::Log => {
                let x = positive(first.to_plain("log")?, "log")?;
                match args.get(1) {
                    None => plain(x.ln()),
                    Some(base) => {
                        let b = positive(base.to_plain("log")?, "log")?;
                        if b == 1.0 {
                            return Err(FormulaError::DivisionByZero);
                        }
                        plain(x.ln() / b.ln())
                    }
                }
            }
            Function::Log10 => plain(positive(first.to_plain("log10")?, "log10")?.log10()),
            Function::Exp => plain(first.to_plain("exp")?.exp()),
        }
    }
}

fn plain(value: f64) -> Result<Quantity, FormulaError> {
    Ok(Quantity::new(value, Unit::dimensionless()))
}

fn positive(x: f64, function: &str) -> Result<f64, FormulaError> {
    if x > 0.0 {
        Ok(x)
    } else {
        Err(FormulaError::Domain(format!("{} of a non-positive number", function)))
    }
}

/// Round half to even, optionally at a number of decimal digits.
pub(crate) fn round_half_even(value: f64, digits: f64) -> f64 {
    let digits = digits.trunc().clamp(-308.0, 308.0) as i32;
    if digits == 0 {
        return value.round_ties_even();
    }
    let factor = 10f64.powi(digits);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round_ties_even() / factor
}
