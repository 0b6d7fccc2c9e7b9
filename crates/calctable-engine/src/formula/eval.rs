use super::ast::{BinaryOp, Expr, UnaryOp};
use super::{Bindings, FormulaError};
use crate::units::{Exponent, Quantity, UnitError, rational_approximation};

/// Largest denominator accepted when a unit is raised to a fractional power.
const MAX_EXPONENT_DENOMINATOR: i32 = 1000;

pub(crate) fn eval(expr: &Expr, bindings: &dyn Bindings) -> Result<Quantity, FormulaError> {
    let result = match expr {
        Expr::Number(n) => Quantity::dimensionless(*n),
        Expr::Reference(name) => bindings
            .resolve(name)
            .ok_or_else(|| FormulaError::UnknownReference(name.clone()))?,
        Expr::Identifier(name) => resolve_identifier(name, bindings)?,
        Expr::Unary { op, operand } => {
            let value = eval(operand, bindings)?;
            match op {
                UnaryOp::Plus => value,
                UnaryOp::Neg => Quantity::new(-value.value, value.unit),
            }
        }
        Expr::Binary { op, left, right } => {
            let lhs = eval(left, bindings)?;
            let rhs = eval(right, bindings)?;
            binary(*op, lhs, rhs, right)?
        }
        Expr::Call { function, args } => {
            let values = args
                .iter()
                .map(|arg| eval(arg, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            function.apply(&values)?
        }
    };

    if result.value.is_finite() {
        Ok(result)
    } else {
        Err(FormulaError::NotFinite)
    }
}

fn resolve_identifier(name: &str, bindings: &dyn Bindings) -> Result<Quantity, FormulaError> {
    if let Some(value) = bindings.constant(name) {
        return Ok(value);
    }
    match name {
        "pi" => Ok(Quantity::dimensionless(std::f64::consts::PI)),
        "e" => Ok(Quantity::dimensionless(std::f64::consts::E)),
        _ => Err(FormulaError::UnknownReference(name.to_string())),
    }
}

fn binary(
    op: BinaryOp,
    lhs: Quantity,
    rhs: Quantity,
    rhs_expr: &Expr,
) -> Result<Quantity, FormulaError> {
    match op {
        BinaryOp::Add => Ok(lhs.add(&rhs)?),
        BinaryOp::Sub => Ok(lhs.sub(&rhs)?),
        BinaryOp::Mul => Ok(lhs.mul(&rhs)?),
        BinaryOp::Div => {
            if rhs.value == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Ok(lhs.div(&rhs)?)
        }
        BinaryOp::FloorDiv => {
            let b = rhs.value_in(&lhs.unit, "floor-divide")?;
            if b == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Ok(Quantity::dimensionless(floor_div(lhs.value, b)))
        }
        BinaryOp::Mod => {
            let b = rhs.value_in(&lhs.unit, "take the modulo of")?;
            if b == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Ok(Quantity::new(floor_mod(lhs.value, b), lhs.unit))
        }
        BinaryOp::Pow => power(lhs, rhs, rhs_expr),
    }
}

fn power(base: Quantity, exponent: Quantity, exponent_expr: &Expr) -> Result<Quantity, FormulaError> {
    let p = exponent.to_plain("use as an exponent")?;

    if base.value == 0.0 && p < 0.0 {
        return Err(FormulaError::DivisionByZero);
    }
    if base.value < 0.0 && p.fract() != 0.0 {
        return Err(FormulaError::Domain(
            "fractional power of a negative number".into(),
        ));
    }
    let value = base.value.powf(p);

    if base.unit.is_plain() {
        return Ok(Quantity::dimensionless(value));
    }

    let rational = if exponent_expr.is_constant() {
        rational_exponent(p)
    } else {
        None
    };
    match rational {
        Some(r) => Ok(Quantity::new(value, base.unit.pow(r)?)),
        None => Err(UnitError::UnitMismatch {
            op: "raise",
            left: base.unit.format(),
            right: format!("a non-constant or irrational power ({})", p),
        }
        .into()),
    }
}

fn rational_exponent(p: f64) -> Option<Exponent> {
    rational_approximation(p, MAX_EXPONENT_DENOMINATOR)
}

pub(crate) fn floor_div(a: f64, b: f64) -> f64 {
    (a / b).floor()
}

/// Modulo with the sign of the divisor.
pub(crate) fn floor_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}
