//! Symbolic differentiation of formula expressions.
//!
//! Results are built through small constructors that fold constants and drop
//! `0 +`, `1 *` and friends as they go, so `d/dx ({x} * 3)` comes out as `3`
//! rather than `1 * 3 + {x} * 0`.

use super::PropagationError;
use crate::formula::{BinaryOp, Expr, Function, UnaryOp};

/// `d expr / d {variable}`.
pub(crate) fn differentiate(expr: &Expr, variable: &str) -> Result<Expr, PropagationError> {
    if !depends_on(expr, variable) {
        return Ok(num(0.0));
    }

    match expr {
        Expr::Number(_) | Expr::Identifier(_) => Ok(num(0.0)),
        Expr::Reference(name) => Ok(num(if name == variable { 1.0 } else { 0.0 })),
        Expr::Unary { op, operand } => {
            let d = differentiate(operand, variable)?;
            Ok(match op {
                UnaryOp::Plus => d,
                UnaryOp::Neg => neg(d),
            })
        }
        Expr::Binary { op, left, right } => {
            let (u, v) = (left.as_ref(), right.as_ref());
            match op {
                BinaryOp::Add => Ok(add(differentiate(u, variable)?, differentiate(v, variable)?)),
                BinaryOp::Sub => Ok(sub(differentiate(u, variable)?, differentiate(v, variable)?)),
                BinaryOp::Mul => {
                    let du = differentiate(u, variable)?;
                    let dv = differentiate(v, variable)?;
                    Ok(add(mul(du, v.clone()), mul(u.clone(), dv)))
                }
                BinaryOp::Div => {
                    let du = differentiate(u, variable)?;
                    let dv = differentiate(v, variable)?;
                    if is_num(&dv, 0.0) {
                        return Ok(div(du, v.clone()));
                    }
                    Ok(div(
                        sub(mul(du, v.clone()), mul(u.clone(), dv)),
                        pow(v.clone(), num(2.0)),
                    ))
                }
                BinaryOp::Pow => differentiate_power(u, v, variable),
                BinaryOp::FloorDiv | BinaryOp::Mod => Err(PropagationError::NotDifferentiable {
                    operation: op.symbol(),
                    variable: variable.to_string(),
                }),
            }
        }
        Expr::Call { function, args } => differentiate_call(*function, args, variable),
    }
}

fn differentiate_power(base: &Expr, exponent: &Expr, variable: &str) -> Result<Expr, PropagationError> {
    let du = differentiate(base, variable)?;

    // d(u^n) = n * u^(n-1) * du
    if !depends_on(exponent, variable) {
        let lowered = pow(base.clone(), sub(exponent.clone(), num(1.0)));
        return Ok(mul(mul(exponent.clone(), lowered), du));
    }

    let dv = differentiate(exponent, variable)?;
    let whole = pow(base.clone(), exponent.clone());

    // d(a^v) = a^v * ln(a) * dv
    if !depends_on(base, variable) {
        return Ok(mul(mul(whole, call(Function::Log, vec![base.clone()])), dv));
    }

    // d(u^v) = u^v * (dv * ln(u) + v * du / u)
    let inner = add(
        mul(dv, call(Function::Log, vec![base.clone()])),
        div(mul(exponent.clone(), du), base.clone()),
    );
    Ok(mul(whole, inner))
}

fn differentiate_call(
    function: Function,
    args: &[Expr],
    variable: &str,
) -> Result<Expr, PropagationError> {
    let not_differentiable = || PropagationError::NotDifferentiable {
        operation: function.name(),
        variable: variable.to_string(),
    };
    let Some(u) = args.first() else {
        return Ok(num(0.0));
    };

    let result = match function {
        Function::Round | Function::Min | Function::Max => return Err(not_differentiable()),
        Function::Log if args.len() == 2 => {
            let base = &args[1];
            if depends_on(base, variable) {
                // log(u, b) = ln(u) / ln(b)
                let ratio = div(
                    call(Function::Log, vec![u.clone()]),
                    call(Function::Log, vec![base.clone()]),
                );
                return differentiate(&ratio, variable);
            }
            let du = differentiate(u, variable)?;
            div(du, mul(u.clone(), call(Function::Log, vec![base.clone()])))
        }
        _ => {
            let du = differentiate(u, variable)?;
            let outer = match function {
                Function::Abs => div(u.clone(), call(Function::Abs, vec![u.clone()])),
                Function::Sqrt => div(num(0.5), call(Function::Sqrt, vec![u.clone()])),
                Function::Sin => call(Function::Cos, vec![u.clone()]),
                Function::Cos => neg(call(Function::Sin, vec![u.clone()])),
                Function::Tan => div(
                    num(1.0),
                    pow(call(Function::Cos, vec![u.clone()]), num(2.0)),
                ),
                Function::Asin => div(num(1.0), unit_circle(u)),
                Function::Acos => neg(div(num(1.0), unit_circle(u))),
                Function::Atan => div(num(1.0), add(num(1.0), pow(u.clone(), num(2.0)))),
                Function::Log => div(num(1.0), u.clone()),
                Function::Log10 => div(
                    num(1.0),
                    mul(u.clone(), num(std::f64::consts::LN_10)),
                ),
                Function::Exp => call(Function::Exp, vec![u.clone()]),
                Function::Round | Function::Min | Function::Max => {
                    return Err(not_differentiable());
                }
            };
            mul(outer, du)
        }
    };
    Ok(result)
}

/// `sqrt(1 - u^2)`
fn unit_circle(u: &Expr) -> Expr {
    call(
        Function::Sqrt,
        vec![sub(num(1.0), pow(u.clone(), num(2.0)))],
    )
}

pub(crate) fn depends_on(expr: &Expr, variable: &str) -> bool {
    match expr {
        Expr::Number(_) | Expr::Identifier(_) => false,
        Expr::Reference(name) => name == variable,
        Expr::Unary { operand, .. } => depends_on(operand, variable),
        Expr::Binary { left, right, .. } => {
            depends_on(left, variable) || depends_on(right, variable)
        }
        Expr::Call { args, .. } => args.iter().any(|a| depends_on(a, variable)),
    }
}

fn num(value: f64) -> Expr {
    Expr::number(value)
}

fn as_num(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Number(n) => Some(*n),
        _ => None,
    }
}

fn is_num(expr: &Expr, value: f64) -> bool {
    as_num(expr) == Some(value)
}

fn call(function: Function, args: Vec<Expr>) -> Expr {
    Expr::call(function, args)
}

fn neg(a: Expr) -> Expr {
    match a {
        Expr::Number(n) => num(-n),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => *operand,
        other => Expr::unary(UnaryOp::Neg, other),
    }
}

fn add(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (Some(x), Some(y)) => num(x + y),
        (Some(x), _) if x == 0.0 => b,
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::binary(BinaryOp::Add, a, b),
    }
}

fn sub(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (Some(x), Some(y)) => num(x - y),
        (Some(x), _) if x == 0.0 => neg(b),
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::binary(BinaryOp::Sub, a, b),
    }
}

fn mul(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (Some(x), Some(y)) => num(x * y),
        (Some(x), _) | (_, Some(x)) if x == 0.0 => num(0.0),
        (Some(x), _) if x == 1.0 => b,
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::binary(BinaryOp::Mul, a, b),
    }
}

fn div(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (Some(x), Some(y)) if y != 0.0 => num(x / y),
        (Some(x), _) if x == 0.0 => num(0.0),
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::binary(BinaryOp::Div, a, b),
    }
}

fn pow(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (_, Some(y)) if y == 0.0 => num(1.0),
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::binary(BinaryOp::Pow, a, b),
    }
}
