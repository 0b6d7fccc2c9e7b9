use serde::{Deserialize, Serialize};

use crate::engine::{CellError, CellErrorKind, Value};

/// Which neighbours a finite difference uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifferenceMethod {
    /// `(y[i+1] - y[i]) / (x[i+1] - x[i])`, backward on the last row.
    #[default]
    Forward,
    /// `(y[i] - y[i-1]) / (x[i] - x[i-1])`, forward on the first row.
    Backward,
    /// `(y[i+1] - y[i-1]) / (x[i+1] - x[i-1])`, one-sided at both ends.
    Central,
}

impl DifferenceMethod {
    /// Rows `(j, k)` whose difference gives the derivative at row `i`.
    fn neighbours(self, i: usize, n: usize) -> (usize, usize) {
        let last = n - 1;
        match self {
            DifferenceMethod::Forward if i < last => (i, i + 1),
            DifferenceMethod::Forward => (last - 1, last),
            DifferenceMethod::Backward if i > 0 => (i - 1, i),
            DifferenceMethod::Backward => (0, 1),
            DifferenceMethod::Central if i == 0 => (0, 1),
            DifferenceMethod::Central if i == last => (last - 1, last),
            DifferenceMethod::Central => (i - 1, i + 1),
        }
    }
}

/// `order`-th discrete derivative of `y` with respect to `x`.
///
/// Higher orders repeat the differencing against the same `x`. With fewer
/// than two rows every cell is empty. A step `|dx| < epsilon` marks the cell
/// with a division-near-zero error.
pub fn derivative(
    y: &[Value],
    x: &[Value],
    order: u8,
    method: DifferenceMethod,
    epsilon: f64,
) -> Vec<Value> {
    let n = y.len().min(x.len());
    if n < 2 {
        return vec![Value::Empty; y.len()];
    }

    let mut current: Vec<Value> = y[..n].to_vec();
    for _ in 0..order.max(1) {
        current = (0..n)
            .map(|i| {
                let (j, k) = method.neighbours(i, n);
                difference(&current[j], &current[k], &x[j], &x[k], epsilon)
            })
            .collect();
    }
    current.resize(y.len(), Value::Empty);
    current
}

fn difference(y0: &Value, y1: &Value, x0: &Value, x1: &Value, epsilon: f64) -> Value {
    for v in [y0, y1, x0, x1] {
        match v {
            Value::Number(_) => {}
            Value::Empty => return Value::Empty,
            Value::Error(e) if e.kind == CellErrorKind::DivisionNearZero => {
                return Value::Error(e.clone());
            }
            Value::Error(e) => {
                return CellError::resolution(format!("input {}", e.kind.marker())).into();
            }
            Value::Text(_) | Value::Bool(_) => {
                return CellError::new(CellErrorKind::Evaluation, "non-numeric input").into();
            }
        }
    }
    let (Some(y0), Some(y1), Some(x0), Some(x1)) =
        (y0.as_number(), y1.as_number(), x0.as_number(), x1.as_number())
    else {
        return Value::Empty;
    };

    let dx = x1 - x0;
    if dx.abs() < epsilon {
        return CellError::division_near_zero(format!("|dx| = {} below {}", dx.abs(), epsilon))
            .into();
    }
    Value::Number((y1 - y0) / dx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|v| Value::Number(*v)).collect()
    }

    #[test]
    fn test_forward_difference_with_backward_tail() {
        let t = nums(&[0.0, 1.0, 2.0, 3.0]);
        let x = nums(&[0.0, 1.0, 4.0, 9.0]);
        let d = derivative(&x, &t, 1, DifferenceMethod::Forward, 1e-10);
        assert_eq!(d, nums(&[1.0, 3.0, 5.0, 5.0]));
    }

    #[test]
    fn test_backward_and_central() {
        let t = nums(&[0.0, 1.0, 2.0, 3.0]);
        let x = nums(&[0.0, 1.0, 4.0, 9.0]);
        assert_eq!(
            derivative(&x, &t, 1, DifferenceMethod::Backward, 1e-10),
            nums(&[1.0, 1.0, 3.0, 5.0])
        );
        assert_eq!(
            derivative(&x, &t, 1, DifferenceMethod::Central, 1e-10),
            nums(&[1.0, 2.0, 4.0, 5.0])
        );
    }

    #[test]
    fn test_second_order_repeats_differencing() {
        let t = nums(&[0.0, 1.0, 2.0, 3.0]);
        let x = nums(&[0.0, 1.0, 4.0, 9.0]);
        // first order [1, 3, 5, 5]
        assert_eq!(
            derivative(&x, &t, 2, DifferenceMethod::Forward, 1e-10),
            nums(&[2.0, 2.0, 0.0, 0.0])
        );
    }

    #[test]
    fn test_zero_step_marks_cells() {
        let t = nums(&[0.0, 0.0, 1.0]);
        let x = nums(&[1.0, 2.0, 3.0]);
        let d = derivative(&x, &t, 1, DifferenceMethod::Forward, 1e-10);
        assert_eq!(d[0].error().map(|e| e.kind), Some(CellErrorKind::DivisionNearZero));
        assert_eq!(d[1], Value::Number(1.0));
    }

    #[test]
    fn test_short_and_sparse_inputs() {
        assert_eq!(
            derivative(&nums(&[1.0]), &nums(&[1.0]), 1, DifferenceMethod::Forward, 1e-10),
            vec![Value::Empty]
        );
        let y = vec![Value::Number(1.0), Value::Empty, Value::Number(3.0)];
        let d = derivative(&y, &nums(&[0.0, 1.0, 2.0]), 1, DifferenceMethod::Forward, 1e-10);
        assert_eq!(d, vec![Value::Empty, Value::Empty, Value::Empty]);
    }
}
