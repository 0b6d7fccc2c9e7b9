use serde::{Deserialize, Serialize};

use super::GeneratorError;
use crate::engine::{CellError, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMethod {
    #[default]
    Linear,
    Nearest,
    /// Quadratic through the three knots nearest the evaluation point.
    Quadratic,
    /// Natural cubic spline.
    Cubic,
}

/// Sorted knots plus whatever the method precomputes.
#[derive(Clone, Debug)]
pub struct Interpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
    method: InterpolationMethod,
    /// Spline second derivatives, cubic only.
    curvature: Vec<f64>,
}

impl Interpolator {
    /// Collect numeric `(x, y)` pairs, skipping rows where either is missing.
    pub fn new(
        x: &[Value],
        y: &[Value],
        method: InterpolationMethod,
    ) -> Result<Interpolator, GeneratorError> {
        let mut points: Vec<(f64, f64)> = x
            .iter()
            .zip(y)
            .filter_map(|(x, y)| Some((x.as_number()?, y.as_number()?)))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        if points.len() < 2 {
            return Err(GeneratorError::TooFewPoints(points.len()));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(w) = points.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(GeneratorError::DuplicateX(w[0].0));
        }

        let (xs, ys): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        let method = match method {
            InterpolationMethod::Quadratic if xs.len() < 3 => InterpolationMethod::Linear,
            InterpolationMethod::Cubic if xs.len() < 4 => InterpolationMethod::Linear,
            m => m,
        };
        let curvature = if method == InterpolationMethod::Cubic {
            natural_spline(&xs, &ys)
        } else {
            Vec::new()
        };
        Ok(Interpolator {
            xs,
            ys,
            method,
            curvature,
        })
    }

    /// Method actually used after fallbacks for small inputs.
    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Value at `at`; outside the knots the end pieces are extended.
    pub fn eval(&self, at: f64) -> f64 {
        match self.method {
            InterpolationMethod::Linear => self.linear(at),
            InterpolationMethod::Nearest => self.nearest(at),
            InterpolationMethod::Quadratic => self.quadratic(at),
            InterpolationMethod::Cubic => self.cubic(at),
        }
    }

    /// Index `k` of the segment `[xs[k], xs[k+1]]` used for `at`.
    fn segment(&self, at: f64) -> usize {
        let p = self.xs.partition_point(|x| *x <= at);
        p.clamp(1, self.xs.len() - 1) - 1
    }

    fn linear(&self, at: f64) -> f64 {
        let k = self.segment(at);
        let (x0, x1) = (self.xs[k], self.xs[k + 1]);
        let (y0, y1) = (self.ys[k], self.ys[k + 1]);
        y0 + (y1 - y0) * (at - x0) / (x1 - x0)
    }

    fn nearest(&self, at: f64) -> f64 {
        let k = self.segment(at);
        if (at - self.xs[k]).abs() <= (self.xs[k + 1] - at).abs() {
            self.ys[k]
        } else {
            self.ys[k + 1]
        }
    }

    fn quadratic(&self, at: f64) -> f64 {
        let n = self.xs.len();
        let p = self.xs.partition_point(|x| *x < at);
        let (mut lo, mut hi) = (p, p);
        while hi - lo < 3 {
            let take_left = lo > 0 && (hi == n || at - self.xs[lo - 1] <= self.xs[hi] - at);
            if take_left {
                lo -= 1;
            } else {
                hi += 1;
            }
        }

        // Lagrange form over xs[lo..hi]
        (lo..hi)
            .map(|i| {
                let weight: f64 = (lo..hi)
                    .filter(|&j| j != i)
                    .map(|j| (at - self.xs[j]) / (self.xs[i] - self.xs[j]))
                    .product();
                self.ys[i] * weight
            })
            .sum()
    }

    fn cubic(&self, at: f64) -> f64 {
        let k = self.segment(at);
        let h = self.xs[k + 1] - self.xs[k];
        let a = (self.xs[k + 1] - at) / h;
        let b = (at - self.xs[k]) / h;
        a * self.ys[k]
            + b * self.ys[k + 1]
            + ((a * a * a - a) * self.curvature[k] + (b * b * b - b) * self.curvature[k + 1]) * h
                * h
                / 6.0
    }
}

/// Second derivatives of the natural cubic spline (zero at both ends),
/// solved with the tridiagonal algorithm.
fn natural_spline(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut m = vec![0.0; n];
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    for i in 1..n - 1 {
        let h0 = xs[i] - xs[i - 1];
        let h1 = xs[i + 1] - xs[i];
        let a = h0;
        let b = 2.0 * (h0 + h1);
        let c = h1;
        let d = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);

        let denom = b - a * c_prime[i - 1];
        c_prime[i] = c / denom;
        d_prime[i] = (d - a * d_prime[i - 1]) / denom;
    }

    for i in (1..n - 1).rev() {
        m[i] = d_prime[i] - c_prime[i] * m[i + 1];
    }
    m
}

/// Interpolate `y(x)` at every row of `at`.
///
/// When the knots are unusable every row carries the same interpolation
/// error. Empty evaluation cells stay empty.
pub fn interpolate(
    x: &[Value],
    y: &[Value],
    at: &[Value],
    method: InterpolationMethod,
) -> Vec<Value> {
    let interpolator = match Interpolator::new(x, y, method) {
        Ok(i) => i,
        Err(e) => {
            let err = CellError::interpolation(e.to_string());
            return vec![Value::Error(err); at.len()];
        }
    };

    at.iter()
        .map(|cell| match cell {
            Value::Number(v) => Value::Number(interpolator.eval(*v)),
            Value::Empty => Value::Empty,
            Value::Error(e) => CellError::resolution(format!("input {}", e.kind.marker())).into(),
            Value::Text(_) | Value::Bool(_) => {
                CellError::interpolation("non-numeric evaluation point").into()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CellErrorKind;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|v| Value::Number(*v)).collect()
    }

    fn interp(xs: &[f64], ys: &[f64], method: InterpolationMethod) -> Interpolator {
        Interpolator::new(&nums(xs), &nums(ys), method).unwrap()
    }

    #[test]
    fn test_linear_midpoint_and_extrapolation() {
        let i = interp(&[0.0, 1.0, 2.0], &[0.0, 1.0, 4.0], InterpolationMethod::Linear);
        assert_eq!(i.eval(0.5), 0.5);
        assert_eq!(i.eval(1.5), 2.5);
        assert_eq!(i.eval(3.0), 7.0);
        assert_eq!(i.eval(-1.0), -1.0);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let i = interp(&[2.0, 0.0, 1.0], &[4.0, 0.0, 1.0], InterpolationMethod::Linear);
        assert_eq!(i.eval(0.5), 0.5);
    }

    #[test]
    fn test_nearest() {
        let i = interp(&[0.0, 1.0, 2.0], &[10.0, 20.0, 30.0], InterpolationMethod::Nearest);
        assert_eq!(i.eval(0.4), 10.0);
        assert_eq!(i.eval(0.6), 20.0);
        assert_eq!(i.eval(5.0), 30.0);
    }

    #[test]
    fn test_quadratic_reproduces_parabola() {
        let i = interp(
            &[0.0, 1.0, 2.0, 3.0],
            &[0.0, 1.0, 4.0, 9.0],
            InterpolationMethod::Quadratic,
        );
        assert!((i.eval(1.5) - 2.25).abs() < 1e-12);
        assert!((i.eval(2.5) - 6.25).abs() < 1e-12);
    }

    #[test]
    fn test_cubic_spline_passes_through_knots() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [0.0, 1.0, 0.0, 1.0, 0.0];
        let i = interp(&xs, &ys, InterpolationMethod::Cubic);
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((i.eval(*x) - y).abs() < 1e-12);
        }
        // a straight line stays straight
        let line = interp(&xs, &[0.0, 2.0, 4.0, 6.0, 8.0], InterpolationMethod::Cubic);
        assert!((line.eval(2.5) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_small_inputs_fall_back_to_linear() {
        let i = interp(&[0.0, 1.0, 2.0], &[0.0, 1.0, 4.0], InterpolationMethod::Cubic);
        assert_eq!(i.method(), InterpolationMethod::Linear);
        let i = interp(&[0.0, 1.0], &[0.0, 1.0], InterpolationMethod::Quadratic);
        assert_eq!(i.method(), InterpolationMethod::Linear);
    }

    #[test]
    fn test_bad_knots_mark_every_row() {
        let out = interpolate(
            &nums(&[1.0, 1.0]),
            &nums(&[2.0, 3.0]),
            &nums(&[0.0, 1.0, 2.0]),
            InterpolationMethod::Linear,
        );
        assert_eq!(out.len(), 3);
        assert!(out
            .iter()
            .all(|v| v.error().map(|e| e.kind) == Some(CellErrorKind::Interpolation)));

        let out = interpolate(
            &[Value::Number(1.0), Value::Empty],
            &nums(&[2.0, 3.0]),
            &nums(&[0.0]),
            InterpolationMethod::Linear,
        );
        assert!(out[0].error().is_some());
    }
}
