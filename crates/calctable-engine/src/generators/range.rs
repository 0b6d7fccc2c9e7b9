use serde::{Deserialize, Serialize};

use super::GeneratorError;

/// Evenly spaced sequence parameters for a RANGE column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RangeSpec {
    /// `count` points from `start` to `stop`, both inclusive.
    Linspace { start: f64, stop: f64, count: usize },
    /// `start, start + step, ...` stopping before `stop`.
    Arange { start: f64, stop: f64, step: f64 },
    /// `10^v` for `count` values `v` evenly spaced between the exponents.
    Logspace {
        start_exp: f64,
        stop_exp: f64,
        count: usize,
    },
}

impl RangeSpec {
    /// Number of points generated.
    pub fn count(&self) -> usize {
        match self {
            RangeSpec::Linspace { count, .. } | RangeSpec::Logspace { count, .. } => *count,
            RangeSpec::Arange { start, stop, step } => {
                let n = ((stop - start) / step).ceil();
                if n.is_finite() && n > 0.0 {
                    n as usize
                } else {
                    0
                }
            }
        }
    }

    pub fn validate(&self, max_points: usize) -> Result<(), GeneratorError> {
        match self {
            RangeSpec::Linspace { start, stop, .. } => finite(&[*start, *stop])?,
            RangeSpec::Logspace {
                start_exp,
                stop_exp,
                ..
            } => {
                finite(&[*start_exp, *stop_exp])?;
                if 10f64.powf(start_exp.max(*stop_exp)).is_infinite() {
                    return Err(GeneratorError::InvalidRange(
                        "logspace exponent too large".into(),
                    ));
                }
            }
            RangeSpec::Arange { start, stop, step } => {
                finite(&[*start, *stop, *step])?;
                if *step == 0.0 {
                    return Err(GeneratorError::InvalidRange("step must not be zero".into()));
                }
                if (stop - start).signum() != step.signum() {
                    return Err(GeneratorError::InvalidRange(
                        "step points away from stop".into(),
                    ));
                }
            }
        }

        let count = self.count();
        if !(2..=max_points).contains(&count) {
            return Err(GeneratorError::PointCount {
                count,
                max: max_points,
            });
        }
        Ok(())
    }

    pub fn generate(&self) -> Vec<f64> {
        match self {
            RangeSpec::Linspace { start, stop, count } => linspace(*start, *stop, *count),
            RangeSpec::Logspace {
                start_exp,
                stop_exp,
                count,
            } => linspace(*start_exp, *stop_exp, *count)
                .into_iter()
                .map(|v| 10f64.powf(v))
                .collect(),
            RangeSpec::Arange { start, step, .. } => (0..self.count())
                .map(|i| start + i as f64 * step)
                .collect(),
        }
    }
}

fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|i| {
                    if i == count - 1 {
                        stop
                    } else {
                        start + i as f64 * step
                    }
                })
                .collect()
        }
    }
}

fn finite(values: &[f64]) -> Result<(), GeneratorError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(GeneratorError::InvalidRange("bounds must be finite".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_linspace_is_inclusive() {
        let spec = RangeSpec::Linspace {
            start: 0.0,
            stop: 10.0,
            count: 5,
        };
        assert_eq!(spec.generate(), vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    }

    #[test]
    fn test_arange_excludes_stop() {
        let spec = RangeSpec::Arange {
            start: 0.0,
            stop: 1.0,
            step: 0.25,
        };
        assert_eq!(spec.count(), 4);
        assert_eq!(spec.generate(), vec![0.0, 0.25, 0.5, 0.75]);

        let down = RangeSpec::Arange {
            start: 3.0,
            stop: 0.0,
            step: -1.0,
        };
        assert_eq!(down.generate(), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_logspace_powers_of_ten() {
        let spec = RangeSpec::Logspace {
            start_exp: 0.0,
            stop_exp: 2.0,
            count: 3,
        };
        assert_eq!(spec.generate(), vec![1.0, 10.0, 100.0]);
    }

    #[test]
    fn test_validation() {
        let too_few = RangeSpec::Linspace {
            start: 0.0,
            stop: 1.0,
            count: 1,
        };
        assert!(matches!(too_few.validate(1000), Err(GeneratorError::PointCount { .. })));

        let too_many = RangeSpec::Linspace {
            start: 0.0,
            stop: 1.0,
            count: 1001,
        };
        assert!(too_many.validate(1000).is_err());

        let zero_step = RangeSpec::Arange {
            start: 0.0,
            stop: 1.0,
            step: 0.0,
        };
        assert!(matches!(zero_step.validate(1000), Err(GeneratorError::InvalidRange(_))));

        let wrong_sign = RangeSpec::Arange {
            start: 0.0,
            stop: 1.0,
            step: -0.1,
        };
        assert!(wrong_sign.validate(1000).is_err());

        let infinite = RangeSpec::Linspace {
            start: f64::NAN,
            stop: 1.0,
            count: 3,
        };
        assert!(infinite.validate(1000).is_err());
    }
}
