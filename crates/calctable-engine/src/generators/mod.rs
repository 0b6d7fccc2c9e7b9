//! Column generators: values computed from parameters or other columns
//! rather than typed in or evaluated from a formula.
//!
//! - [`RangeSpec`] - linspace / arange / logspace sequences
//! - [`derivative`] - discrete derivatives of one column against another
//! - [`Interpolator`] - linear, nearest, quadratic and natural cubic curves

mod derivative;
mod interpolate;
mod range;

use thiserror::Error;

pub use derivative::{DifferenceMethod, derivative};
pub use interpolate::{InterpolationMethod, Interpolator, interpolate};
pub use range::RangeSpec;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Range produces {count} points; allowed between 2 and {max}")]
    PointCount { count: usize, max: usize },

    #[error("Interpolation needs at least 2 numeric points, found {0}")]
    TooFewPoints(usize),

    #[error("Interpolation x values must be unique; {0} appears more than once")]
    DuplicateX(f64),
}
