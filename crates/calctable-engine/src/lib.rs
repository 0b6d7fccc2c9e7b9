//! calctable_engine - Units, safe formulas, dependency ordering and uncertainty
//! propagation for calculated tables.

pub mod engine;
pub mod formula;
pub mod generators;
pub mod uncertainty;
pub mod units;

pub use formula::{Bindings, ConstantLookup, Formula, FormulaError, validate_formula};
pub use units::{Quantity, Unit, UnitError};
