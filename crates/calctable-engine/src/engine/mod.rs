//! Table engine building blocks.
//!
//! - [`Value`], [`CellError`], [`ElementType`] - cell storage
//! - [`DependencyGraph`] - column dependencies and recalculation order
//! - [`rename_reference`] - rewrite `{old}` references in formula text
//! - [`format_value`] - display formatting

mod cycle;
mod format;
mod graph;
mod rewrite;
mod value;

pub use format::{format_number, format_value};
pub use graph::{CycleError, DependencyGraph};
pub use rewrite::rename_reference;
pub use value::{CellError, CellErrorKind, ElementType, Value};
