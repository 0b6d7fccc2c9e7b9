//! calctable_core - UI-agnostic calculated tables.
//!
//! A [`DataTable`] holds typed columns (data, formulas, derivatives,
//! generated ranges, interpolations and uncertainties) that recalculate in
//! dependency order when their inputs change.

pub mod column;
pub mod config;
pub mod error;
pub mod registry;
pub mod table;

pub use column::{Column, ColumnKind, ColumnType, RemovalPolicy, UncertaintyMode};
pub use config::EngineConfig;
pub use error::{Result, TableError};
pub use table::{DataTable, SubscriptionId};
