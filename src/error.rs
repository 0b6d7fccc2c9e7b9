//! Error types for the calctable command line

use thiserror::Error;

/// Problems with the command line itself
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("Invalid {flag} argument '{arg}': expected {expected}")]
    BadArgument {
        flag: &'static str,
        arg: String,
        expected: &'static str,
    },

    #[error("No formula given (use -c FORMULA)")]
    NoFormula,
}
