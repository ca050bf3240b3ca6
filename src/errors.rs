//! Errors
//!
//! Custom error types used throughout the `dagfit` crate.
use thiserror::Error;

/// Malformed or degenerate input data. Never retried internally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    /// Structure learning needs at least two variables.
    #[error("At least 2 variables are required, but {0} provided.")]
    TooFewVariables(usize),
    /// The acyclicity measure is only tractable up to a few hundred variables.
    #[error("At most {1} variables are supported, but {0} provided.")]
    TooManyVariables(usize, usize),
    /// No variance in a column.
    #[error("Column {0} has no variance.")]
    ConstantColumn(String),
    /// NaN or infinite value found in a column.
    #[error("Column {0} contains a non-finite value at row {1}.")]
    NonFinite(String, usize),
    /// First value is the column name, second is expected length, third is what was passed.
    #[error("Column {0} has length {2}, expected {1}.")]
    LengthMismatch(String, usize, usize),
    /// Column names must be unique.
    #[error("Column {0} appears more than once.")]
    DuplicateColumn(String),
    /// A name was referenced that is not a column of the dataset.
    #[error("Column {0} is not present in the dataset.")]
    UnknownColumn(String),
    /// The dataset has no rows.
    #[error("The dataset has no observations.")]
    Empty,
    /// The regression design matrix could not be factorised.
    #[error("The design matrix is singular, the covariates {0} are collinear.")]
    SingularDesign(String),
}

/// Errors that can occur while learning or using a structure model.
#[derive(Debug, Error)]
pub enum StructureError {
    /// Malformed or degenerate input.
    #[error(transparent)]
    Data(#[from] DataError),
    /// The augmented Lagrangian ran out of budget before the graph became acyclic.
    #[error("Failed to reach the acyclicity tolerance after {iterations} iterations, final h(W) = {h:e}.")]
    Convergence { h: f64, iterations: usize },
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Unable to write model or config to file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read model or config from file.
    #[error("Unable to read from file {0}")]
    UnableToRead(String),
}
