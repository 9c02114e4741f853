//! Error types for Twiss computations.

use crate::matrix::Plane;
use crate::units::Dimension;
use thiserror::Error;

/// Result type for Twiss operations.
pub type Result<T> = std::result::Result<T, TwissError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TwissError {
    /// A seed field is missing or carries the wrong physical dimension.
    #[error("Seed field {field} must carry dimension [{expected}], found {}", describe_found(.found))]
    InvalidSeedDimension {
        field: String,
        expected: Dimension,
        found: Option<Dimension>,
    },

    /// `(I - M)` has no inverse; the ring has no periodic dispersion.
    #[error("Periodic dispersion system (I - M) is singular (pivot = {pivot:e}).")]
    SingularPeriodicSystem { pivot: f64 },

    /// Strict mode found a beta value that is zero or negative.
    #[error("Computed {plane} beta is not positive at row {row} (beta = {value}).")]
    NonPositiveBeta { plane: Plane, row: usize, value: f64 },

    #[error("Transfer table is empty.")]
    EmptyTable,

    #[error("Row index {index} is out of range for a table with {rows} rows.")]
    RowOutOfRange { index: i64, rows: usize },

    #[error("No row labelled '{0}'.")]
    LabelNotFound(String),

    #[error("Invalid transfer matrix element: {0}")]
    InvalidMatrixElement(String),

    #[error("Courant-Snyder invariant violated in the {plane} plane (beta*gamma - alpha^2 - 1 = {residual:e}).")]
    CourantSnyderViolation { plane: Plane, residual: f64 },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

fn describe_found(found: &Option<Dimension>) -> String {
    match found {
        Some(dimension) => format!("[{dimension}]"),
        None => "nothing (field missing)".to_string(),
    }
}
