//! Error taxonomy for the criteria combiner
//!
//! Every variant is fatal and detected before any numeric work starts, so a
//! failed `combine` never yields a partial composite. Degenerate (constant)
//! criteria are not errors; they are handled by the normalization guard.

use thiserror::Error;

/// Validation failures raised by `combine`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmcaError {
    /// No criterion grids were supplied, so there is no output shape
    #[error("no criteria supplied: at least one criterion grid is required")]
    NoCriteria,

    /// A criterion grid is not aligned with the first grid
    #[error(
        "shape mismatch: criterion {index} has shape {}x{} but criterion 0 has shape {}x{}",
        found.0, found.1, expected.0, expected.1
    )]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Weight or type vector does not have one entry per criterion
    #[error("length mismatch: {what} has {found} entries but there are {expected} criteria")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A type flag is neither benefit (1) nor cost (0)
    #[error("invalid criterion type at index {index}: '{value}' (expected benefit/1 or cost/0)")]
    InvalidType { index: usize, value: String },
}
