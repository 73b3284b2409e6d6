//! Grid statistics
//!
//! One-pass summary of a 2-D grid. Non-finite cells (NaN nodata, +/-inf) are
//! counted but excluded from min/max/mean.

use ndarray::{ArrayBase, Data, Ix2};
use serde::Serialize;

/// Summary statistics for one grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    /// Number of finite cells
    pub valid_cells: usize,
    /// Number of NaN or infinite cells
    pub invalid_cells: usize,
}

impl GridStats {
    /// Scan a grid once and collect its statistics
    pub fn of<S>(grid: &ArrayBase<S, Ix2>) -> Self
    where
        S: Data<Elem = f64>,
    {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0_f64;
        let mut valid_cells = 0usize;
        let mut invalid_cells = 0usize;

        for &v in grid.iter() {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
                sum += v;
                valid_cells += 1;
            } else {
                invalid_cells += 1;
            }
        }

        if valid_cells == 0 {
            return GridStats {
                min: None,
                max: None,
                mean: None,
                valid_cells,
                invalid_cells,
            };
        }

        GridStats {
            min: Some(min),
            max: Some(max),
            mean: Some(sum / valid_cells as f64),
            valid_cells,
            invalid_cells,
        }
    }

    /// Dynamic range (max - min), `None` if the grid has no finite cell
    pub fn range(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
