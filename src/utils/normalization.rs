//! Normalization Utilities
//!
//! Decides, once per criterion grid, how raw cell values are transformed
//! before weighting. The decision depends on the normalization policy and the
//! criterion type; for min-max rescaling it also needs the grid's range.
//!
//! | Policy            | Benefit              | Cost       |
//! |-------------------|----------------------|------------|
//! | `InvertCost`      | identity             | `1 - v`    |
//! | `MinMaxTypeMask`  | `(v - min) / range`  | zero       |
//! | `RawTypeMask`     | identity             | zero       |
//!
//! A constant grid (range 0) or a grid with no finite cell cannot be
//! rescaled; under `MinMaxTypeMask` it normalizes to a uniform 0.

use crate::criteria::{CriterionType, NormalizationPolicy};
use crate::utils::grid_stats::GridStats;
use ndarray::{ArrayBase, Data, Ix2};
use serde::Serialize;

/// Transform applied to every cell of one criterion grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriterionTransform {
    /// `v`
    Identity,
    /// `1 - v`
    Invert,
    /// `(v * scale - min) / range`
    ///
    /// `scale` is 1 unless `max - min` overflows, in which case every term
    /// is pre-scaled by 0.5 (`min` and `range` are stored already scaled).
    Rescale { scale: f64, min: f64, range: f64 },
    /// `0` for every cell
    Zero,
}

impl CriterionTransform {
    /// Apply the transform to one raw cell value
    #[inline]
    pub fn apply(self, v: f64) -> f64 {
        match self {
            CriterionTransform::Identity => v,
            CriterionTransform::Invert => 1.0 - v,
            CriterionTransform::Rescale { scale, min, range } => (v * scale - min) / range,
            CriterionTransform::Zero => 0.0,
        }
    }
}

/// Plan the transform for one criterion
///
/// Scans the grid only when min-max rescaling is required.
pub fn plan_transform<S>(
    index: usize,
    grid: &ArrayBase<S, Ix2>,
    policy: NormalizationPolicy,
    criterion_type: CriterionType,
) -> CriterionTransform
where
    S: Data<Elem = f64>,
{
    match (policy, criterion_type) {
        (NormalizationPolicy::InvertCost, CriterionType::Benefit) => CriterionTransform::Identity,
        (NormalizationPolicy::InvertCost, CriterionType::Cost) => CriterionTransform::Invert,
        (NormalizationPolicy::RawTypeMask, CriterionType::Benefit) => CriterionTransform::Identity,
        (NormalizationPolicy::RawTypeMask, CriterionType::Cost) => CriterionTransform::Zero,
        // Type flag 0 masks the normalized value entirely
        (NormalizationPolicy::MinMaxTypeMask, CriterionType::Cost) => CriterionTransform::Zero,
        (NormalizationPolicy::MinMaxTypeMask, CriterionType::Benefit) => {
            min_max_transform(index, &GridStats::of(grid))
        }
    }
}

/// Min-max rescale with the degenerate-grid guard
fn min_max_transform(index: usize, stats: &GridStats) -> CriterionTransform {
    let (Some(min), Some(max)) = (stats.min, stats.max) else {
        tracing::warn!(
            "Criterion {} has no finite cells; normalizing to 0",
            index
        );
        return CriterionTransform::Zero;
    };

    let range = max - min;
    if range.is_finite() && range > 0.0 {
        return CriterionTransform::Rescale { scale: 1.0, min, range };
    }

    // Span wider than f64::MAX: halving is exact and keeps the ratio
    let half_range = max * 0.5 - min * 0.5;
    if range.is_infinite() && half_range.is_finite() && half_range > 0.0 {
        return CriterionTransform::Rescale {
            scale: 0.5,
            min: min * 0.5,
            range: half_range,
        };
    }

    tracing::warn!(
        "Criterion {} is constant ({}); normalizing to 0",
        index, min
    );
    CriterionTransform::Zero
}
