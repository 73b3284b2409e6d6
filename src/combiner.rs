//! Criteria Combiner - weighted linear combination of aligned criterion grids
//!
//! Pipeline for one invocation:
//! 1. Validate (non-empty, identical shapes, one weight and one type per grid)
//! 2. Plan one `CriterionTransform` per criterion (min/max scan if needed)
//! 3. Accumulate `weight * transform(v)` into a freshly allocated composite
//!
//! Validation runs to completion before any numeric work, so a failed call
//! never produces a partial composite. Inputs are borrowed read-only and the
//! composite never aliases them.
//!
//! Includes both sequential and parallel (Rayon) accumulation. Both apply the
//! same per-cell operations in the same criterion order, so their results are
//! bit-identical.

use crate::criteria::{CriterionType, NormalizationPolicy};
use crate::error::SmcaError;
use crate::utils::{plan_transform, CriterionTransform, GridStats};
use ndarray::{Array2, ArrayBase, Data, Ix2, Zip};
use serde::Serialize;

/// Per-criterion contribution details from `combine_with_breakdown`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionSummary {
    /// Position of the criterion in the input order
    pub index: usize,
    pub weight: f64,
    pub transform: CriterionTransform,
    /// Statistics of `weight * transform(v)` over the grid
    pub stats: GridStats,
}

/// Configured combiner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combiner {
    policy: NormalizationPolicy,
    parallel: bool,
}

impl Default for Combiner {
    fn default() -> Self {
        Combiner::new(NormalizationPolicy::default())
    }
}

/// Combine criteria with the default combiner (cost inversion, parallel)
pub fn combine<S>(
    criteria: &[ArrayBase<S, Ix2>],
    weights: &[f64],
    types: &[CriterionType],
) -> Result<Array2<f64>, SmcaError>
where
    S: Data<Elem = f64>,
{
    Combiner::default().combine(criteria, weights, types)
}

impl Combiner {
    /// Parallel combiner using the given policy
    pub fn new(policy: NormalizationPolicy) -> Self {
        Combiner {
            policy,
            parallel: true,
        }
    }

    /// Switch to single-threaded accumulation
    pub fn sequential(self) -> Self {
        self.with_parallel(false)
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn policy(&self) -> NormalizationPolicy {
        self.policy
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Combine N aligned criterion grids into one composite grid
    ///
    /// # Errors
    /// - `NoCriteria` if `criteria` is empty
    /// - `ShapeMismatch` if any grid differs in shape from grid 0
    /// - `LengthMismatch` if `weights` or `types` does not have N entries
    pub fn combine<S>(
        &self,
        criteria: &[ArrayBase<S, Ix2>],
        weights: &[f64],
        types: &[CriterionType],
    ) -> Result<Array2<f64>, SmcaError>
    where
        S: Data<Elem = f64>,
    {
        let (composite, _) = self.combine_planned(criteria, weights, types)?;
        Ok(composite)
    }

    /// Combine using raw numeric type flags (1 = benefit, 0 = cost)
    ///
    /// # Errors
    /// As `combine`, plus `InvalidType` for any flag other than 0 or 1.
    /// The flag vector's length is checked before its values.
    pub fn combine_flags<S>(
        &self,
        criteria: &[ArrayBase<S, Ix2>],
        weights: &[f64],
        flags: &[f64],
    ) -> Result<Array2<f64>, SmcaError>
    where
        S: Data<Elem = f64>,
    {
        if !criteria.is_empty() && flags.len() != criteria.len() {
            return Err(SmcaError::LengthMismatch {
                what: "types",
                expected: criteria.len(),
                found: flags.len(),
            });
        }
        let types = CriterionType::parse_flags(flags)?;
        self.combine(criteria, weights, &types)
    }

    /// Combine and report each criterion's weighted contribution
    pub fn combine_with_breakdown<S>(
        &self,
        criteria: &[ArrayBase<S, Ix2>],
        weights: &[f64],
        types: &[CriterionType],
    ) -> Result<(Array2<f64>, Vec<ContributionSummary>), SmcaError>
    where
        S: Data<Elem = f64>,
    {
        let (composite, transforms) = self.combine_planned(criteria, weights, types)?;

        let summaries = criteria
            .iter()
            .zip(weights)
            .zip(transforms)
            .enumerate()
            .map(|(index, ((grid, &weight), transform))| {
                let contribution = grid.mapv(|v| weight * transform.apply(v));
                ContributionSummary {
                    index,
                    weight,
                    transform,
                    stats: GridStats::of(&contribution),
                }
            })
            .collect();

        Ok((composite, summaries))
    }

    /// Validate, plan once, accumulate; also hands back the plan
    fn combine_planned<S>(
        &self,
        criteria: &[ArrayBase<S, Ix2>],
        weights: &[f64],
        types: &[CriterionType],
    ) -> Result<(Array2<f64>, Vec<CriterionTransform>), SmcaError>
    where
        S: Data<Elem = f64>,
    {
        let shape = validate(criteria, weights, types)?;
        let transforms = self.plan(criteria, types);

        let mut composite = Array2::<f64>::zeros(shape);
        for ((grid, &weight), &transform) in criteria.iter().zip(weights).zip(&transforms) {
            self.accumulate(&mut composite, grid, weight, transform);
        }

        Ok((composite, transforms))
    }

    /// One transform per criterion, computed before any per-cell work
    fn plan<S>(&self, criteria: &[ArrayBase<S, Ix2>], types: &[CriterionType]) -> Vec<CriterionTransform>
    where
        S: Data<Elem = f64>,
    {
        criteria
            .iter()
            .zip(types)
            .enumerate()
            .map(|(index, (grid, &criterion_type))| {
                let transform = plan_transform(index, grid, self.policy, criterion_type);
                tracing::debug!(
                    "Criterion {} ({}): {:?} under {}",
                    index, criterion_type, transform, self.policy
                );
                transform
            })
            .collect()
    }

    /// Add `weight * transform(v)` for every cell of `grid` into `composite`
    fn accumulate<S>(
        &self,
        composite: &mut Array2<f64>,
        grid: &ArrayBase<S, Ix2>,
        weight: f64,
        transform: CriterionTransform,
    ) where
        S: Data<Elem = f64>,
    {
        let zip = Zip::from(composite).and(grid.view());
        if self.parallel {
            zip.par_for_each(|out, &v| *out += weight * transform.apply(v));
        } else {
            zip.for_each(|out, &v| *out += weight * transform.apply(v));
        }
    }
}

/// Check all input invariants, returning the common shape
fn validate<S>(
    criteria: &[ArrayBase<S, Ix2>],
    weights: &[f64],
    types: &[CriterionType],
) -> Result<(usize, usize), SmcaError>
where
    S: Data<Elem = f64>,
{
    let first = criteria.first().ok_or(SmcaError::NoCriteria)?;
    let expected = first.dim();

    for (index, grid) in criteria.iter().enumerate().skip(1) {
        if grid.dim() != expected {
            return Err(SmcaError::ShapeMismatch {
                index,
                expected,
                found: grid.dim(),
            });
        }
    }

    let n = criteria.len();
    if weights.len() != n {
        return Err(SmcaError::LengthMismatch {
            what: "weights",
            expected: n,
            found: weights.len(),
        });
    }
    if types.len() != n {
        return Err(SmcaError::LengthMismatch {
            what: "types",
            expected: n,
            found: types.len(),
        });
    }

    let weight_sum: f64 = weights.iter().sum();
    if (weight_sum - 1.0).abs() > 1e-9 {
        tracing::debug!("Weights sum to {} (not normalized)", weight_sum);
    }

    tracing::debug!(
        "Validated {} criteria of shape {}x{}",
        n, expected.0, expected.1
    );
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    use CriterionType::{Benefit, Cost};

    #[test]
    fn test_end_to_end_example() {
        // 0.5*1 + 0.3*(1-0) + 0.2*0.5 = 0.9
        let a = Array2::from_elem((2, 2), 1.0);
        let b = Array2::from_elem((2, 2), 0.0);
        let c = Array2::from_elem((2, 2), 0.5);

        let out = combine(&[a, b, c], &[0.5, 0.3, 0.2], &[Benefit, Cost, Benefit]).unwrap();

        assert_eq!(out.dim(), (2, 2));
        for &v in out.iter() {
            assert_relative_eq!(v, 0.9, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cost_inversion_contribution() {
        let grid = array![[0.3]];
        let out = combine(&[grid], &[2.0], &[Cost]).unwrap();
        assert_relative_eq!(out[[0, 0]], 1.4, epsilon = 1e-12);
    }

    #[test]
    fn test_benefit_passthrough_is_exact() {
        let grid = array![[0.3, 0.7], [0.11, 123.5]];
        let out = Combiner::default()
            .sequential()
            .combine(&[grid.view()], &[0.37], &[Benefit])
            .unwrap();
        for (o, v) in out.iter().zip(grid.iter()) {
            assert_eq!(*o, 0.37 * v);
        }
    }

    #[test]
    fn test_shape_mismatch_on_last_grid() {
        let a = Array2::<f64>::zeros((2, 2));
        let b = Array2::<f64>::zeros((2, 2));
        let c = Array2::<f64>::zeros((2, 3));

        let err = combine(&[a, b, c], &[1.0, 1.0, 1.0], &[Benefit; 3]).unwrap_err();
        assert_eq!(
            err,
            SmcaError::ShapeMismatch {
                index: 2,
                expected: (2, 2),
                found: (2, 3)
            }
        );
    }

    #[test]
    fn test_shape_checked_before_lengths() {
        let a = Array2::<f64>::zeros((2, 2));
        let b = Array2::<f64>::zeros((3, 2));
        let err = combine(&[a, b], &[1.0], &[Benefit]).unwrap_err();
        assert!(matches!(err, SmcaError::ShapeMismatch { index: 1, .. }));
    }

    #[test]
    fn test_length_mismatch() {
        let grids = vec![Array2::<f64>::zeros((1, 1)); 3];

        let err = combine(&grids, &[0.5, 0.5], &[Benefit; 3]).unwrap_err();
        assert_eq!(
            err,
            SmcaError::LengthMismatch {
                what: "weights",
                expected: 3,
                found: 2
            }
        );

        let err = combine(&grids, &[0.2; 3], &[Benefit, Cost]).unwrap_err();
        assert!(matches!(err, SmcaError::LengthMismatch { what: "types", .. }));
    }

    #[test]
    fn test_no_criteria() {
        let grids: Vec<Array2<f64>> = Vec::new();
        assert_eq!(combine(&grids, &[], &[]).unwrap_err(), SmcaError::NoCriteria);
    }

    #[test]
    fn test_combine_flags_invalid() {
        let grids = vec![Array2::<f64>::zeros((1, 1)); 2];
        let err = Combiner::default()
            .combine_flags(&grids, &[0.5, 0.5], &[1.0, 2.0])
            .unwrap_err();
        assert!(matches!(err, SmcaError::InvalidType { index: 1, .. }));
    }

    #[test]
    fn test_combine_flags_valid() {
        let grids = vec![array![[0.25]], array![[0.25]]];
        let out = Combiner::default()
            .combine_flags(&grids, &[1.0, 1.0], &[1.0, 0.0])
            .unwrap();
        // 0.25 + (1 - 0.25)
        assert_relative_eq!(out[[0, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_min_max_policy_masks_cost() {
        let benefit = array![[0.0, 5.0], [10.0, 10.0]];
        let cost = array![[1.0, 2.0], [3.0, 4.0]];

        let out = Combiner::new(NormalizationPolicy::MinMaxTypeMask)
            .combine(&[benefit, cost], &[2.0, 3.0], &[Benefit, Cost])
            .unwrap();

        assert_relative_eq!(out[[0, 0]], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[[0, 1]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(out[[1, 0]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_min_max_constant_grid_is_finite() {
        let constant = Array2::from_elem((3, 4), 5.0);
        let out = Combiner::new(NormalizationPolicy::MinMaxTypeMask)
            .combine(&[constant], &[1.0], &[Benefit])
            .unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_raw_type_mask_policy() {
        let a = array![[4.0, 8.0]];
        let b = array![[100.0, 100.0]];
        let out = Combiner::new(NormalizationPolicy::RawTypeMask)
            .combine(&[a, b], &[0.5, 0.5], &[Benefit, Cost])
            .unwrap();
        assert_eq!(out, array![[2.0, 4.0]]);
    }

    #[test]
    fn test_inputs_untouched() {
        let a = array![[0.1, 0.2], [0.3, 0.4]];
        let snapshot = a.clone();
        let _ = combine(&[a.view()], &[1.0], &[Cost]).unwrap();
        assert_eq!(a, snapshot);
    }

    #[test]
    fn test_breakdown_matches_composite() {
        let a = array![[1.0, 0.0]];
        let b = array![[0.5, 0.5]];
        let (composite, summaries) = Combiner::default()
            .combine_with_breakdown(&[a, b], &[0.6, 0.4], &[Benefit, Cost])
            .unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].transform, CriterionTransform::Identity);
        assert_eq!(summaries[1].transform, CriterionTransform::Invert);
        assert_relative_eq!(summaries[0].stats.max.unwrap(), 0.6, epsilon = 1e-12);
        assert_relative_eq!(summaries[1].stats.mean.unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(composite[[0, 0]], 0.8, epsilon = 1e-12);
        assert_relative_eq!(composite[[0, 1]], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_short_flag_vector_is_length_mismatch() {
        let g = Array2::<f64>::zeros((2, 2));
        // The lone flag is also invalid; length must be reported first
        let err = Combiner::default()
            .combine_flags(&[g.clone(), g], &[0.5, 0.5], &[2.0])
            .unwrap_err();
        assert_eq!(
            err,
            SmcaError::LengthMismatch {
                what: "types",
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_masked_criterion_with_nodata_contributes_zero() {
        let benefit = array![[0.5, 0.5]];
        let masked = array![[f64::NAN, 0.25]];

        for policy in [NormalizationPolicy::MinMaxTypeMask, NormalizationPolicy::RawTypeMask] {
            let out = Combiner::new(policy)
                .combine(&[benefit.clone(), masked.clone()], &[1.0, 1.0], &[Benefit, Cost])
                .unwrap();
            assert!(out.iter().all(|v| v.is_finite()), "{} leaked nodata", policy);
        }

        let out = Combiner::new(NormalizationPolicy::RawTypeMask)
            .combine(&[benefit, masked], &[1.0, 1.0], &[Benefit, Cost])
            .unwrap();
        assert_eq!(out, array![[0.5, 0.5]]);
    }

    #[test]
    fn test_min_max_span_overflow_stays_finite() {
        let grid = array![[-1e308, 0.0, 1e308]];
        let out = Combiner::new(NormalizationPolicy::MinMaxTypeMask)
            .combine(&[grid], &[1.0], &[Benefit])
            .unwrap();

        assert!(out.iter().all(|v| v.is_finite()));
        assert_relative_eq!(out[[0, 0]], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[[0, 1]], 0.5, epsilon = 1e-12);
        assert_relative_eq!(out[[0, 2]], 1.0, epsilon = 1e-12);
    }

    /// Counts WARN events emitted on the current thread
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_breakdown_plans_each_criterion_once() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));

        let constant = Array2::from_elem((2, 2), 5.0);
        let varied = array![[0.0, 1.0], [2.0, 3.0]];

        let (composite, summaries) = tracing::subscriber::with_default(subscriber, || {
            Combiner::new(NormalizationPolicy::MinMaxTypeMask)
                .sequential()
                .combine_with_breakdown(&[constant, varied], &[0.5, 0.5], &[Benefit, Benefit])
                .unwrap()
        });

        // One degenerate criterion, one warning
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
        assert_eq!(summaries[0].transform, CriterionTransform::Zero);
        assert_eq!(
            summaries[1].transform,
            CriterionTransform::Rescale { scale: 1.0, min: 0.0, range: 3.0 }
        );
        assert_relative_eq!(composite[[1, 1]], 0.5, epsilon = 1e-12);
    }
}
