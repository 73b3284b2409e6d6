//! Utility modules for criteria combination
//!
//! Contains shared functionality used by the combiner:
//! - Normalization: Per-criterion transform planning (invert, rescale, mask)
//! - Grid statistics: One-pass min/max/mean with nodata handling

pub mod normalization;
pub mod grid_stats;

// Re-export commonly used types
pub use normalization::{plan_transform, CriterionTransform};
pub use grid_stats::GridStats;
