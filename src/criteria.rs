//! Criterion typing and normalization policy selection
//!
//! A criterion is either a benefit (higher raw values are better) or a cost
//! (lower raw values are better). How that type is applied depends on the
//! normalization policy chosen for the run.

use crate::error::SmcaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RawCriterionType")]
pub enum CriterionType {
    /// Higher raw values are more favorable (flag 1)
    Benefit,
    /// Lower raw values are more favorable (flag 0)
    Cost,
}

impl CriterionType {
    /// Map a numeric flag (1 = benefit, 0 = cost)
    pub fn from_flag(flag: f64) -> Option<Self> {
        if flag == 1.0 {
            Some(CriterionType::Benefit)
        } else if flag == 0.0 {
            Some(CriterionType::Cost)
        } else {
            None
        }
    }

    /// Map a name or a textual flag, case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "benefit" | "1" => Some(CriterionType::Benefit),
            "cost" | "0" => Some(CriterionType::Cost),
            _ => None,
        }
    }

    /// Convert a whole vector of numeric flags, reporting the first bad entry
    pub fn parse_flags(flags: &[f64]) -> Result<Vec<Self>, SmcaError> {
        flags
            .iter()
            .enumerate()
            .map(|(index, &flag)| {
                Self::from_flag(flag).ok_or_else(|| SmcaError::InvalidType {
                    index,
                    value: flag.to_string(),
                })
            })
            .collect()
    }

    /// Numeric flag value (1.0 for benefit, 0.0 for cost)
    pub fn flag(self) -> f64 {
        match self {
            CriterionType::Benefit => 1.0,
            CriterionType::Cost => 0.0,
        }
    }
}

impl fmt::Display for CriterionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriterionType::Benefit => write!(f, "benefit"),
            CriterionType::Cost => write!(f, "cost"),
        }
    }
}

/// Accepted encodings of a criterion type in config files
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCriterionType {
    Flag(f64),
    Name(String),
}

impl TryFrom<RawCriterionType> for CriterionType {
    type Error = String;

    fn try_from(raw: RawCriterionType) -> Result<Self, Self::Error> {
        match raw {
            RawCriterionType::Flag(flag) => CriterionType::from_flag(flag)
                .ok_or_else(|| format!("invalid criterion type flag {} (expected 1 or 0)", flag)),
            RawCriterionType::Name(name) => CriterionType::from_name(&name)
                .ok_or_else(|| format!("invalid criterion type '{}' (expected benefit or cost)", name)),
        }
    }
}

/// Per-criterion transform policy applied before weighting
///
/// The three variants are mutually incompatible. `InvertCost` is the
/// canonical behavior; the other two reproduce older scoring scripts and are
/// kept for compatibility comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Cost criteria become `1 - v`, benefit criteria pass through.
    /// Assumes raw values are already scaled to [0, 1].
    #[default]
    InvertCost,
    /// Min-max rescale each grid to [0, 1], then multiply by the type flag.
    /// Cost criteria therefore contribute zero rather than an inverted value.
    MinMaxTypeMask,
    /// Raw values multiplied by the type flag, no rescaling or inversion.
    RawTypeMask,
}

impl fmt::Display for NormalizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationPolicy::InvertCost => write!(f, "invert_cost"),
            NormalizationPolicy::MinMaxTypeMask => write!(f, "min_max_type_mask"),
            NormalizationPolicy::RawTypeMask => write!(f, "raw_type_mask"),
        }
    }
}

/// Rescale weights so they sum to 1
///
/// Returns the weights unchanged if their sum is zero or not finite.
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return weights.to_vec();
    }
    weights.iter().map(|w| w / total).collect()
}
