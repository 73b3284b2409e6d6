//! Model configuration
//!
//! A model run is described by a JSON file listing the criteria (raster path,
//! weight, benefit/cost type), the normalization policy and the output path.
//! Relative paths are resolved against the directory of the config file.

use crate::criteria::{normalize_weights, CriterionType, NormalizationPolicy};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One criterion raster in the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionConfig {
    pub name: String,
    pub path: PathBuf,
    pub weight: f64,
    #[serde(rename = "type")]
    pub criterion_type: CriterionType,
}

/// Full model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub criteria: Vec<CriterionConfig>,

    #[serde(default)]
    pub policy: NormalizationPolicy,

    pub output: PathBuf,

    /// Criterion whose raster profile is used for the output (default: first)
    #[serde(default)]
    pub profile_from: Option<String>,

    /// Template raster supplying the output profile instead of a criterion
    #[serde(default)]
    pub profile_path: Option<PathBuf>,

    /// Rescale weights to sum to 1 before combining
    #[serde(default)]
    pub normalize_weights: bool,

    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl ModelConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model config: {:?}", path))?;

        let mut config = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse model config: {:?}", path))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);

        Ok(config)
    }

    /// Parse and validate configuration text without touching the filesystem
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: ModelConfig =
            serde_json::from_str(contents).with_context(|| "Invalid model config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Make relative criterion and output paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        for criterion in &mut self.criteria {
            if criterion.path.is_relative() {
                criterion.path = base.join(&criterion.path);
            }
        }
        if self.output.is_relative() {
            self.output = base.join(&self.output);
        }
        if let Some(template) = &mut self.profile_path {
            if template.is_relative() {
                *template = base.join(&*template);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.criteria.is_empty() {
            bail!("Model config lists no criteria");
        }

        let mut seen = std::collections::HashSet::new();
        for criterion in &self.criteria {
            if !seen.insert(criterion.name.as_str()) {
                bail!("Duplicate criterion name '{}'", criterion.name);
            }
        }

        if let Some(name) = &self.profile_from {
            if !seen.contains(name.as_str()) {
                bail!("profile_from refers to unknown criterion '{}'", name);
            }
            if self.profile_path.is_some() {
                bail!("profile_from and profile_path are mutually exclusive");
            }
        }

        Ok(())
    }

    /// Index of the criterion supplying the output profile
    pub fn profile_index(&self) -> usize {
        self.profile_from
            .as_ref()
            .and_then(|name| self.criteria.iter().position(|c| &c.name == name))
            .unwrap_or(0)
    }

    /// Weights in criterion order, normalized if requested
    pub fn weights(&self) -> Vec<f64> {
        let weights: Vec<f64> = self.criteria.iter().map(|c| c.weight).collect();
        if self.normalize_weights {
            normalize_weights(&weights)
        } else {
            weights
        }
    }

    /// Types in criterion order
    pub fn types(&self) -> Vec<CriterionType> {
        self.criteria.iter().map(|c| c.criterion_type).collect()
    }
}
