//! End-to-end model run
//!
//! Load every criterion raster, combine, write the composite with the chosen
//! profile. All I/O goes through the reader/writer collaborators so the run
//! can be driven from tests with in-memory implementations.

use crate::combiner::{Combiner, ContributionSummary};
use crate::config::ModelConfig;
use crate::raster_io::{RasterProfile, RasterReader, RasterWriter};
use crate::utils::GridStats;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Result of one model run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub output: PathBuf,
    pub shape: (usize, usize),
    pub profile: RasterProfile,
    pub stats: GridStats,
    pub contributions: Vec<NamedContribution>,
}

/// Contribution summary tagged with the criterion name
#[derive(Debug, Clone, Serialize)]
pub struct NamedContribution {
    pub name: String,
    #[serde(flatten)]
    pub summary: ContributionSummary,
}

/// Run the model described by `config`
pub fn run_model<R, W>(config: &ModelConfig, reader: &R, writer: &W) -> Result<RunSummary>
where
    R: RasterReader,
    W: RasterWriter,
{
    let start = Instant::now();

    let mut grids = Vec::with_capacity(config.criteria.len());
    let mut profiles = Vec::with_capacity(config.criteria.len());
    for criterion in &config.criteria {
        let (grid, profile) = reader
            .read(&criterion.path)
            .with_context(|| format!("Failed to load criterion '{}'", criterion.name))?;
        tracing::info!(
            "Loaded criterion '{}' ({}x{}, {}, weight {})",
            criterion.name, grid.nrows(), grid.ncols(), criterion.criterion_type, criterion.weight
        );
        grids.push(grid);
        profiles.push(profile);
    }

    let weights = config.weights();
    let types = config.types();
    let combiner = Combiner::new(config.policy).with_parallel(config.parallel);

    let combine_start = Instant::now();
    let (composite, breakdown) = combiner
        .combine_with_breakdown(&grids, &weights, &types)
        .with_context(|| "Failed to combine criteria")?;
    tracing::info!(
        "Combined {} criteria under {} in {:?}",
        grids.len(), config.policy, combine_start.elapsed()
    );

    let profile = match &config.profile_path {
        Some(template) => {
            let (_, profile) = reader
                .read(template)
                .with_context(|| format!("Failed to load profile template {:?}", template))?;
            if profile.shape() != composite.dim() {
                bail!(
                    "Profile template {:?} is {}x{} but criteria are {}x{}",
                    template, profile.nrows, profile.ncols, composite.nrows(), composite.ncols()
                );
            }
            tracing::info!("Using profile of template {:?}", template);
            profile
        }
        None => {
            let profile_index = config.profile_index();
            tracing::info!(
                "Using profile of criterion '{}'",
                config.criteria[profile_index].name
            );
            profiles.swap_remove(profile_index)
        }
    };

    writer
        .write(&config.output, &profile, &composite)
        .with_context(|| format!("Failed to write composite to {:?}", config.output))?;

    let stats = GridStats::of(&composite);
    tracing::info!(
        "Wrote {:?} (min {:?}, max {:?}, mean {:?}) in {:?}",
        config.output, stats.min, stats.max, stats.mean, start.elapsed()
    );

    let contributions = config
        .criteria
        .iter()
        .zip(breakdown)
        .map(|(criterion, summary)| NamedContribution {
            name: criterion.name.clone(),
            summary,
        })
        .collect();

    Ok(RunSummary {
        output: config.output.clone(),
        shape: composite.dim(),
        profile,
        stats,
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster_io::CellAnchor;
    use ndarray::Array2;
    use rustc_hash::FxHashMap;
    use std::cell::RefCell;
    use std::path::Path;

    /// In-memory raster store keyed by path
    #[derive(Default)]
    struct MemoryRasters {
        grids: FxHashMap<PathBuf, (Array2<f64>, RasterProfile)>,
        written: RefCell<Option<(PathBuf, RasterProfile, Array2<f64>)>>,
    }

    impl MemoryRasters {
        fn insert(&mut self, path: &str, value: f64, x_ll: f64) {
            self.insert_sized(path, (2, 2), value, x_ll);
        }

        fn insert_sized(&mut self, path: &str, shape: (usize, usize), value: f64, x_ll: f64) {
            let profile = RasterProfile {
                ncols: shape.1,
                nrows: shape.0,
                x_ll,
                y_ll: 0.0,
                anchor: CellAnchor::Corner,
                cell_size: 1.0,
                nodata: None,
            };
            self.grids
                .insert(PathBuf::from(path), (Array2::from_elem(shape, value), profile));
        }
    }

    impl RasterReader for MemoryRasters {
        fn read(&self, path: &Path) -> Result<(Array2<f64>, RasterProfile)> {
            self.grids
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no raster at {:?}", path))
        }
    }

    impl RasterWriter for MemoryRasters {
        fn write(&self, path: &Path, profile: &RasterProfile, grid: &Array2<f64>) -> Result<()> {
            *self.written.borrow_mut() = Some((path.to_path_buf(), profile.clone(), grid.clone()));
            Ok(())
        }
    }

    fn sample_config() -> ModelConfig {
        ModelConfig::from_json(
            r#"{
                "criteria": [
                    { "name": "ksat", "path": "a", "weight": 0.5, "type": "benefit" },
                    { "name": "wcs", "path": "b", "weight": 0.3, "type": "cost" },
                    { "name": "alt_dev", "path": "c", "weight": 0.2, "type": "benefit" }
                ],
                "output": "out",
                "profile_from": "alt_dev"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_run_model_writes_composite_with_chosen_profile() {
        let mut store = MemoryRasters::default();
        store.insert("a", 1.0, 10.0);
        store.insert("b", 0.0, 20.0);
        store.insert("c", 0.5, 30.0);

        let summary = run_model(&sample_config(), &store, &store).unwrap();

        let (path, profile, grid) = store.written.borrow().clone().unwrap();
        assert_eq!(path, PathBuf::from("out"));
        assert_eq!(profile.x_ll, 30.0);
        assert!(grid.iter().all(|v| (v - 0.9).abs() < 1e-12));

        assert_eq!(summary.shape, (2, 2));
        assert_eq!(summary.contributions.len(), 3);
        assert_eq!(summary.contributions[1].name, "wcs");
    }

    #[test]
    fn test_run_model_missing_raster_names_criterion() {
        let mut store = MemoryRasters::default();
        store.insert("a", 1.0, 0.0);
        store.insert("c", 0.5, 0.0);

        let err = run_model(&sample_config(), &store, &store).unwrap_err();
        assert!(format!("{:#}", err).contains("'wcs'"));
        assert!(store.written.borrow().is_none());
    }

    fn template_config() -> ModelConfig {
        let mut config = sample_config();
        config.profile_from = None;
        config.profile_path = Some(PathBuf::from("dem"));
        config
    }

    #[test]
    fn test_run_model_uses_profile_template() {
        let mut store = MemoryRasters::default();
        store.insert("a", 1.0, 10.0);
        store.insert("b", 0.0, 20.0);
        store.insert("c", 0.5, 30.0);
        store.insert("dem", 123.0, 40.0);

        let summary = run_model(&template_config(), &store, &store).unwrap();

        let (_, profile, grid) = store.written.borrow().clone().unwrap();
        assert_eq!(profile.x_ll, 40.0);
        assert_eq!(summary.profile.x_ll, 40.0);
        // Template cell values never enter the composite
        assert!(grid.iter().all(|v| (v - 0.9).abs() < 1e-12));
    }

    #[test]
    fn test_run_model_rejects_misaligned_template() {
        let mut store = MemoryRasters::default();
        store.insert("a", 1.0, 10.0);
        store.insert("b", 0.0, 20.0);
        store.insert("c", 0.5, 30.0);
        store.insert_sized("dem", (3, 2), 0.0, 40.0);

        let err = run_model(&template_config(), &store, &store).unwrap_err();
        assert!(err.to_string().contains("is 3x2 but criteria are 2x2"));
        assert!(store.written.borrow().is_none());
    }
}
