//! SMCA Scorer Rust Implementation
//!
//! Spatial Multi-Criteria Analysis: combines N spatially aligned criterion
//! rasters into a single composite raster by weighted linear combination.
//!
//! Module layout:
//! - `utils/`: Per-criterion normalization transforms and grid statistics
//! - `criteria`: Benefit/cost typing and normalization policy selection
//! - `combiner`: Validation, transform, weighting and summation (the core)
//! - `raster_io`: Raster read/write collaborators (ESRI ASCII grid)
//! - `config` / `pipeline`: JSON model configuration and the end-to-end run
//!
//! The combiner is a pure function of its inputs. Everything outside it is
//! I/O glue.

pub mod error;
pub mod utils;
pub mod criteria;
pub mod combiner;
pub mod raster_io;
pub mod config;
pub mod pipeline;

// Re-export commonly used types
pub use error::SmcaError;
pub use utils::{CriterionTransform, GridStats};
pub use criteria::{normalize_weights, CriterionType, NormalizationPolicy};
pub use combiner::{combine, Combiner, ContributionSummary};
pub use raster_io::{AsciiGrid, CellAnchor, RasterProfile, RasterReader, RasterWriter};
pub use config::{CriterionConfig, ModelConfig};
pub use pipeline::{run_model, RunSummary};
