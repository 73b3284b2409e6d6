//! Raster I/O collaborators
//!
//! The combiner never touches files. Glue code reads criterion grids through a
//! `RasterReader` and persists the composite through a `RasterWriter`, passing
//! along an opaque `RasterProfile` taken from one of the inputs.
//!
//! `AsciiGrid` implements both traits for the ESRI ASCII grid format:
//!
//! ```text
//! ncols         4
//! nrows         2
//! xllcorner     500000.0
//! yllcorner     4100000.0
//! cellsize      30.0
//! NODATA_value  -9999
//! 0.1 0.2 0.3 0.4
//! 0.5 -9999 0.7 0.8
//! ```
//!
//! Nodata cells are read as NaN and NaN cells are written back as nodata.

use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Nodata marker used when writing NaN cells with a profile that has none
pub const DEFAULT_NODATA: f64 = -9999.0;

/// Keys recognised in the header block (compared lowercase)
const HEADER_KEYS: [&str; 8] = [
    "ncols",
    "nrows",
    "xllcorner",
    "xllcenter",
    "yllcorner",
    "yllcenter",
    "cellsize",
    "nodata_value",
];

/// Which point of the lower-left cell the origin coordinates refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellAnchor {
    Corner,
    Center,
}

/// Georeferencing metadata carried from an input raster to the output
///
/// Opaque to the combiner; only the I/O layer interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterProfile {
    pub ncols: usize,
    pub nrows: usize,
    pub x_ll: f64,
    pub y_ll: f64,
    pub anchor: CellAnchor,
    pub cell_size: f64,
    pub nodata: Option<f64>,
}

impl RasterProfile {
    /// Grid shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }
}

/// Reads one single-band raster into a grid plus its profile
pub trait RasterReader {
    fn read(&self, path: &Path) -> Result<(Array2<f64>, RasterProfile)>;
}

/// Persists one grid as a single-band raster using a profile
pub trait RasterWriter {
    fn write(&self, path: &Path, profile: &RasterProfile, grid: &Array2<f64>) -> Result<()>;
}

/// ESRI ASCII grid reader/writer
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiGrid;

impl AsciiGrid {
    /// Parse ASCII grid text; `source` is only used in error messages
    pub fn parse(text: &str, source: &str) -> Result<(Array2<f64>, RasterProfile)> {
        let mut header: FxHashMap<String, f64> = FxHashMap::default();
        let lines: Vec<&str> = text.lines().collect();

        // Header ends at the first line not keyed by a known header name,
        // so data rows starting with `inf` or `nan` are not mistaken for keys
        let mut data_start = 0;
        for (line_no, line) in lines.iter().enumerate() {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                data_start = line_no + 1;
                continue;
            };
            let key = key.to_ascii_lowercase();
            if !HEADER_KEYS.contains(&key.as_str()) {
                break;
            }
            let value = tokens
                .next()
                .ok_or_else(|| anyhow!("{}: header line {} has no value for '{}'", source, line_no + 1, key))?;
            let value: f64 = value.parse().with_context(|| {
                format!("{}: invalid header value '{}' for '{}'", source, value, key)
            })?;
            header.insert(key, value);
            data_start = line_no + 1;
        }

        let profile = profile_from_header(&header, source)?;
        let (nrows, ncols) = profile.shape();
        let cells = nrows.checked_mul(ncols).ok_or_else(|| {
            anyhow!("{}: grid of {} rows x {} cols is too large", source, nrows, ncols)
        })?;

        // Each value takes at least two bytes of text, including its separator
        let mut values = Vec::with_capacity(cells.min(text.len() / 2 + 1));
        for (line_no, line) in lines.iter().enumerate().skip(data_start) {
            for token in line.split_whitespace() {
                if values.len() == cells {
                    bail!(
                        "{}: more than {} values (extra data at line {})",
                        source, cells, line_no + 1
                    );
                }
                let v: f64 = token.parse().with_context(|| {
                    format!(
                        "{}: invalid cell value '{}' at line {} (row {})",
                        source, token, line_no + 1, values.len() / ncols
                    )
                })?;
                values.push(match profile.nodata {
                    Some(nodata) if v == nodata => f64::NAN,
                    _ => v,
                });
            }
        }

        if values.len() != cells {
            bail!(
                "{}: expected {} values ({} rows x {} cols), found {}",
                source, cells, nrows, ncols, values.len()
            );
        }

        let grid = Array2::from_shape_vec((nrows, ncols), values)
            .with_context(|| format!("{}: failed to build {}x{} grid", source, nrows, ncols))?;

        Ok((grid, profile))
    }

    /// Render a grid as ASCII grid text
    pub fn render(profile: &RasterProfile, grid: &Array2<f64>) -> Result<String> {
        if grid.dim() != profile.shape() {
            bail!(
                "profile is {}x{} but grid is {}x{}",
                profile.nrows, profile.ncols, grid.nrows(), grid.ncols()
            );
        }

        let (x_key, y_key) = match profile.anchor {
            CellAnchor::Corner => ("xllcorner", "yllcorner"),
            CellAnchor::Center => ("xllcenter", "yllcenter"),
        };
        let nodata = profile.nodata.unwrap_or(DEFAULT_NODATA);

        let mut out = String::with_capacity(grid.len() * 8 + 128);
        out.push_str(&format!("ncols {}\n", profile.ncols));
        out.push_str(&format!("nrows {}\n", profile.nrows));
        out.push_str(&format!("{} {}\n", x_key, profile.x_ll));
        out.push_str(&format!("{} {}\n", y_key, profile.y_ll));
        out.push_str(&format!("cellsize {}\n", profile.cell_size));
        out.push_str(&format!("NODATA_value {}\n", nodata));

        for row in grid.rows() {
            let line: Vec<String> = row
                .iter()
                .map(|&v| if v.is_nan() { nodata.to_string() } else { v.to_string() })
                .collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }

        Ok(out)
    }
}

impl RasterReader for AsciiGrid {
    fn read(&self, path: &Path) -> Result<(Array2<f64>, RasterProfile)> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read raster: {:?}", path))?;
        AsciiGrid::parse(&text, &path.display().to_string())
    }
}

impl RasterWriter for AsciiGrid {
    fn write(&self, path: &Path, profile: &RasterProfile, grid: &Array2<f64>) -> Result<()> {
        let text = AsciiGrid::render(profile, grid)
            .with_context(|| format!("Failed to render raster for {:?}", path))?;

        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create raster: {:?}", path))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.flush())
            .with_context(|| format!("Failed to write raster: {:?}", path))?;
        Ok(())
    }
}

fn profile_from_header(header: &FxHashMap<String, f64>, source: &str) -> Result<RasterProfile> {
    let get = |key: &str| -> Result<f64> {
        header
            .get(key)
            .copied()
            .ok_or_else(|| anyhow!("{}: missing header key '{}'", source, key))
    };
    let get_dim = |key: &str| -> Result<usize> {
        let v = get(key)?;
        if v < 1.0 || v.fract() != 0.0 || v >= usize::MAX as f64 {
            bail!("{}: '{}' must be a positive integer, got {}", source, key, v);
        }
        Ok(v as usize)
    };

    let (anchor, x_ll, y_ll) = match (header.get("xllcorner"), header.get("xllcenter")) {
        (Some(&x), _) => (CellAnchor::Corner, x, get("yllcorner")?),
        (None, Some(&x)) => (CellAnchor::Center, x, get("yllcenter")?),
        (None, None) => bail!("{}: missing header key 'xllcorner' or 'xllcenter'", source),
    };

    Ok(RasterProfile {
        ncols: get_dim("ncols")?,
        nrows: get_dim("nrows")?,
        x_ll,
        y_ll,
        anchor,
        cell_size: get("cellsize")?,
        nodata: header.get("nodata_value").copied(),
    })
}
