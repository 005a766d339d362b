//! Single-band raster layers and their grid metadata.

use ndarray::Array2;

use crate::error::{HabitatError, Result};
use crate::raster::crs::{crs_matches, Crs};
use crate::raster::GeoTransform;

/// Shape and georeferencing shared by every layer of a feature stack.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
}

impl GridSpec {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Option<Crs>) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs,
        }
    }

    pub fn n_pixels(&self) -> usize {
        self.rows * self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Describe the first disagreement with `other`, or `None` when aligned.
    pub fn misalignment(&self, other: &GridSpec) -> Option<String> {
        if self.shape() != other.shape() {
            return Some(format!(
                "shape {}x{} differs from {}x{}",
                other.rows, other.cols, self.rows, self.cols
            ));
        }
        if !self.transform.is_aligned_with(&other.transform) {
            return Some(format!(
                "transform {:?} differs from {:?}",
                other.transform.to_gdal(),
                self.transform.to_gdal()
            ));
        }
        if !crs_matches(self.crs.as_ref(), other.crs.as_ref()) {
            let show = |c: Option<&Crs>| c.map_or_else(|| "unknown".to_string(), |c| c.to_string());
            return Some(format!(
                "CRS {} differs from {}",
                show(other.crs.as_ref()),
                show(self.crs.as_ref())
            ));
        }
        None
    }

    pub fn is_aligned_with(&self, other: &GridSpec) -> bool {
        self.misalignment(other).is_none()
    }
}

/// One georeferenced band held in memory as `f32`.
#[derive(Debug, Clone)]
pub struct RasterLayer {
    name: String,
    grid: GridSpec,
    nodata: Option<f64>,
    data: Array2<f32>,
}

impl RasterLayer {
    pub fn new(
        name: impl Into<String>,
        grid: GridSpec,
        nodata: Option<f64>,
        data: Array2<f32>,
    ) -> Result<Self> {
        let name = name.into();
        if data.dim() != grid.shape() {
            return Err(HabitatError::configuration(format!(
                "layer '{}' holds {:?} cells but its grid is {}x{}",
                name,
                data.dim(),
                grid.rows,
                grid.cols
            )));
        }
        Ok(Self {
            name,
            grid,
            nodata,
            data,
        })
    }

    /// Build a layer from row-major values.
    pub fn from_vec(
        name: impl Into<String>,
        grid: GridSpec,
        nodata: Option<f64>,
        values: Vec<f32>,
    ) -> Result<Self> {
        let name = name.into();
        let data = Array2::from_shape_vec(grid.shape(), values).map_err(|e| {
            HabitatError::configuration(format!("layer '{}': {}", name, e))
        })?;
        Self::new(name, grid, nodata, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// True when `value` is NaN or equals the layer's NoData marker.
    pub fn is_missing(&self, value: f32) -> bool {
        if value.is_nan() {
            return true;
        }
        match self.nodata {
            Some(nd) if nd.is_nan() => false,
            // Compared in the band's own precision.
            Some(nd) => {
                let nd = nd as f32;
                value == nd || (value - nd).abs() <= f32::EPSILON * nd.abs()
            }
            None => false,
        }
    }

    /// Cell value with NoData normalised to `NaN`.
    pub fn value(&self, row: usize, col: usize) -> f32 {
        match self.data.get((row, col)) {
            Some(&v) if !self.is_missing(v) => v,
            _ => f32::NAN,
        }
    }

    /// Sample the layer at a geographic coordinate; `NaN` outside the grid.
    pub fn sample(&self, x: f64, y: f64) -> f32 {
        match self
            .grid
            .transform
            .locate(x, y, self.grid.rows, self.grid.cols)
        {
            Some((row, col)) => self.value(row, col),
            None => f32::NAN,
        }
    }

    /// Minimum and maximum over valid cells, `None` if every cell is missing.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|&&v| !self.is_missing(v))
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
