//! Flattening of a feature stack into a per-pixel inference matrix.
use ndarray::Array2;

use crate::error::{HabitatError, Result};
use crate::inference::MissingMask;
use crate::raster::{GridSpec, RasterLayer};
use crate::stack::{FeatureSchema, FeatureStack, Scenario};

/// Every pixel of a stack as one feature row, plus what is needed to turn
/// per-pixel outputs back into rasters.
#[derive(Debug, Clone)]
pub struct TargetGrid {
    pub scenario: Scenario,
    /// (pixels x features), row-major pixel order, NaN where missing.
    pub features: Array2<f32>,
    pub grid: GridSpec,
    /// NoData marker of the output rasters.
    pub nodata: f64,
    pub missing: MissingMask,
    pub feature_names: Vec<String>,
    pub schema: FeatureSchema,
}

impl TargetGrid {
    pub fn from_stack(stack: &FeatureStack) -> Self {
        let grid = stack.grid().clone();
        let n_pixels = grid.n_pixels();
        let n_features = stack.n_features();

        let mut features = Array2::<f32>::from_elem((n_pixels, n_features), f32::NAN);
        for (col, layer) in stack.layers().iter().enumerate() {
            for ((row, c), _) in layer.data().indexed_iter() {
                features[[row * grid.cols + c, col]] = layer.value(row, c);
            }
        }

        let missing = MissingMask::from_rows(&features.view());
        log::debug!(
            "Target grid '{}': {} pixels x {} features, {} with missing values",
            stack.scenario(),
            n_pixels,
            n_features,
            missing.n_missing()
        );

        Self {
            scenario: stack.scenario().clone(),
            features,
            grid,
            nodata: f64::NAN,
            missing,
            feature_names: stack.feature_names(),
            schema: stack.schema(),
        }
    }

    pub fn n_pixels(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Reshape one value per pixel into a raster on this grid.
    pub fn to_layer(&self, name: &str, values: Vec<f32>) -> Result<RasterLayer> {
        if values.len() != self.n_pixels() {
            return Err(HabitatError::configuration(format!(
                "output '{}' has {} values for {} pixels",
                name,
                values.len(),
                self.n_pixels()
            )));
        }
        RasterLayer::from_vec(name, self.grid.clone(), Some(self.nodata), values)
    }
}
