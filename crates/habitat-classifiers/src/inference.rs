//! Full-grid inference for classifiers that cannot accept missing values.
//!
//! Missing features are replaced by an out-of-range sentinel before the
//! classifier sees them, and every output of a pixel that had any missing
//! feature is overwritten with the NoData marker afterwards. The two steps
//! are plain functions ([`fill_missing`], [`restore_missing`]) so they work
//! with any classifier.
use ndarray::{s, Array2, ArrayView2, Axis};

use crate::error::{HabitatError, Result};
use crate::models::factory::TrainedModel;
use crate::models::utils::argmax;
use crate::target::TargetGrid;

/// Default stand-in for missing features during inference.
pub const DEFAULT_SENTINEL: f32 = -999.0;

/// Per-row flag: true when any feature of that row (pixel) is missing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MissingMask {
    flags: Vec<bool>,
}

impl MissingMask {
    pub fn from_flags(flags: Vec<bool>) -> Self {
        Self { flags }
    }

    /// Mask of the rows of `matrix` holding at least one NaN.
    pub fn from_rows(matrix: &ArrayView2<f32>) -> Self {
        Self {
            flags: matrix
                .axis_iter(Axis(0))
                .map(|row| row.iter().any(|v| v.is_nan()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn is_missing(&self, row: usize) -> bool {
        self.flags.get(row).copied().unwrap_or(false)
    }

    pub fn n_missing(&self) -> usize {
        self.flags.iter().filter(|&&m| m).count()
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }
}

/// Replace every NaN with `sentinel`, returning the filled copy and the row mask.
pub fn fill_missing(matrix: &ArrayView2<f32>, sentinel: f32) -> (Array2<f32>, MissingMask) {
    let mask = MissingMask::from_rows(matrix);
    let filled = matrix.mapv(|v| if v.is_nan() { sentinel } else { v });
    (filled, mask)
}

/// Overwrite every value of each masked row of a (rows x outputs) matrix.
pub fn restore_missing(values: &mut Array2<f32>, mask: &MissingMask, marker: f32) {
    for (idx, mut row) in values.axis_iter_mut(Axis(0)).enumerate() {
        if mask.is_missing(idx) {
            row.fill(marker);
        }
    }
}

/// Per-row variant of [`restore_missing`] for single-valued outputs.
pub fn restore_missing_values(values: &mut [f32], mask: &MissingMask, marker: f32) {
    for (idx, v) in values.iter_mut().enumerate() {
        if mask.is_missing(idx) {
            *v = marker;
        }
    }
}

/// Per-pixel outputs of a masked inference run.
#[derive(Debug, Clone)]
pub struct MaskedPrediction {
    /// Class labels, in probability column order.
    pub classes: Vec<i64>,
    /// Predicted class label per pixel (as `f32`), marker where masked.
    pub labels: Vec<f32>,
    /// (pixels x classes) probabilities, marker where masked.
    pub probabilities: Array2<f32>,
    /// Maximum class probability per pixel, marker where masked.
    pub certainty: Vec<f32>,
    pub mask: MissingMask,
}

/// Runs a trained model over a [`TargetGrid`] with sentinel substitution.
#[derive(Debug, Clone, Copy)]
pub struct NanMaskedInferer {
    pub sentinel: f32,
    /// Value written to every output of a masked pixel.
    pub marker: f32,
    pub chunk_rows: usize,
}

impl Default for NanMaskedInferer {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL,
            marker: f32::NAN,
            chunk_rows: 65_536,
        }
    }
}

impl NanMaskedInferer {
    pub fn new(sentinel: f32, chunk_rows: usize) -> Self {
        Self {
            sentinel,
            chunk_rows: chunk_rows.max(1),
            ..Default::default()
        }
    }

    pub fn predict(&self, model: &TrainedModel, grid: &TargetGrid) -> Result<MaskedPrediction> {
        let n_pixels = grid.n_pixels();
        let classes = model.classes().to_vec();
        let n_classes = classes.len();
        let chunk_rows = self.chunk_rows.max(1);

        let mut probabilities = Array2::<f32>::zeros((n_pixels, n_classes));
        let mut labels = vec![self.marker; n_pixels];
        let mut certainty = vec![self.marker; n_pixels];

        let mut start = 0;
        while start < n_pixels {
            let end = (start + chunk_rows).min(n_pixels);
            let chunk = grid.features.slice(s![start..end, ..]);
            let (filled, mask) = fill_missing(&chunk, self.sentinel);

            let mut proba = model.predict_proba(&filled)?;
            if proba.dim() != (end - start, n_classes) {
                return Err(HabitatError::model_fit(
                    model.name(),
                    format!(
                        "probability matrix is {:?}, expected ({}, {})",
                        proba.dim(),
                        end - start,
                        n_classes
                    ),
                ));
            }
            restore_missing(&mut proba, &mask, self.marker);

            for (offset, row) in proba.axis_iter(Axis(0)).enumerate() {
                if mask.is_missing(offset) {
                    continue;
                }
                let best = argmax(row.iter().copied());
                labels[start + offset] = classes[best] as f32;
                certainty[start + offset] = row[best];
            }
            probabilities.slice_mut(s![start..end, ..]).assign(&proba);

            log::trace!("Predicted pixels {}..{} of {}", start, end, n_pixels);
            start = end;
        }

        // The grid's own mask is authoritative for every output layer.
        restore_missing(&mut probabilities, &grid.missing, self.marker);
        restore_missing_values(&mut labels, &grid.missing, self.marker);
        restore_missing_values(&mut certainty, &grid.missing, self.marker);

        Ok(MaskedPrediction {
            classes,
            labels,
            probabilities,
            certainty,
            mask: grid.missing.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fill_then_restore_recovers_missing_rows() {
        let m = array![[1.0, f32::NAN], [2.0, 3.0], [f32::NAN, f32::NAN], [4.0, 5.0]];
        let (filled, mask) = fill_missing(&m.view(), DEFAULT_SENTINEL);
        assert!(filled.iter().all(|v| !v.is_nan()));
        assert_eq!(filled[[0, 1]], DEFAULT_SENTINEL);
        assert_eq!(mask.flags(), &[true, false, true, false]);

        let mut out = Array2::<f32>::from_elem((4, 3), 0.25);
        restore_missing(&mut out, &mask, f32::NAN);
        assert_eq!(MissingMask::from_rows(&out.view()), mask);
        assert_eq!(out[[1, 2]], 0.25);
    }

    #[test]
    fn restore_values_ignores_rows_past_mask() {
        let mask = MissingMask::from_flags(vec![false, true]);
        let mut values = vec![1.0, 2.0, 3.0];
        restore_missing_values(&mut values, &mask, -1.0);
        assert_eq!(values, vec![1.0, -1.0, 3.0]);
    }
}
