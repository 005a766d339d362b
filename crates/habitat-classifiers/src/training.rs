//! Training vectors sampled from a feature stack at point locations.
use std::collections::BTreeSet;

use ndarray::{Array2, Axis};

use crate::error::{HabitatError, Result};
use crate::stack::FeatureStack;

/// A labelled point in the stack's coordinate reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointObservation {
    pub x: f64,
    pub y: f64,
    /// Class code read from the `CLASS` attribute.
    pub label: i64,
}

impl PointObservation {
    pub fn new(x: f64, y: f64, label: i64) -> Self {
        Self { x, y, label }
    }
}

/// One sampled feature vector and its label.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub features: Vec<f32>,
    pub label: i64,
}

/// Feature matrix (rows x layers) with labels; NaN marks a missing value.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub x: Array2<f32>,
    pub y: Vec<i64>,
    /// Index of the source point of each row.
    pub row_ids: Vec<usize>,
    pub feature_names: Vec<String>,
}

impl TrainingSet {
    pub fn from_samples(samples: Vec<TrainingSample>, feature_names: Vec<String>) -> Result<Self> {
        let n_features = feature_names.len();
        let n_rows = samples.len();
        let mut values = Vec::with_capacity(n_rows * n_features);
        let mut y = Vec::with_capacity(n_rows);
        for (idx, sample) in samples.into_iter().enumerate() {
            if sample.features.len() != n_features {
                return Err(HabitatError::configuration(format!(
                    "sample {} has {} features, expected {}",
                    idx,
                    sample.features.len(),
                    n_features
                )));
            }
            values.extend(sample.features);
            y.push(sample.label);
        }
        let x = Array2::from_shape_vec((n_rows, n_features), values)
            .map_err(|e| HabitatError::configuration(e.to_string()))?;
        Ok(Self {
            x,
            y,
            row_ids: (0..n_rows).collect(),
            feature_names,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Distinct labels, ascending.
    pub fn classes(&self) -> Vec<i64> {
        self.y.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    pub fn has_missing(&self) -> bool {
        self.x.iter().any(|v| v.is_nan())
    }

    /// Rows at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> TrainingSet {
        TrainingSet {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
            row_ids: indices.iter().map(|&i| self.row_ids[i]).collect(),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Keep only rows without any missing feature value.
    pub fn clean(&self) -> TrainingSet {
        let keep: Vec<usize> = self
            .x
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| !v.is_nan()))
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&keep)
    }
}

/// Samples a [`FeatureStack`] at point locations.
pub struct TrainingSetExtractor<'a> {
    stack: &'a FeatureStack,
}

impl<'a> TrainingSetExtractor<'a> {
    pub fn new(stack: &'a FeatureStack) -> Self {
        Self { stack }
    }

    pub fn sample(&self, point: &PointObservation) -> TrainingSample {
        let grid = self.stack.grid();
        let features = match grid.transform.locate(point.x, point.y, grid.rows, grid.cols) {
            Some((row, col)) => self
                .stack
                .layers()
                .iter()
                .map(|layer| layer.value(row, col))
                .collect(),
            None => vec![f32::NAN; self.stack.n_features()],
        };
        TrainingSample {
            features,
            label: point.label,
        }
    }

    /// Raw training set; rows may contain missing values.
    pub fn extract(&self, points: &[PointObservation]) -> Result<TrainingSet> {
        let samples = points.iter().map(|p| self.sample(p)).collect();
        TrainingSet::from_samples(samples, self.stack.feature_names())
    }

    /// Cleaned training set with at least `min_rows` rows.
    pub fn extract_clean(&self, points: &[PointObservation], min_rows: usize) -> Result<TrainingSet> {
        let raw = self.extract(points)?;
        let cleaned = raw.clean();
        let dropped = raw.n_rows() - cleaned.n_rows();
        if dropped > 0 {
            log::warn!(
                "Dropped {} of {} training rows with missing feature values",
                dropped,
                raw.n_rows()
            );
        }
        if cleaned.is_empty() {
            return Err(HabitatError::InsufficientData(format!(
                "no complete training rows remain out of {} points",
                raw.n_rows()
            )));
        }
        if cleaned.n_rows() < min_rows {
            return Err(HabitatError::InsufficientData(format!(
                "{} complete training rows, at least {} required",
                cleaned.n_rows(),
                min_rows
            )));
        }
        log::debug!(
            "Training set: {} rows x {} features, classes {:?}",
            cleaned.n_rows(),
            cleaned.n_features(),
            cleaned.classes()
        );
        Ok(cleaned)
    }
}
