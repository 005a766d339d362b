use ndarray::Array2;

use crate::error::Result;
use crate::models::utils::argmax;

/// Contract shared by every classifier backend.
///
/// Labels are dense class indices `0..n_classes` (see
/// [`LabelEncoder`](crate::models::utils::LabelEncoder)); probability
/// columns follow the same indices. Inputs never contain missing values:
/// training rows are cleaned beforehand and inference rows are
/// sentinel-filled by the caller.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model on `x` (rows x features) with encoded labels `y`.
    fn fit(&mut self, x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<()>;

    /// Per-class probabilities, one row per input row; rows sum to one.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>>;

    /// Most probable class index per row.
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| argmax(row.iter().copied()))
            .collect())
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
