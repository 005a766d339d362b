use ndarray::{Array2, Axis};

/// Maps arbitrary integer class codes onto dense indices in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<i64>,
}

impl LabelEncoder {
    pub fn fit(labels: &[i64]) -> Self {
        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Index of `label`, `None` for a label not seen during fitting.
    pub fn index_of(&self, label: i64) -> Option<usize> {
        self.classes.binary_search(&label).ok()
    }

    /// Encode labels known to the encoder; unknown labels are skipped.
    pub fn encode(&self, labels: &[i64]) -> Vec<usize> {
        labels.iter().filter_map(|&l| self.index_of(l)).collect()
    }

    pub fn decode(&self, index: usize) -> Option<i64> {
        self.classes.get(index).copied()
    }
}

/// Index of the largest value; ties go to the first, NaN never wins.
pub fn argmax<I: IntoIterator<Item = f32>>(values: I) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (idx, v) in values.into_iter().enumerate() {
        if v > best_value {
            best = idx;
            best_value = v;
        }
    }
    best
}

/// Row-wise softmax in place.
pub fn softmax_rows(logits: &mut Array2<f32>) {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum: f32 = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

/// Scale every row to sum to one; all-zero rows become uniform.
pub fn normalize_rows(values: &mut Array2<f32>) {
    let n_cols = values.ncols();
    for mut row in values.axis_iter_mut(Axis(0)) {
        let sum: f32 = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        } else if n_cols > 0 {
            row.fill(1.0 / n_cols as f32);
        }
    }
}
