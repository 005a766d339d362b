//! K-fold cross-validation of a classifier spec over a cleaned training set.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierSpec;
use crate::error::{HabitatError, Result};
use crate::stats::{accuracy, mean_std};
use crate::training::TrainingSet;

/// How rows are assigned to folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoldStrategy {
    /// Consecutive blocks in row order; the first `n % k` folds get one extra row.
    Contiguous,
    /// Same block sizes over a seeded permutation of the rows.
    Shuffled { seed: u64 },
}

/// Deterministic k-fold splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    pub n_splits: usize,
    pub strategy: FoldStrategy,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            strategy: FoldStrategy::Contiguous,
        }
    }

    pub fn shuffled(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            strategy: FoldStrategy::Shuffled { seed },
        }
    }

    /// `(train, test)` row indices for every fold.
    pub fn split(&self, n_rows: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(HabitatError::configuration(format!(
                "cross-validation needs at least 2 folds, got {}",
                k
            )));
        }
        if n_rows < k {
            return Err(HabitatError::InsufficientData(format!(
                "cannot split {} rows into {} folds",
                n_rows, k
            )));
        }

        let mut order: Vec<usize> = (0..n_rows).collect();
        if let FoldStrategy::Shuffled { seed } = self.strategy {
            order.shuffle(&mut StdRng::seed_from_u64(seed));
        }

        let base = n_rows / k;
        let extra = n_rows % k;
        let mut folds = Vec::with_capacity(k);
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let test = order[start..start + size].to_vec();
            let train = order[..start]
                .iter()
                .chain(order[start + size..].iter())
                .copied()
                .collect();
            folds.push((train, test));
            start += size;
        }
        Ok(folds)
    }
}

/// Accuracy summary of one classifier over k folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValResult {
    pub classifier: String,
    pub n_folds: usize,
    /// Mean fold accuracy in `[0, 1]`.
    pub mean_accuracy: f64,
    /// Population standard deviation of the fold accuracies.
    pub std_accuracy: f64,
    pub fold_accuracies: Vec<f64>,
}

impl CrossValResult {
    pub fn from_folds(classifier: impl Into<String>, fold_accuracies: Vec<f64>) -> Self {
        let (mean_accuracy, std_accuracy) = mean_std(&fold_accuracies);
        Self {
            classifier: classifier.into(),
            n_folds: fold_accuracies.len(),
            mean_accuracy,
            std_accuracy,
            fold_accuracies,
        }
    }

    /// `rf 5-fold Cross Validation Accuracy: 91.25 (+/- 3.10)`
    pub fn report_line(&self) -> String {
        format!(
            "{} {}-fold Cross Validation Accuracy: {:.2} (+/- {:.2})",
            self.classifier,
            self.n_folds,
            self.mean_accuracy * 100.0,
            self.std_accuracy * 100.0
        )
    }
}

/// Runs k-fold cross-validation; never touches the model used for inference.
#[derive(Debug, Clone, Copy)]
pub struct CrossValidator {
    kfold: KFold,
}

impl CrossValidator {
    pub fn new(kfold: KFold) -> Self {
        Self { kfold }
    }

    pub fn kfold(&self) -> &KFold {
        &self.kfold
    }

    pub fn evaluate(&self, spec: &ClassifierSpec, data: &TrainingSet) -> Result<CrossValResult> {
        let folds = self.kfold.split(data.n_rows())?;
        let mut scores = Vec::with_capacity(folds.len());

        for (fold, (train_idx, test_idx)) in folds.iter().enumerate() {
            let train = data.select_rows(train_idx);
            let test = data.select_rows(test_idx);
            log::trace!(
                "{} fold {}: {} training rows, {} test rows",
                spec.name,
                fold,
                train.n_rows(),
                test.n_rows()
            );

            let model = spec.fit(&train)?;
            let predicted = model.predict(&test.x)?;
            let score = accuracy(&predicted, &test.y);
            log::trace!("{} fold {} accuracy {:.4}", spec.name, fold, score);
            scores.push(score);
        }

        let result = CrossValResult::from_folds(spec.name.clone(), scores);
        log::debug!(
            "{} cross-validation: mean {:.4}, std {:.4}",
            spec.name,
            result.mean_accuracy,
            result.std_accuracy
        );
        Ok(result)
    }
}
