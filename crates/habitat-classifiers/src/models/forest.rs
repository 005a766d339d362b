//! Random forest and extremely randomized trees.
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::{ClassifierSpec, MaxFeatures, ModelType};
use crate::error::{HabitatError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::tree::{DecisionTree, SplitStrategy, TreeParams};

/// Bagged ensemble of CART trees.
///
/// Random forests draw a bootstrap sample per tree and search the best
/// threshold; extra trees use every row and a random threshold per feature.
pub struct ForestClassifier {
    name: String,
    n_estimators: usize,
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: MaxFeatures,
    bootstrap: bool,
    split: SplitStrategy,
    seed: u64,
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl ForestClassifier {
    pub fn new(spec: &ClassifierSpec) -> Self {
        let (n_estimators, max_depth, min_samples_split, min_samples_leaf, max_features, bootstrap, split) =
            match &spec.model_type {
                ModelType::ExtraTrees {
                    n_estimators,
                    max_depth,
                    min_samples_split,
                    min_samples_leaf,
                    max_features,
                } => (
                    *n_estimators,
                    *max_depth,
                    *min_samples_split,
                    *min_samples_leaf,
                    *max_features,
                    false,
                    SplitStrategy::Random,
                ),
                ModelType::RandomForest {
                    n_estimators,
                    max_depth,
                    min_samples_split,
                    min_samples_leaf,
                    max_features,
                } => (
                    *n_estimators,
                    *max_depth,
                    *min_samples_split,
                    *min_samples_leaf,
                    *max_features,
                    true,
                    SplitStrategy::Best,
                ),
                other => {
                    log::warn!(
                        "Forest classifier '{}' built from {} parameters; using random forest defaults",
                        spec.name,
                        other.family()
                    );
                    (100, 10, 5, 4, MaxFeatures::Sqrt, true, SplitStrategy::Best)
                }
            };

        ForestClassifier {
            name: spec.name.clone(),
            n_estimators,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features,
            bootstrap,
            split,
            seed: spec.seed,
            trees: Vec::new(),
            n_classes: 0,
        }
    }

    /// Seed of tree `t`, independent of which thread builds it.
    fn tree_seed(&self, t: usize) -> u64 {
        self.seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(t as u64)
    }
}

impl ClassifierModel for ForestClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<()> {
        let n_rows = x.nrows();
        if n_rows == 0 || n_rows != y.len() {
            return Err(HabitatError::model_fit(
                &self.name,
                format!("{} rows and {} labels", n_rows, y.len()),
            ));
        }
        if self.n_estimators == 0 {
            return Err(HabitatError::model_fit(&self.name, "n_estimators must be positive"));
        }

        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(x.ncols()),
            split: self.split,
        };
        log::debug!(
            "Fitting {} trees ({} candidate features per split) on {} rows",
            self.n_estimators,
            params.max_features,
            n_rows
        );

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.tree_seed(t));
                let samples: Vec<usize> = if self.bootstrap {
                    (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                DecisionTree::fit(x, y, samples, n_classes, &params, &mut rng)
            })
            .collect();

        self.trees = trees;
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if self.trees.is_empty() {
            return Err(HabitatError::model_fit(&self.name, "model has not been fitted"));
        }
        let mut proba = Array2::<f32>::zeros((x.nrows(), self.n_classes));
        let weight = 1.0 / self.trees.len() as f32;
        for (row, mut out) in x.rows().into_iter().zip(proba.rows_mut()) {
            for tree in &self.trees {
                for (o, &p) in out.iter_mut().zip(tree.predict_row(row.view())) {
                    *o += p * weight;
                }
            }
        }
        Ok(proba)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
