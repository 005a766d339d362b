use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;

use crate::config::{ClassifierSpec, ModelType};
use crate::error::{HabitatError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::normalize_rows;

/// Gradient Boosting Decision Tree (GBDT) classifier
///
/// The `gbdt` crate boosts binary log-likelihood models on `{-1, 1}` labels.
/// Two classes need one model; more classes are handled one-vs-rest and the
/// per-class scores are normalised into a distribution.
pub struct GBDTClassifier {
    name: String,
    params: ModelType,
    models: Vec<GBDT>,
    n_classes: usize,
}

const PROBA_EPS: f32 = 1e-7;

impl GBDTClassifier {
    pub fn new(spec: &ClassifierSpec) -> Self {
        GBDTClassifier {
            name: spec.name.clone(),
            params: spec.model_type.clone(),
            models: Vec::new(),
            n_classes: 0,
        }
    }

    fn config(&self, feature_size: usize) -> Result<Config> {
        match &self.params {
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                learning_rate,
                min_leaf_size,
                training_optimization_level,
                loss_type,
            } => {
                let mut config = Config::new();

                config.set_feature_size(feature_size);
                config.set_shrinkage(*learning_rate);
                config.set_max_depth(*max_depth);
                config.set_min_leaf_size(*min_leaf_size);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(false);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);
                Ok(config)
            }
            other => Err(HabitatError::model_fit(
                &self.name,
                format!("expected GBDT parameters, got {}", other.family()),
            )),
        }
    }

    fn to_data(x: &Array2<f32>, labels: Option<&[f32]>) -> DataVec {
        let mut data = DataVec::with_capacity(x.nrows());
        for (i, row) in x.rows().into_iter().enumerate() {
            let label = labels.map_or(0.0, |l| l[i]);
            data.push(Data::new_training_data(row.to_vec(), 1.0, label, None));
        }
        data
    }

    fn fit_binary(&self, config: &Config, x: &Array2<f32>, positive: &[bool]) -> GBDT {
        let labels: Vec<f32> = positive.iter().map(|&p| if p { 1.0 } else { -1.0 }).collect();
        let mut train_x = Self::to_data(x, Some(&labels));
        let mut gbdt = GBDT::new(config);
        gbdt.fit(&mut train_x);
        gbdt
    }
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<()> {
        if n_classes < 2 {
            return Err(HabitatError::model_fit(&self.name, "at least two classes are required"));
        }
        let config = self.config(x.ncols())?;

        let targets: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };
        let mut models = Vec::with_capacity(targets.len());
        for class in targets {
            let positive: Vec<bool> = y.iter().map(|&c| c == class).collect();
            log::trace!("Boosting class {} of {} ({})", class, n_classes, self.name);
            models.push(self.fit_binary(&config, x, &positive));
        }

        self.models = models;
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if self.models.is_empty() {
            return Err(HabitatError::model_fit(&self.name, "model has not been fitted"));
        }
        let test_x = Self::to_data(x, None);
        let mut proba = Array2::<f32>::zeros((x.nrows(), self.n_classes));

        if self.n_classes == 2 {
            let p1 = self.models[0].predict(&test_x);
            for (i, p) in p1.into_iter().enumerate() {
                let p = p.clamp(PROBA_EPS, 1.0 - PROBA_EPS);
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            }
        } else {
            for (class, model) in self.models.iter().enumerate() {
                for (i, p) in model.predict(&test_x).into_iter().enumerate() {
                    proba[[i, class]] = p.clamp(PROBA_EPS, 1.0);
                }
            }
            normalize_rows(&mut proba);
        }
        Ok(proba)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
