use std::fmt;

use ndarray::Array2;

use crate::config::{ClassifierSpec, ModelType};
use crate::error::{HabitatError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::LabelEncoder;
use crate::training::TrainingSet;

/// Build a boxed, unfitted classifier model from a `ClassifierSpec`.
pub fn build_model(spec: &ClassifierSpec) -> Box<dyn ClassifierModel> {
    match spec.model_type {
        ModelType::RandomForest { .. } | ModelType::ExtraTrees { .. } => {
            Box::new(crate::models::forest::ForestClassifier::new(spec))
        }

        ModelType::GBDT { .. } => Box::new(crate::models::gbdt::GBDTClassifier::new(spec)),

        ModelType::LogisticRegression { .. } => {
            Box::new(crate::models::logistic::LogisticRegressionClassifier::new(spec))
        }

        ModelType::MLP { .. } => Box::new(crate::models::mlp::MLPClassifier::new(spec)),
    }
}

impl ClassifierSpec {
    /// Fit a fresh model on a cleaned training set.
    pub fn fit(&self, data: &TrainingSet) -> Result<TrainedModel> {
        if data.is_empty() {
            return Err(HabitatError::InsufficientData(format!(
                "no training rows for '{}'",
                self.name
            )));
        }
        if data.has_missing() {
            return Err(HabitatError::model_fit(
                &self.name,
                "training data contains missing values",
            ));
        }

        let encoder = LabelEncoder::fit(&data.y);
        if encoder.n_classes() < 2 {
            return Err(HabitatError::model_fit(
                &self.name,
                format!(
                    "training labels contain {} class(es), at least two are required",
                    encoder.n_classes()
                ),
            ));
        }

        let y = encoder.encode(&data.y);
        let mut model = build_model(self);
        model.fit(&data.x, &y, encoder.n_classes())?;

        Ok(TrainedModel {
            name: self.name.clone(),
            classes: encoder.classes().to_vec(),
            model,
        })
    }
}

/// A fitted classifier together with the class labels of its outputs.
pub struct TrainedModel {
    name: String,
    classes: Vec<i64>,
    model: Box<dyn ClassifierModel>,
}

impl fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainedModel")
            .field("name", &self.name)
            .field("classes", &self.classes)
            .finish()
    }
}

impl TrainedModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class labels in probability column order (ascending).
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        self.model.predict_proba(x)
    }

    /// Predicted class labels.
    pub fn predict(&self, x: &Array2<f32>) -> Result<Vec<i64>> {
        Ok(self
            .model
            .predict(x)?
            .into_iter()
            .map(|idx| self.classes[idx])
            .collect())
    }
}

/// Immutable, ordered catalogue of named classifier configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierRegistry {
    specs: Vec<ClassifierSpec>,
}

impl ClassifierRegistry {
    /// Registry names in their run order.
    pub const STANDARD_NAMES: [&'static str; 6] = ["rf", "et", "xgb", "lgbm", "logreg", "mlp"];

    pub fn new(specs: Vec<ClassifierSpec>) -> Result<Self> {
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.name == spec.name) {
                return Err(HabitatError::configuration(format!(
                    "duplicate classifier name '{}'",
                    spec.name
                )));
            }
        }
        Ok(Self { specs })
    }

    /// The pinned catalogue; every stochastic model is seeded with `seed`.
    pub fn standard(seed: u64) -> Self {
        let specs = Self::STANDARD_NAMES
            .iter()
            .filter_map(|name| ClassifierSpec::from_short_name(name, seed).ok())
            .collect();
        Self { specs }
    }

    pub fn get(&self, name: &str) -> Option<&ClassifierSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifierSpec> {
        self.specs.iter()
    }

    pub fn specs(&self) -> &[ClassifierSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Sub-registry with the named entries, in registry order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<ClassifierRegistry> {
        for name in names {
            if self.get(name.as_ref()).is_none() {
                return Err(HabitatError::configuration(format!(
                    "unknown classifier '{}', expected one of {:?}",
                    name.as_ref(),
                    self.names()
                )));
            }
        }
        let specs = self
            .specs
            .iter()
            .filter(|s| names.iter().any(|n| n.as_ref() == s.name))
            .cloned()
            .collect();
        Ok(ClassifierRegistry { specs })
    }
}
