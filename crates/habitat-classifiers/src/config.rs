use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::inference::DEFAULT_SENTINEL;

/// Number of candidate features examined at each tree split.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Fraction(f64),
}

impl MaxFeatures {
    /// Resolve to a concrete count for `n_features` columns (at least one).
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::Sqrt => n.sqrt().floor(),
            MaxFeatures::Log2 => n.log2().floor(),
            MaxFeatures::All => n,
            MaxFeatures::Fraction(f) => (n * f).floor(),
        };
        (k as usize).clamp(1, n_features.max(1))
    }
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    RandomForest {
        n_estimators: usize,
        max_depth: usize,
        min_samples_split: usize,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
    },
    ExtraTrees {
        n_estimators: usize,
        max_depth: usize,
        min_samples_split: usize,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
    },
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        learning_rate: f32,
        min_leaf_size: usize,
        training_optimization_level: u8,
        loss_type: String,
    },
    LogisticRegression {
        c: f64,
        l1_ratio: f64,
        max_iter: usize,
        tol: f64,
    },
    MLP {
        hidden_units: usize,
        alpha: f64,
        learning_rate: f64,
        max_iter: usize,
        batch_size: usize,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::RandomForest {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 4,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

impl ModelType {
    /// Short family name used in logs.
    pub fn family(&self) -> &'static str {
        match self {
            ModelType::RandomForest { .. } => "random forest",
            ModelType::ExtraTrees { .. } => "extra trees",
            ModelType::GBDT { .. } => "gradient boosted trees",
            ModelType::LogisticRegression { .. } => "logistic regression",
            ModelType::MLP { .. } => "multi-layer perceptron",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rf" | "random_forest" => Ok(ModelType::default()),
            "et" | "extra_trees" => Ok(ModelType::ExtraTrees {
                n_estimators: 100,
                max_depth: 10,
                min_samples_split: 5,
                min_samples_leaf: 4,
                max_features: MaxFeatures::Sqrt,
            }),
            "xgb" | "gbdt" => Ok(ModelType::GBDT {
                max_depth: 6,
                num_boost_round: 100,
                learning_rate: 0.3,
                min_leaf_size: 1,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            }),
            "lgbm" => Ok(ModelType::GBDT {
                max_depth: 8,
                num_boost_round: 100,
                learning_rate: 0.1,
                min_leaf_size: 20,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            }),
            "logreg" | "logistic" => Ok(ModelType::LogisticRegression {
                c: 1.0,
                l1_ratio: 0.5,
                max_iter: 1000,
                tol: 1e-4,
            }),
            "mlp" => Ok(ModelType::MLP {
                hidden_units: 100,
                alpha: 0.1,
                learning_rate: 1e-3,
                max_iter: 500,
                batch_size: 200,
            }),
            _ => Err(format!(
                "Unknown model type: {}. Expected one of rf, et, xgb, lgbm, logreg, mlp, gbdt",
                s
            )),
        }
    }
}

/// A named, immutable classifier configuration.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ClassifierSpec {
    pub name: String,

    #[serde(flatten)]
    pub model_type: ModelType,

    /// Seed for every stochastic component of the model.
    pub seed: u64,
}

impl ClassifierSpec {
    pub fn new(name: impl Into<String>, model_type: ModelType, seed: u64) -> Self {
        Self {
            name: name.into(),
            model_type,
            seed,
        }
    }

    /// Spec named after its short model name, e.g. `"rf"`.
    pub fn from_short_name(name: &str, seed: u64) -> Result<Self, String> {
        Ok(Self::new(name, name.parse::<ModelType>()?, seed))
    }
}

/// Knobs for a pipeline run that are independent of where the data lives.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of `<species>/<scenario>/<classifier>-images/`.
    pub output_dir: PathBuf,
    /// Cross-validation fold count.
    pub folds: usize,
    /// Shuffle rows before splitting folds (seeded by `seed`).
    pub shuffle_folds: bool,
    pub seed: u64,
    /// Stand-in value for missing features during full-grid inference.
    pub sentinel: f32,
    /// Cover layers whose file stem ends with this suffix are dropped.
    pub excluded_cover_suffix: Option<String>,
    /// Also project onto the future-climate scenarios.
    pub include_future: bool,
    /// Run the classifiers of a species concurrently.
    pub parallel: bool,
    /// Rows per inference batch.
    pub inference_chunk_rows: usize,
    /// Require future climate layer names to match the present ones.
    pub strict_climate_names: bool,
    /// Subset of registry names to run; `None` runs all.
    pub classifiers: Option<Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            folds: 5,
            shuffle_folds: false,
            seed: 42,
            sentinel: DEFAULT_SENTINEL,
            excluded_cover_suffix: Some("_12".to_string()),
            include_future: true,
            parallel: false,
            inference_chunk_rows: 65_536,
            strict_climate_names: false,
            classifiers: None,
        }
    }
}
