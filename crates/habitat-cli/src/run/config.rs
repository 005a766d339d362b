use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use habitat_classifiers::config::{ClassifierSpec, PipelineConfig};
use habitat_classifiers::io::{DataLayout, PointReaderConfig};
use habitat_classifiers::models::factory::ClassifierRegistry;

use crate::util::split_names;

/// Column names of the species point files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointColumns {
    pub x: String,
    pub y: String,
    pub label: String,
    pub delimiter: char,
}

impl Default for PointColumns {
    fn default() -> Self {
        let reader = PointReaderConfig::default();
        Self {
            x: reader.x_column,
            y: reader.y_column,
            label: reader.label_column,
            delimiter: char::from(reader.delimiter),
        }
    }
}

impl PointColumns {
    pub fn reader_config(&self) -> Result<PointReaderConfig> {
        let delimiter = u8::try_from(self.delimiter)
            .with_context(|| format!("Delimiter {:?} is not a single byte", self.delimiter))?;
        Ok(PointReaderConfig {
            x_column: self.x.clone(),
            y_column: self.y.clone(),
            label_column: self.label.clone(),
            delimiter,
        })
    }
}

/// Everything a `habitat run` invocation needs, loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory the layout paths are resolved against.
    pub data_root: PathBuf,
    pub layout: DataLayout,
    pub points: PointColumns,
    /// Species to process; all sub-directories of the inputs directory when unset.
    pub species: Option<Vec<String>>,
    pub pipeline: PipelineConfig,
    /// Replaces the standard classifier catalogue when set.
    pub registry: Option<Vec<ClassifierSpec>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            data_root: PathBuf::from("."),
            layout: DataLayout::default(),
            points: PointColumns::default(),
            species: None,
            pipeline: PipelineConfig::default(),
            registry: None,
        }
    }
}

impl RunConfig {
    pub fn from_arguments(config_path: &Path, matches: &ArgMatches) -> Result<Self> {
        let mut config = load_run_config(config_path)?;

        // Apply CLI overrides
        if let Some(data_root) = matches.get_one::<PathBuf>("data_root") {
            config.data_root = data_root.clone();
        }

        if let Some(output_dir) = matches.get_one::<PathBuf>("output_dir") {
            config.pipeline.output_dir = output_dir.clone();
        }

        if let Some(species) = matches.get_one::<String>("species") {
            config.species = Some(split_names(species));
        }

        if let Some(classifiers) = matches.get_one::<String>("classifiers") {
            config.pipeline.classifiers = Some(split_names(classifiers));
        }

        if let Some(folds) = matches.get_one::<usize>("folds") {
            config.pipeline.folds = *folds;
        }

        if matches.get_flag("present_only") {
            config.pipeline.include_future = false;
        }

        if matches.get_flag("parallel") {
            config.pipeline.parallel = true;
        }

        Ok(config)
    }

    /// The configured catalogue, or the standard one seeded from the pipeline seed.
    pub fn registry(&self) -> Result<ClassifierRegistry> {
        match &self.registry {
            Some(specs) => Ok(ClassifierRegistry::new(specs.clone())?),
            None => Ok(ClassifierRegistry::standard(self.pipeline.seed)),
        }
    }
}

/// Load a run configuration from a JSON file; missing fields take their defaults.
pub fn load_run_config<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: RunConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}
