//! Directory conventions for locating raster layers and point files.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HabitatError, Result};
use crate::orchestrator::ScenarioCatalog;
use crate::stack::{LayerCategory, LayerRef, Scenario, ScenarioLayers};

/// Relative directories of every input category, resolved against a root.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DataLayout {
    /// Holds one sub-directory of point files per species.
    pub inputs: PathBuf,
    pub climate_present: PathBuf,
    /// Future scenarios as `(scenario name, climate directory)`, in run order.
    pub climate_future: Vec<(String, PathBuf)>,
    pub cover: PathBuf,
    pub elevation: PathBuf,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self {
            inputs: PathBuf::from("inputs"),
            climate_present: PathBuf::from("data/chelsa/climatology/resample"),
            climate_future: vec![
                (
                    "future1".to_string(),
                    PathBuf::from("data/chelsa/cmip5/2041-2060/average"),
                ),
                (
                    "future2".to_string(),
                    PathBuf::from("data/chelsa/cmip5/2061-2080/average"),
                ),
            ],
            cover: PathBuf::from("data/cover/resample"),
            elevation: PathBuf::from("data/elevation/resample"),
        }
    }
}

/// Resolves [`DataLayout`] directories below a root into layer references.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
    layout: DataLayout,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>, layout: DataLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Sorted `*.tif` layers of one directory; a missing directory yields none.
    pub fn list_layers(&self, category: LayerCategory, dir: &Path) -> Result<Vec<LayerRef>> {
        let dir = self.root.join(dir);
        if !dir.is_dir() {
            log::warn!("{} directory {} does not exist", category, dir.display());
            return Ok(Vec::new());
        }
        let files = sorted_files_with_extension(&dir, &["tif", "tiff"])?;
        Ok(files
            .into_iter()
            .map(|path| LayerRef::from_path(category, path))
            .collect())
    }

    /// Layers of the named scenario: `present` or one of the future names.
    pub fn scenario_layers(&self, scenario: &Scenario) -> Result<ScenarioLayers> {
        let climate_dir = if scenario.is_present() {
            self.layout.climate_present.clone()
        } else {
            self.layout
                .climate_future
                .iter()
                .find(|(name, _)| name == scenario.name())
                .map(|(_, dir)| dir.clone())
                .ok_or_else(|| {
                    HabitatError::configuration(format!(
                        "no climate directory configured for scenario '{}'",
                        scenario
                    ))
                })?
        };

        Ok(ScenarioLayers {
            climate: self.list_layers(LayerCategory::Climate, &climate_dir)?,
            cover: self.list_layers(LayerCategory::Cover, &self.layout.cover)?,
            elevation: self.list_layers(LayerCategory::Elevation, &self.layout.elevation)?,
        })
    }

    /// The present scenario plus, when `include_future`, every future scenario.
    pub fn catalog(&self, include_future: bool) -> Result<ScenarioCatalog> {
        let present = self.scenario_layers(&Scenario::present())?;
        let mut futures = Vec::new();
        if include_future {
            for (name, _) in &self.layout.climate_future {
                let scenario = Scenario::new(name.clone());
                let layers = self.scenario_layers(&scenario)?;
                futures.push((scenario, layers));
            }
        }
        Ok(ScenarioCatalog { present, futures })
    }

    /// First point file (sorted) of a species' input directory.
    pub fn species_points_file(&self, species: &str) -> Result<PathBuf> {
        let dir = self.root.join(&self.layout.inputs).join(species);
        if !dir.is_dir() {
            return Err(HabitatError::configuration(format!(
                "input directory {} for species '{}' does not exist",
                dir.display(),
                species
            )));
        }
        sorted_files_with_extension(&dir, &["csv"])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                HabitatError::configuration(format!(
                    "no point file found in {}",
                    dir.display()
                ))
            })
    }

    /// Species names: the sub-directories of the inputs directory, sorted.
    pub fn species(&self) -> Result<Vec<String>> {
        let dir = self.root.join(&self.layout.inputs);
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn sorted_files_with_extension(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| {
                extensions.iter().any(|ext| e.eq_ignore_ascii_case(ext))
            });
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
