//! Assembly of ordered, aligned feature stacks from categorised raster layers.
//!
//! A [`FeatureStack`] is the multi-band feature source of one scenario. Its
//! layer order is the feature column order seen by every classifier, so it is
//! fixed here (climate, then cover, then elevation) and compared across
//! scenarios through [`FeatureSchema`].
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HabitatError, Result};
use crate::io::RasterSource;
use crate::raster::{GridSpec, RasterLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerCategory {
    Climate,
    Cover,
    Elevation,
}

impl LayerCategory {
    /// Concatenation order of the categories in a stack.
    pub const ORDER: [LayerCategory; 3] = [
        LayerCategory::Climate,
        LayerCategory::Cover,
        LayerCategory::Elevation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerCategory::Climate => "climate",
            LayerCategory::Cover => "cover",
            LayerCategory::Elevation => "elevation",
        }
    }
}

impl fmt::Display for LayerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named climate configuration: `present`, `future1`, `future2`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scenario(String);

impl Scenario {
    pub const PRESENT: &'static str = "present";

    pub fn new(name: impl Into<String>) -> Self {
        Scenario(name.into())
    }

    pub fn present() -> Self {
        Scenario(Self::PRESENT.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_present(&self) -> bool {
        self.0 == Self::PRESENT
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to one raster file belonging to a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRef {
    pub category: LayerCategory,
    /// File stem; used as feature name and schema key.
    pub name: String,
    pub path: PathBuf,
}

impl LayerRef {
    pub fn new(category: LayerCategory, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            category,
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn from_path(category: LayerCategory, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(category, name, path)
    }
}

/// Per-category layer references resolved for one scenario.
#[derive(Debug, Clone, Default)]
pub struct ScenarioLayers {
    pub climate: Vec<LayerRef>,
    pub cover: Vec<LayerRef>,
    pub elevation: Vec<LayerRef>,
}

impl ScenarioLayers {
    pub fn category(&self, category: LayerCategory) -> &[LayerRef] {
        match category {
            LayerCategory::Climate => &self.climate,
            LayerCategory::Cover => &self.cover,
            LayerCategory::Elevation => &self.elevation,
        }
    }

    /// Same cover and elevation layers with a different climate set.
    pub fn with_climate(&self, climate: Vec<LayerRef>) -> Self {
        Self {
            climate,
            cover: self.cover.clone(),
            elevation: self.elevation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub category: LayerCategory,
    pub key: String,
}

/// Ordered description of the feature columns produced by a stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSchema {
    entries: Vec<SchemaEntry>,
}

impl FeatureSchema {
    pub fn new(entries: Vec<SchemaEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that a stack built from `other` can be fed to a model trained on
    /// `self`. Scenario directories name their climate files differently, so
    /// climate keys are compared by their bioclimatic index (`bio12` in
    /// `CHELSA_bio12_2050`) unless `strict_climate` asks for the full key.
    /// Climate keys without an index are matched by position only.
    pub fn check_compatible(
        &self,
        other: &FeatureSchema,
        scenario: &Scenario,
        strict_climate: bool,
    ) -> Result<()> {
        let mismatch = |detail: String| HabitatError::SchemaMismatch {
            scenario: scenario.name().to_string(),
            detail,
        };

        if self.len() != other.len() {
            return Err(mismatch(format!(
                "{} feature layers, expected {}",
                other.len(),
                self.len()
            )));
        }

        for (idx, (expected, found)) in self.entries.iter().zip(other.entries.iter()).enumerate() {
            if expected.category != found.category {
                return Err(mismatch(format!(
                    "column {} is a {} layer, expected {}",
                    idx, found.category, expected.category
                )));
            }
            let matches = if expected.category != LayerCategory::Climate || strict_climate {
                expected.key == found.key
            } else {
                match (bioclim_index(&expected.key), bioclim_index(&found.key)) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
            };
            if !matches {
                return Err(mismatch(format!(
                    "column {} is '{}', expected '{}'",
                    idx, found.key, expected.key
                )));
            }
        }
        Ok(())
    }
}

/// Number following the first `bio` token of a layer key, case-insensitive.
fn bioclim_index(key: &str) -> Option<u32> {
    let lower = key.to_ascii_lowercase();
    lower.match_indices("bio").find_map(|(pos, _)| {
        let digits: String = lower[pos + 3..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    })
}

/// Ordered, aligned layers forming the feature source of one scenario.
#[derive(Debug, Clone)]
pub struct FeatureStack {
    scenario: Scenario,
    categories: Vec<LayerCategory>,
    layers: Vec<RasterLayer>,
    grid: GridSpec,
}

impl FeatureStack {
    /// Build a stack, validating that every layer shares the first layer's grid.
    pub fn from_layers(scenario: Scenario, layers: Vec<(LayerCategory, RasterLayer)>) -> Result<Self> {
        let Some((_, first)) = layers.first() else {
            return Err(HabitatError::configuration(format!(
                "scenario '{}' has no raster layers",
                scenario
            )));
        };
        let grid = first.grid().clone();

        for (_, layer) in layers.iter().skip(1) {
            if let Some(reason) = grid.misalignment(layer.grid()) {
                return Err(HabitatError::configuration(format!(
                    "layer '{}' in scenario '{}' is misaligned with '{}': {}",
                    layer.name(),
                    scenario,
                    first.name(),
                    reason
                )));
            }
        }

        let (categories, layers) = layers.into_iter().unzip();
        Ok(Self {
            scenario,
            categories,
            layers,
            grid,
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn layers(&self) -> &[RasterLayer] {
        &self.layers
    }

    pub fn n_features(&self) -> usize {
        self.layers.len()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name().to_string()).collect()
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(
            self.categories
                .iter()
                .zip(self.layers.iter())
                .map(|(&category, layer)| SchemaEntry {
                    category,
                    key: layer.name().to_string(),
                })
                .collect(),
        )
    }

    /// Reject a sentinel that could be confused with a real feature value.
    pub fn validate_sentinel(&self, sentinel: f32) -> Result<()> {
        if !sentinel.is_finite() {
            return Err(HabitatError::configuration(format!(
                "inference sentinel must be finite, got {}",
                sentinel
            )));
        }
        for layer in &self.layers {
            if let Some((lo, hi)) = layer.value_range() {
                if sentinel >= lo && sentinel <= hi {
                    return Err(HabitatError::configuration(format!(
                        "sentinel {} lies within the value range [{}, {}] of layer '{}'",
                        sentinel,
                        lo,
                        hi,
                        layer.name()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Options controlling layer selection during assembly.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub excluded_cover_suffix: Option<String>,
    /// When set, the sentinel is checked against every layer's value range.
    pub sentinel: Option<f32>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            excluded_cover_suffix: Some("_12".to_string()),
            sentinel: None,
        }
    }
}

/// Turns categorised layer references into a validated [`FeatureStack`].
pub struct RasterStackAssembler<'a> {
    source: &'a dyn RasterSource,
    options: AssemblerOptions,
}

impl<'a> RasterStackAssembler<'a> {
    pub fn new(source: &'a dyn RasterSource, options: AssemblerOptions) -> Self {
        Self { source, options }
    }

    /// Ordered layer references after the cover exclusion rule.
    pub fn select_layers(&self, scenario: &Scenario, layers: &ScenarioLayers) -> Result<Vec<LayerRef>> {
        if layers.climate.is_empty() {
            return Err(HabitatError::configuration(format!(
                "scenario '{}' has no climate layers",
                scenario
            )));
        }

        let mut selected = Vec::new();
        for category in LayerCategory::ORDER {
            let refs = layers.category(category);
            if refs.is_empty() {
                log::warn!("Scenario '{}' has no {} layers", scenario, category);
            }
            for layer in refs {
                if category == LayerCategory::Cover && self.is_excluded_cover(layer) {
                    log::debug!("Excluding cover layer '{}'", layer.name);
                    continue;
                }
                selected.push(layer.clone());
            }
        }
        Ok(selected)
    }

    fn is_excluded_cover(&self, layer: &LayerRef) -> bool {
        self.options
            .excluded_cover_suffix
            .as_deref()
            .map_or(false, |suffix| layer.name.ends_with(suffix))
    }

    pub fn assemble(&self, scenario: Scenario, layers: &ScenarioLayers) -> Result<FeatureStack> {
        let selected = self.select_layers(&scenario, layers)?;

        let mut loaded = Vec::with_capacity(selected.len());
        for layer_ref in &selected {
            let layer = self.source.read_layer(layer_ref)?;
            log::trace!(
                "Loaded {} layer '{}' ({}x{})",
                layer_ref.category,
                layer.name(),
                layer.grid().rows,
                layer.grid().cols
            );
            loaded.push((layer_ref.category, layer));
        }

        let stack = FeatureStack::from_layers(scenario, loaded)?;
        if let Some(sentinel) = self.options.sentinel {
            stack.validate_sentinel(sentinel)?;
        }

        log::info!(
            "Assembled '{}' feature stack: {} layers on a {}x{} grid",
            stack.scenario(),
            stack.n_features(),
            stack.grid().rows,
            stack.grid().cols
        );
        Ok(stack)
    }
}
