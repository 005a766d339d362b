//! In-memory raster source and output sink, used for tests and for callers
//! that already hold their rasters.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{HabitatError, Result};
use crate::io::{OutputSink, RasterSource};
use crate::raster::RasterLayer;
use crate::stack::LayerRef;

/// Layers keyed by the logical path of their [`LayerRef`].
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    layers: HashMap<PathBuf, RasterLayer>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, layer: RasterLayer) {
        self.layers.insert(path.into(), layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl RasterSource for MemorySource {
    fn read_layer(&self, layer: &LayerRef) -> Result<RasterLayer> {
        let stored = self.layers.get(&layer.path).ok_or_else(|| {
            HabitatError::configuration(format!(
                "raster layer '{}' not found at {}",
                layer.name,
                layer.path.display()
            ))
        })?;
        RasterLayer::new(
            layer.name.clone(),
            stored.grid().clone(),
            stored.nodata(),
            stored.data().clone(),
        )
    }
}

/// Collects written rasters and text files instead of persisting them.
#[derive(Debug, Default)]
pub struct MemorySink {
    rasters: Mutex<BTreeMap<PathBuf, RasterLayer>>,
    texts: Mutex<BTreeMap<PathBuf, String>>,
}

fn poisoned() -> HabitatError {
    HabitatError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "memory sink lock poisoned",
    ))
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raster(&self, path: impl AsRef<Path>) -> Option<RasterLayer> {
        self.rasters.lock().ok()?.get(path.as_ref()).cloned()
    }

    pub fn text(&self, path: impl AsRef<Path>) -> Option<String> {
        self.texts.lock().ok()?.get(path.as_ref()).cloned()
    }

    /// Paths of every raster written so far, sorted.
    pub fn raster_paths(&self) -> Vec<PathBuf> {
        self.rasters
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn text_paths(&self) -> Vec<PathBuf> {
        self.texts
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl OutputSink for MemorySink {
    fn write_raster(&self, path: &Path, layer: &RasterLayer) -> Result<()> {
        self.rasters
            .lock()
            .map_err(|_| poisoned())?
            .insert(path.to_path_buf(), layer.clone());
        Ok(())
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        self.texts
            .lock()
            .map_err(|_| poisoned())?
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}
