//! Narrow interfaces to the geospatial I/O layer, plus the concrete readers
//! and writers shipped with the crate.
pub mod catalog;
pub mod geotiff;
pub mod memory;
pub mod points;

use std::path::Path;

use crate::error::Result;
use crate::raster::RasterLayer;
use crate::stack::LayerRef;

pub use catalog::{DataLayout, DirectoryCatalog};
pub use geotiff::{read_geotiff, write_geotiff, GeoTiffSink, GeoTiffSource};
pub use memory::{MemorySink, MemorySource};
pub use points::{read_points_csv, read_points_csv_with_config, PointReaderConfig};

/// Resolves a layer reference into an in-memory raster band.
pub trait RasterSource: Sync {
    fn read_layer(&self, layer: &LayerRef) -> Result<RasterLayer>;
}

/// Persists pipeline outputs at logical paths.
///
/// Implementations create whatever parent containers the path needs.
pub trait OutputSink: Sync {
    fn write_raster(&self, path: &Path, layer: &RasterLayer) -> Result<()>;

    fn write_text(&self, path: &Path, contents: &str) -> Result<()>;
}
