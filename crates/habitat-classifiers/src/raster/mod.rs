//! Georeferenced raster primitives: affine transform, CRS, grids and layers.
pub mod crs;
pub mod geotransform;
pub mod layer;

pub use crs::Crs;
pub use geotransform::GeoTransform;
pub use layer::{GridSpec, RasterLayer};
