#![allow(dead_code)]

use habitat_classifiers::io::MemorySource;
use habitat_classifiers::orchestrator::{ScenarioCatalog, SpeciesInput};
use habitat_classifiers::raster::{Crs, GeoTransform, GridSpec, RasterLayer};
use habitat_classifiers::stack::{LayerCategory, LayerRef, Scenario, ScenarioLayers};
use habitat_classifiers::training::PointObservation;

pub const ROWS: usize = 10;
pub const COLS: usize = 10;

/// Pixels with a missing cover value.
pub const MISSING: [(usize, usize); 5] = [(0, 9), (1, 0), (4, 5), (6, 2), (9, 0)];

pub fn grid() -> GridSpec {
    GridSpec::new(
        ROWS,
        COLS,
        GeoTransform::new(0.0, ROWS as f64, 1.0, -1.0),
        Some(Crs::from_epsg(32633)),
    )
}

pub fn layer(name: &str, f: impl Fn(usize, usize) -> f32) -> RasterLayer {
    let mut values = Vec::with_capacity(ROWS * COLS);
    for r in 0..ROWS {
        for c in 0..COLS {
            values.push(f(r, c));
        }
    }
    RasterLayer::from_vec(name, grid(), None, values).unwrap()
}

pub fn climate(offset: f32) -> impl Fn(usize, usize) -> f32 {
    move |r, c| (c * 10 + r) as f32 * 0.9 + offset
}

pub fn cover(r: usize, c: usize) -> f32 {
    if MISSING.contains(&(r, c)) {
        f32::NAN
    } else {
        100.0 - (c * 10 + r) as f32
    }
}

pub fn elevation(r: usize, c: usize) -> f32 {
    (r * 10 + c) as f32
}

/// Present climate `bio1`, futures `future1`/`future2` with shifted climate,
/// cover layers `landcover` plus the excluded `landcover_12` (absent from the
/// source), and elevation `dem`.
pub fn source_and_catalog() -> (MemorySource, ScenarioCatalog) {
    let mut source = MemorySource::new();
    source.insert("climate/present/bio1.tif", layer("bio1", climate(0.0)));
    source.insert("climate/future1/bio1_2050.tif", layer("bio1_2050", climate(5.0)));
    source.insert("climate/future2/bio1_2070.tif", layer("bio1_2070", climate(9.0)));
    source.insert("cover/landcover.tif", layer("landcover", cover));
    source.insert("elevation/dem.tif", layer("dem", elevation));

    let base = ScenarioLayers {
        climate: vec![LayerRef::from_path(LayerCategory::Climate, "climate/present/bio1.tif")],
        cover: vec![
            LayerRef::from_path(LayerCategory::Cover, "cover/landcover.tif"),
            LayerRef::from_path(LayerCategory::Cover, "cover/landcover_12.tif"),
        ],
        elevation: vec![LayerRef::from_path(LayerCategory::Elevation, "elevation/dem.tif")],
    };
    let future1 = base.with_climate(vec![LayerRef::from_path(
        LayerCategory::Climate,
        "climate/future1/bio1_2050.tif",
    )]);
    let future2 = base.with_climate(vec![LayerRef::from_path(
        LayerCategory::Climate,
        "climate/future2/bio1_2070.tif",
    )]);

    let catalog = ScenarioCatalog {
        present: base,
        futures: vec![
            (Scenario::new("future1"), future1),
            (Scenario::new("future2"), future2),
        ],
    };
    (source, catalog)
}

/// Pixel centre of `(row, col)`.
pub fn centre(row: usize, col: usize) -> (f64, f64) {
    (col as f64 + 0.5, ROWS as f64 - row as f64 - 0.5)
}

/// 20 points, alternating classes: class 0 in the west half, class 1 in the east.
pub fn points() -> Vec<PointObservation> {
    (0..20)
        .map(|i| {
            let class = (i % 2) as i64;
            let row = i / 2;
            let col = if class == 0 { row % 5 } else { 5 + row % 5 };
            let (x, y) = centre(row, col);
            PointObservation::new(x, y, class)
        })
        .collect()
}

pub fn species() -> SpeciesInput {
    SpeciesInput::new("lynx", points())
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
