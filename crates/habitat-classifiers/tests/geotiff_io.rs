mod common;

use std::fs;
use std::path::Path;

use habitat_classifiers::config::PipelineConfig;
use habitat_classifiers::io::{
    read_geotiff, read_points_csv, write_geotiff, DataLayout, DirectoryCatalog, GeoTiffSink,
    GeoTiffSource,
};
use habitat_classifiers::models::factory::ClassifierRegistry;
use habitat_classifiers::orchestrator::{ScenarioOrchestrator, SpeciesInput};
use habitat_classifiers::raster::RasterLayer;
use habitat_classifiers::stack::{LayerCategory, Scenario};

use common::*;

fn write_layer(dir: &Path, file: &str, layer: &RasterLayer) {
    fs::create_dir_all(dir).unwrap();
    write_geotiff(dir.join(file), layer).unwrap();
}

#[test]
fn geotiff_round_trip_keeps_values_and_georeferencing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("landcover.tif");
    let original = RasterLayer::from_vec(
        "ignored",
        grid(),
        Some(f64::NAN),
        (0..ROWS * COLS)
            .map(|i| if i % 17 == 0 { f32::NAN } else { i as f32 * 0.5 })
            .collect(),
    )
    .unwrap();
    write_geotiff(&path, &original).unwrap();

    let read = read_geotiff(&path).unwrap();
    assert_eq!(read.name(), "landcover");
    assert_eq!(read.grid().shape(), (ROWS, COLS));
    assert!(read.grid().transform.is_aligned_with(&grid().transform));
    assert_eq!(read.grid().crs.as_ref().and_then(|c| c.epsg()), Some(32633));
    assert!(read.nodata().unwrap().is_nan());
    for (a, b) in original.data().iter().zip(read.data().iter()) {
        assert!((a.is_nan() && b.is_nan()) || a == b);
    }
}

#[test]
fn explicit_nodata_is_read_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dem.tif");
    let mut values = vec![10.0f32; ROWS * COLS];
    values[3] = -32768.0;
    let layer = RasterLayer::from_vec("dem", grid(), Some(-32768.0), values).unwrap();
    write_geotiff(&path, &layer).unwrap();

    let read = read_geotiff(&path).unwrap();
    assert_eq!(read.nodata(), Some(-32768.0));
    assert!(read.value(0, 3).is_nan());
    assert_eq!(read.value(0, 4), 10.0);
    assert_eq!(read.value_range(), Some((10.0, 10.0)));
}

#[test]
fn catalog_lists_sorted_layers_and_species() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let layout = DataLayout::default();

    let present = root.join(&layout.climate_present);
    write_layer(&present, "bio12.tif", &layer("bio12", climate(0.0)));
    write_layer(&present, "bio1.tif", &layer("bio1", climate(0.0)));
    fs::write(present.join("notes.txt"), "not a raster").unwrap();
    fs::create_dir_all(root.join("inputs/wolf")).unwrap();
    fs::create_dir_all(root.join("inputs/lynx")).unwrap();
    fs::write(root.join("inputs/lynx/b.csv"), "x,y,CLASS\n").unwrap();
    fs::write(root.join("inputs/lynx/a.csv"), "x,y,CLASS\n").unwrap();

    let catalog = DirectoryCatalog::new(root, layout);
    let layers = catalog.scenario_layers(&Scenario::present()).unwrap();
    let names: Vec<&str> = layers.climate.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["bio1", "bio12"]);
    assert!(layers.cover.is_empty());
    assert_eq!(layers.climate[0].category, LayerCategory::Climate);

    assert_eq!(catalog.species().unwrap(), vec!["lynx", "wolf"]);
    assert!(catalog
        .species_points_file("lynx")
        .unwrap()
        .ends_with("inputs/lynx/a.csv"));
    assert!(catalog.species_points_file("wolf").is_err());
    assert!(catalog.scenario_layers(&Scenario::new("future9")).is_err());
}

#[test]
fn directory_layout_end_to_end() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let layout = DataLayout::default();

    write_layer(&root.join(&layout.climate_present), "bio1.tif", &layer("bio1", climate(0.0)));
    write_layer(&root.join(&layout.climate_future[0].1), "bio1.tif", &layer("bio1", climate(4.0)));
    write_layer(&root.join(&layout.climate_future[1].1), "bio1.tif", &layer("bio1", climate(8.0)));
    write_layer(&root.join(&layout.cover), "landcover.tif", &layer("landcover", cover));
    // Excluded by its `_12` suffix; its misaligned shape would fail assembly.
    let odd = habitat_classifiers::raster::GridSpec::new(3, 3, grid().transform, grid().crs);
    write_layer(
        &root.join(&layout.cover),
        "landcover_12.tif",
        &RasterLayer::from_vec("landcover_12", odd, None, vec![1.0; 9]).unwrap(),
    );
    write_layer(&root.join(&layout.elevation), "dem.tif", &layer("dem", elevation));

    let points_dir = root.join(&layout.inputs).join("lynx");
    fs::create_dir_all(&points_dir).unwrap();
    let mut csv = String::from("x,y,CLASS\n");
    for p in points() {
        csv.push_str(&format!("{},{},{}\n", p.x, p.y, p.label));
    }
    fs::write(points_dir.join("lynx.csv"), csv).unwrap();

    let catalog = DirectoryCatalog::new(root, layout);
    let scenarios = catalog.catalog(true).unwrap();
    assert_eq!(scenarios.futures.len(), 2);

    let observations = read_points_csv(catalog.species_points_file("lynx").unwrap()).unwrap();
    assert_eq!(observations, points());

    let output_dir = root.join("outputs");
    let config = PipelineConfig {
        output_dir: output_dir.clone(),
        classifiers: Some(vec!["rf".to_string()]),
        ..Default::default()
    };
    let registry = ClassifierRegistry::standard(42);
    let report = ScenarioOrchestrator::new(&registry, &GeoTiffSource, &GeoTiffSink, &config)
        .run_species(&SpeciesInput::new("lynx", observations), &scenarios)
        .unwrap();
    assert!(report.is_success(), "{}", report);

    for scenario in ["present", "future1", "future2"] {
        let images = output_dir.join("lynx").join(scenario).join("rf-images");
        for file in ["responses.tif", "probability_0.tif", "probability_1.tif", "certainty.tif"] {
            assert!(images.join(file).is_file(), "{}", images.join(file).display());
        }
        let responses = read_geotiff(images.join("responses.tif")).unwrap();
        assert_eq!(responses.data().iter().filter(|v| v.is_nan()).count(), MISSING.len());
        assert_eq!(responses.data().iter().filter(|v| !v.is_nan()).count(), 95);
    }
    let metrics =
        fs::read_to_string(output_dir.join("lynx/present/rf-images/cross_validation_metrics.txt"))
            .unwrap();
    assert!(metrics.starts_with("rf 5-fold Cross Validation Accuracy: "));
    assert!(output_dir.join("lynx/cross_validation_summary.txt").is_file());
}
