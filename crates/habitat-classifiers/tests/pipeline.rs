mod common;

use std::path::{Path, PathBuf};

use habitat_classifiers::config::{ClassifierSpec, ModelType, PipelineConfig};
use habitat_classifiers::io::{MemorySink, MemorySource, OutputSink};
use habitat_classifiers::models::factory::ClassifierRegistry;
use habitat_classifiers::orchestrator::{ScenarioOrchestrator, SpeciesInput};
use habitat_classifiers::raster::RasterLayer;
use habitat_classifiers::report::Stage;
use habitat_classifiers::stack::{LayerCategory, LayerRef, Scenario};
use habitat_classifiers::HabitatError;

use common::*;

/// Pipeline settings writing below `out/`; an empty selection runs the whole registry.
fn config(classifiers: &[&str]) -> PipelineConfig {
    PipelineConfig {
        output_dir: PathBuf::from("out"),
        folds: 5,
        classifiers: if classifiers.is_empty() {
            None
        } else {
            Some(classifiers.iter().map(|s| s.to_string()).collect())
        },
        ..Default::default()
    }
}

fn raster(sink: &MemorySink, scenario: &str, classifier: &str, file: &str) -> RasterLayer {
    let path = PathBuf::from("out")
        .join("lynx")
        .join(scenario)
        .join(format!("{}-images", classifier))
        .join(file);
    sink.raster(&path)
        .unwrap_or_else(|| panic!("missing raster {}", path.display()))
}

fn same_values(a: &RasterLayer, b: &RasterLayer) -> bool {
    a.data()
        .iter()
        .zip(b.data().iter())
        .all(|(x, y)| x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan()))
}

#[test]
fn full_registry_end_to_end() {
    init_logging();
    let (source, catalog) = source_and_catalog();
    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = config(&[]);
    let orchestrator = ScenarioOrchestrator::new(&registry, &source, &sink, &config);

    let report = orchestrator.run_species(&species(), &catalog).unwrap();
    assert!(report.is_success(), "{}", report);
    assert_eq!(report.cross_validation.len(), 6);
    assert_eq!(report.imputations.len(), 6 * 3);

    for result in &report.cross_validation {
        assert_eq!(result.n_folds, 5);
        assert!((0.0..=1.0).contains(&result.mean_accuracy));
        assert!(result.std_accuracy >= 0.0);
    }

    let summary = sink
        .text("out/lynx/cross_validation_summary.txt")
        .unwrap();
    assert_eq!(summary.lines().count(), 6);
    assert!(summary.starts_with("rf 5-fold Cross Validation Accuracy: "));

    for name in ClassifierRegistry::STANDARD_NAMES {
        let metrics = sink
            .text(format!("out/lynx/present/{}-images/cross_validation_metrics.txt", name))
            .unwrap();
        assert!(metrics.starts_with(&format!("{} 5-fold", name)));

        for scenario in ["present", "future1", "future2"] {
            let responses = raster(&sink, scenario, name, "responses.tif");
            let missing = responses.data().iter().filter(|v| v.is_nan()).count();
            assert_eq!(missing, MISSING.len(), "{} {}", name, scenario);
            assert!(responses
                .data()
                .iter()
                .filter(|v| !v.is_nan())
                .all(|&v| v == 0.0 || v == 1.0));
            for &(r, c) in &MISSING {
                assert!(responses.data()[[r, c]].is_nan());
            }
        }
    }
}

#[test]
fn output_rasters_share_the_grid_and_probabilities_sum_to_one() {
    let (source, catalog) = source_and_catalog();
    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = config(&["rf", "logreg"]);
    let orchestrator = ScenarioOrchestrator::new(&registry, &source, &sink, &config);
    orchestrator.run_species(&species(), &catalog).unwrap();

    for name in ["rf", "logreg"] {
        let responses = raster(&sink, "future1", name, "responses.tif");
        let p0 = raster(&sink, "future1", name, "probability_0.tif");
        let p1 = raster(&sink, "future1", name, "probability_1.tif");
        let certainty = raster(&sink, "future1", name, "certainty.tif");

        for layer in [&p0, &p1, &certainty] {
            assert_eq!(layer.grid(), responses.grid());
            assert_eq!(layer.grid(), &grid());
            assert!(layer.nodata().unwrap().is_nan());
        }

        for r in 0..ROWS {
            for c in 0..COLS {
                let (a, b, cert) = (p0.data()[[r, c]], p1.data()[[r, c]], certainty.data()[[r, c]]);
                if MISSING.contains(&(r, c)) {
                    assert!(a.is_nan() && b.is_nan() && cert.is_nan());
                } else {
                    assert!((a + b - 1.0).abs() < 1e-4);
                    assert!((cert - a.max(b)).abs() < 1e-6);
                    let label = responses.data()[[r, c]];
                    assert_eq!(label, if b > a { 1.0 } else { 0.0 });
                }
            }
        }
    }
}

#[test]
fn separable_species_is_learned() {
    let (source, catalog) = source_and_catalog();
    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = PipelineConfig {
        include_future: false,
        ..config(&["rf"])
    };
    let orchestrator = ScenarioOrchestrator::new(&registry, &source, &sink, &config);
    let report = orchestrator.run_species(&species(), &catalog).unwrap();

    assert_eq!(report.imputations.len(), 1);
    assert!(report.cross_validation[0].mean_accuracy >= 0.7);
    let responses = raster(&sink, "present", "rf", "responses.tif");
    let correct = points()
        .iter()
        .filter(|point| {
            let (row, col) = grid().transform.locate(point.x, point.y, ROWS, COLS).unwrap();
            responses.data()[[row, col]] == point.label as f32
        })
        .count();
    assert!(correct >= 18, "{} of 20 training points reproduced", correct);
    assert!(sink
        .raster("out/lynx/future1/rf-images/responses.tif")
        .is_none());
}

#[test]
fn runs_are_reproducible_and_parallelism_does_not_change_results() {
    let (source, catalog) = source_and_catalog();
    let registry = ClassifierRegistry::standard(7);
    let names = ["rf", "et", "mlp"];

    let run = |parallel: bool| {
        let sink = MemorySink::new();
        let config = PipelineConfig {
            parallel,
            ..config(&names)
        };
        let report = ScenarioOrchestrator::new(&registry, &source, &sink, &config)
            .run_species(&species(), &catalog)
            .unwrap();
        (report, sink)
    };

    let (first, sink_a) = run(false);
    let (second, sink_b) = run(false);
    let (third, sink_c) = run(true);

    assert_eq!(first.cross_validation, second.cross_validation);
    assert_eq!(first.cross_validation, third.cross_validation);
    assert_eq!(sink_a.raster_paths(), sink_c.raster_paths());

    for path in sink_a.raster_paths() {
        let a = sink_a.raster(&path).unwrap();
        assert!(same_values(&a, &sink_b.raster(&path).unwrap()), "{}", path.display());
        assert!(same_values(&a, &sink_c.raster(&path).unwrap()), "{}", path.display());
    }
}

#[test]
fn missing_training_rows_are_dropped() {
    let (source, catalog) = source_and_catalog();
    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = PipelineConfig {
        include_future: false,
        ..config(&["logreg"])
    };

    // Two extra points on pixels with missing cover plus one off the grid.
    let mut observations = points();
    let (x, y) = centre(MISSING[0].0, MISSING[0].1);
    observations.push(habitat_classifiers::training::PointObservation::new(x, y, 1));
    let (x, y) = centre(MISSING[1].0, MISSING[1].1);
    observations.push(habitat_classifiers::training::PointObservation::new(x, y, 0));
    observations.push(habitat_classifiers::training::PointObservation::new(-50.0, 3.0, 0));

    let report = ScenarioOrchestrator::new(&registry, &source, &sink, &config)
        .run_species(&SpeciesInput::new("lynx", observations), &catalog)
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.cross_validation[0].n_folds, 5);
}

#[test]
fn schema_mismatch_aborts_the_species_before_training() {
    let (mut source, mut catalog) = source_and_catalog();
    source.insert("climate/future1/bio12_2050.tif", layer("bio12_2050", climate(1.0)));
    catalog.futures[0]
        .1
        .climate
        .push(LayerRef::from_path(LayerCategory::Climate, "climate/future1/bio12_2050.tif"));

    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = config(&["rf"]);
    let orchestrator = ScenarioOrchestrator::new(&registry, &source, &sink, &config);

    let err = orchestrator.run_species(&species(), &catalog).unwrap_err();
    match err {
        HabitatError::SchemaMismatch { scenario, .. } => assert_eq!(scenario, "future1"),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(sink.raster_paths().is_empty());
    assert!(sink.text_paths().is_empty());

    let run = orchestrator.run_all(&[species()], &catalog);
    assert_eq!(run.failed_species.len(), 1);
    assert_eq!(run.n_failures(), 1);
}

#[test]
fn misaligned_layer_is_a_configuration_error() {
    let (mut source, catalog) = source_and_catalog();
    let shifted = habitat_classifiers::raster::GridSpec::new(
        ROWS,
        COLS,
        habitat_classifiers::raster::GeoTransform::new(0.5, ROWS as f64, 1.0, -1.0),
        grid().crs,
    );
    let dem = RasterLayer::from_vec("dem", shifted, None, vec![1.0; ROWS * COLS]).unwrap();
    source.insert("elevation/dem.tif", dem);

    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = config(&["rf"]);
    let err = ScenarioOrchestrator::new(&registry, &source, &sink, &config)
        .run_species(&species(), &catalog)
        .unwrap_err();
    assert!(matches!(err, HabitatError::Configuration(_)), "{:?}", err);
    assert!(sink.raster_paths().is_empty());
}

#[test]
fn sentinel_inside_a_layer_range_is_rejected() {
    let (mut source, catalog) = source_and_catalog();
    source.insert("elevation/dem.tif", layer("dem", |r, c| (r * 10 + c) as f32 * 20.0 - 1000.0));

    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = config(&["rf"]);
    let err = ScenarioOrchestrator::new(&registry, &source, &sink, &config)
        .run_species(&species(), &catalog)
        .unwrap_err();
    assert!(matches!(err, HabitatError::Configuration(_)), "{:?}", err);
}

#[test]
fn too_few_points_is_insufficient_data() {
    let (source, catalog) = source_and_catalog();
    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = config(&["rf"]);
    let few = SpeciesInput::new("lynx", points().into_iter().take(3).collect());
    let err = ScenarioOrchestrator::new(&registry, &source, &sink, &config)
        .run_species(&few, &catalog)
        .unwrap_err();
    assert!(matches!(err, HabitatError::InsufficientData(_)), "{:?}", err);
}

#[test]
fn unknown_classifier_name_is_rejected() {
    let (source, catalog) = source_and_catalog();
    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = config(&["svm"]);
    let err = ScenarioOrchestrator::new(&registry, &source, &sink, &config)
        .run_species(&species(), &catalog)
        .unwrap_err();
    assert!(matches!(err, HabitatError::Configuration(_)));
}

#[test]
fn excluded_cover_layer_is_never_read() {
    // `cover/landcover_12.tif` is catalogued but absent from the source; with
    // the exclusion disabled the assembler must try to read it.
    let (source, catalog) = source_and_catalog();
    let sink = MemorySink::new();
    let registry = ClassifierRegistry::standard(42);
    let config = PipelineConfig {
        excluded_cover_suffix: None,
        ..config(&["rf"])
    };
    let err = ScenarioOrchestrator::new(&registry, &source, &sink, &config)
        .run_species(&species(), &catalog)
        .unwrap_err();
    assert!(err.to_string().contains("landcover_12"), "{}", err);
}

#[test]
fn scenario_output_dirs_follow_the_layout() {
    let registry = ClassifierRegistry::standard(42);
    let source = MemorySource::new();
    let sink = MemorySink::new();
    let config = config(&[]);
    let orchestrator = ScenarioOrchestrator::new(&registry, &source, &sink, &config);
    assert_eq!(
        orchestrator.output_dir("lynx", &Scenario::new("future2"), "xgb"),
        PathBuf::from("out/lynx/future2/xgb-images")
    );
}

/// Rejects every raster written below one scenario directory.
struct FailingScenarioSink {
    inner: MemorySink,
    scenario: &'static str,
}

impl OutputSink for FailingScenarioSink {
    fn write_raster(&self, path: &Path, layer: &RasterLayer) -> habitat_classifiers::Result<()> {
        if path.components().any(|c| c.as_os_str() == self.scenario) {
            return Err(HabitatError::configuration(format!(
                "read-only directory {}",
                path.display()
            )));
        }
        self.inner.write_raster(path, layer)
    }

    fn write_text(&self, path: &Path, contents: &str) -> habitat_classifiers::Result<()> {
        self.inner.write_text(path, contents)
    }
}

#[test]
fn failing_classifier_does_not_stop_the_others() {
    let (source, catalog) = source_and_catalog();
    let sink = MemorySink::new();
    let broken = ClassifierSpec::new(
        "broken-logreg",
        ModelType::LogisticRegression {
            c: 0.0,
            l1_ratio: 0.5,
            max_iter: 1000,
            tol: 1e-4,
        },
        42,
    );
    let rf = ClassifierSpec::from_short_name("rf", 42).unwrap();
    let registry = ClassifierRegistry::new(vec![broken, rf]).unwrap();
    let config = config(&[]);
    let orchestrator = ScenarioOrchestrator::new(&registry, &source, &sink, &config);

    let report = orchestrator.run_species(&species(), &catalog).unwrap();
    assert!(!report.is_success());
    assert!(report
        .failures
        .iter()
        .all(|f| f.classifier.as_deref() == Some("broken-logreg")));
    let stages: Vec<Stage> = report.failures.iter().map(|f| f.stage).collect();
    assert!(stages.contains(&Stage::CrossValidation));
    assert!(stages.contains(&Stage::Fit));

    assert_eq!(report.cross_validation.len(), 1);
    assert_eq!(report.cross_validation[0].classifier, "rf");
    assert_eq!(report.imputations.len(), 3);
    for scenario in ["present", "future1", "future2"] {
        raster(&sink, scenario, "rf", "responses.tif");
        assert!(sink
            .raster(format!("out/lynx/{}/broken-logreg-images/responses.tif", scenario))
            .is_none());
    }
}

#[test]
fn failing_scenario_write_does_not_stop_the_others() {
    let (source, catalog) = source_and_catalog();
    let sink = FailingScenarioSink {
        inner: MemorySink::new(),
        scenario: "future1",
    };
    let registry = ClassifierRegistry::standard(42);
    let config = config(&["rf"]);
    let orchestrator = ScenarioOrchestrator::new(&registry, &source, &sink, &config);

    let report = orchestrator.run_species(&species(), &catalog).unwrap();
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.stage, Stage::Imputation);
    assert_eq!(failure.scenario, Some(Scenario::new("future1")));
    assert_eq!(failure.classifier.as_deref(), Some("rf"));

    assert_eq!(report.imputations.len(), 2);
    for scenario in ["present", "future2"] {
        raster(&sink.inner, scenario, "rf", "responses.tif");
        raster(&sink.inner, scenario, "rf", "certainty.tif");
    }
    assert!(sink.inner.raster_paths().iter().all(|p| !p.starts_with("out/lynx/future1")));
}
