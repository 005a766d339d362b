use std::fs;
use std::path::PathBuf;

use habitat_cli::cli::build_cli;
use habitat_cli::run::config::{load_run_config, RunConfig};
use habitat_cli::run::runner::run_pipeline;
use habitat_cli::util::split_names;
use habitat_classifiers::report::Stage;

fn write_config(dir: &tempfile::TempDir, json: &str) -> PathBuf {
    let path = dir.path().join("run.json");
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn partial_config_takes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"{
            "data_root": "/data/habitat",
            "species": ["lynx"],
            "points": { "label": "presence" },
            "pipeline": { "folds": 10, "parallel": true }
        }"#,
    );
    let config = load_run_config(&path).unwrap();

    assert_eq!(config.data_root, PathBuf::from("/data/habitat"));
    assert_eq!(config.species, Some(vec!["lynx".to_string()]));
    assert_eq!(config.points.label, "presence");
    assert_eq!(config.points.x, "x");
    assert_eq!(config.pipeline.folds, 10);
    assert!(config.pipeline.parallel);
    assert_eq!(config.pipeline.sentinel, -999.0);
    assert_eq!(config.layout.climate_future.len(), 2);
    assert_eq!(config.registry().unwrap().len(), 6);
}

#[test]
fn invalid_json_is_reported_with_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "{ not json");
    let err = load_run_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("run.json"));
}

#[test]
fn command_line_overrides_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{ "species": ["wolf"] }"#);

    let matches = build_cli()
        .try_get_matches_from([
            "habitat",
            "run",
            path.to_str().unwrap(),
            "-o",
            "/tmp/out",
            "-s",
            "lynx, bear",
            "--classifiers",
            "rf,mlp",
            "-k",
            "3",
            "--present-only",
        ])
        .unwrap();
    let (_, run_matches) = matches.subcommand().unwrap();
    let config = RunConfig::from_arguments(&path, run_matches).unwrap();

    assert_eq!(config.pipeline.output_dir, PathBuf::from("/tmp/out"));
    assert_eq!(config.species, Some(vec!["lynx".to_string(), "bear".to_string()]));
    assert_eq!(
        config.pipeline.classifiers,
        Some(vec!["rf".to_string(), "mlp".to_string()])
    );
    assert_eq!(config.pipeline.folds, 3);
    assert!(!config.pipeline.include_future);
    assert!(!config.pipeline.parallel);
}

#[test]
fn custom_registry_rejects_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let specs = habitat_classifiers::models::factory::ClassifierRegistry::standard(1)
        .specs()
        .iter()
        .take(1)
        .cloned()
        .collect::<Vec<_>>();
    let config = RunConfig {
        registry: Some(vec![specs[0].clone(), specs[0].clone()]),
        ..Default::default()
    };
    assert!(config.registry().is_err());

    let json = serde_json::to_string(&RunConfig {
        registry: Some(specs),
        ..Default::default()
    })
    .unwrap();
    let path = write_config(&dir, &json);
    assert_eq!(load_run_config(&path).unwrap().registry().unwrap().names(), vec!["rf"]);
}

#[test]
fn species_without_points_is_recorded_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("inputs/lynx")).unwrap();
    let config = RunConfig {
        data_root: dir.path().to_path_buf(),
        species: Some(vec!["lynx".to_string(), "wolf".to_string()]),
        ..Default::default()
    };

    let report = run_pipeline(&config).unwrap();
    assert!(report.species.is_empty());
    let failed: Vec<&str> = report
        .failed_species
        .iter()
        .map(|f| f.species.as_str())
        .collect();
    assert_eq!(failed, vec!["lynx", "wolf"]);
    assert_eq!(report.n_failures(), 2);
}

#[test]
fn unreadable_points_file_fails_only_its_species() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("inputs/lynx")).unwrap();
    fs::write(dir.path().join("inputs/lynx/points.csv"), "easting,northing\n1,2\n").unwrap();
    let config = RunConfig {
        data_root: dir.path().to_path_buf(),
        species: Some(vec!["lynx".to_string()]),
        ..Default::default()
    };

    let report = run_pipeline(&config).unwrap();
    assert!(report.species.is_empty());
    assert_eq!(report.failed_species.len(), 1);
    let failure = &report.failed_species[0];
    assert_eq!(failure.stage, Stage::Preparation);
    assert!(failure.error.to_string().contains("points.csv has no"));
}

#[test]
fn split_names_drops_blanks() {
    assert_eq!(split_names(" rf,, et ,"), vec!["rf", "et"]);
}
