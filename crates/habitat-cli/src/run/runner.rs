use anyhow::{Context, Result};

use habitat_classifiers::io::{
    read_points_csv_with_config, DirectoryCatalog, GeoTiffSink, GeoTiffSource,
};
use habitat_classifiers::orchestrator::{ScenarioOrchestrator, SpeciesInput};
use habitat_classifiers::report::{RunReport, Stage, TaskFailure};

use crate::run::config::RunConfig;

/// Species named in the config, or every species directory under the inputs.
pub fn resolve_species(config: &RunConfig, catalog: &DirectoryCatalog) -> Result<Vec<String>> {
    match &config.species {
        Some(species) => Ok(species.clone()),
        None => catalog.species().with_context(|| {
            format!(
                "Failed to list species under {}",
                catalog.root().join(&catalog.layout().inputs).display()
            )
        }),
    }
}

/// Run the full pipeline over every configured species, reading GeoTIFFs
/// below `data_root` and writing rasters below the output directory.
pub fn run_pipeline(config: &RunConfig) -> Result<RunReport> {
    let registry = config.registry()?;
    let catalog = DirectoryCatalog::new(&config.data_root, config.layout.clone());
    let scenarios = catalog
        .catalog(config.pipeline.include_future)
        .context("Failed to resolve raster layers")?;
    let reader = config.points.reader_config()?;

    let mut report = RunReport::default();
    let mut inputs = Vec::new();
    for species in resolve_species(config, &catalog)? {
        let observations = catalog
            .species_points_file(&species)
            .and_then(|path| read_points_csv_with_config(&path, &reader));
        match observations {
            Ok(observations) => {
                log::info!("Species '{}': {} points", species, observations.len());
                inputs.push(SpeciesInput::new(species, observations));
            }
            Err(error) => {
                let failure = TaskFailure {
                    species,
                    classifier: None,
                    scenario: None,
                    stage: Stage::Preparation,
                    error,
                };
                log::error!("{}", failure);
                report.failed_species.push(failure);
            }
        }
    }

    let orchestrator =
        ScenarioOrchestrator::new(&registry, &GeoTiffSource, &GeoTiffSink, &config.pipeline);
    let run = orchestrator.run_all(&inputs, &scenarios);
    report.species.extend(run.species);
    report.failed_species.extend(run.failed_species);

    for species in &report.species {
        log::info!("{}", species.to_string().trim_end());
    }
    Ok(report)
}
