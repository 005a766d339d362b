//! Per-species fan-out over classifiers and climate scenarios.
use std::path::PathBuf;

use rayon::prelude::*;

use crate::config::{ClassifierSpec, PipelineConfig};
use crate::cross_validation::{CrossValResult, CrossValidator, KFold};
use crate::error::{HabitatError, Result};
use crate::imputation::SpatialImputer;
use crate::inference::NanMaskedInferer;
use crate::io::{OutputSink, RasterSource};
use crate::models::factory::ClassifierRegistry;
use crate::report::{
    ImputationRecord, RunReport, SpeciesReport, Stage, TaskFailure, METRICS_FILE, SUMMARY_FILE,
};
use crate::stack::{AssemblerOptions, FeatureStack, RasterStackAssembler, Scenario, ScenarioLayers};
use crate::target::TargetGrid;
use crate::training::{PointObservation, TrainingSet, TrainingSetExtractor};

/// Layer references of the present scenario and of every future scenario.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    pub present: ScenarioLayers,
    pub futures: Vec<(Scenario, ScenarioLayers)>,
}

/// Labelled observations of one species.
#[derive(Debug, Clone)]
pub struct SpeciesInput {
    pub name: String,
    pub observations: Vec<PointObservation>,
}

impl SpeciesInput {
    pub fn new(name: impl Into<String>, observations: Vec<PointObservation>) -> Self {
        Self {
            name: name.into(),
            observations,
        }
    }
}

/// Everything the classifier tasks of a species read; built and validated
/// before any model is trained.
struct PreparedSpecies {
    training: TrainingSet,
    targets: Vec<TargetGrid>,
}

/// Outcome of one classifier across all scenarios of a species.
struct ClassifierOutcome {
    cross_validation: Option<CrossValResult>,
    imputations: Vec<ImputationRecord>,
    failures: Vec<TaskFailure>,
}

/// Drives the pipeline once per species, classifier and scenario.
pub struct ScenarioOrchestrator<'a> {
    registry: &'a ClassifierRegistry,
    source: &'a dyn RasterSource,
    sink: &'a dyn OutputSink,
    config: &'a PipelineConfig,
}

impl<'a> ScenarioOrchestrator<'a> {
    pub fn new(
        registry: &'a ClassifierRegistry,
        source: &'a dyn RasterSource,
        sink: &'a dyn OutputSink,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            registry,
            source,
            sink,
            config,
        }
    }

    /// `<output_dir>/<species>/<scenario>/<classifier>-images`
    pub fn output_dir(&self, species: &str, scenario: &Scenario, classifier: &str) -> PathBuf {
        self.config
            .output_dir
            .join(species)
            .join(scenario.name())
            .join(format!("{}-images", classifier))
    }

    fn assembler(&self) -> RasterStackAssembler<'a> {
        RasterStackAssembler::new(
            self.source,
            AssemblerOptions {
                excluded_cover_suffix: self.config.excluded_cover_suffix.clone(),
                sentinel: Some(self.config.sentinel),
            },
        )
    }

    fn cross_validator(&self) -> CrossValidator {
        let kfold = if self.config.shuffle_folds {
            KFold::shuffled(self.config.folds, self.config.seed)
        } else {
            KFold::new(self.config.folds)
        };
        CrossValidator::new(kfold)
    }

    fn imputer(&self) -> SpatialImputer {
        SpatialImputer::new(NanMaskedInferer::new(
            self.config.sentinel,
            self.config.inference_chunk_rows,
        ))
    }

    fn selected_classifiers(&self) -> Result<Vec<ClassifierSpec>> {
        let registry = match &self.config.classifiers {
            Some(names) => self.registry.select(names.as_slice())?,
            None => self.registry.clone(),
        };
        if registry.is_empty() {
            return Err(HabitatError::configuration("no classifiers selected"));
        }
        Ok(registry.specs().to_vec())
    }

    /// Assemble every stack, check future schemas against the present one and
    /// extract the training set. Any failure here is fatal for the species.
    fn prepare(&self, species: &SpeciesInput, catalog: &ScenarioCatalog) -> Result<PreparedSpecies> {
        let assembler = self.assembler();
        let present = assembler.assemble(Scenario::present(), &catalog.present)?;
        let schema = present.schema();

        let mut futures: Vec<FeatureStack> = Vec::new();
        if self.config.include_future {
            for (scenario, layers) in &catalog.futures {
                let stack = assembler.assemble(scenario.clone(), layers)?;
                schema.check_compatible(&stack.schema(), scenario, self.config.strict_climate_names)?;
                if let Some(reason) = present.grid().misalignment(stack.grid()) {
                    return Err(HabitatError::configuration(format!(
                        "scenario '{}' is misaligned with the present grid: {}",
                        scenario, reason
                    )));
                }
                futures.push(stack);
            }
        }

        let training = TrainingSetExtractor::new(&present)
            .extract_clean(&species.observations, self.config.folds)?;

        let mut targets = vec![TargetGrid::from_stack(&present)];
        targets.extend(futures.iter().map(TargetGrid::from_stack));

        Ok(PreparedSpecies { training, targets })
    }

    /// Run every selected classifier for one species.
    ///
    /// Structural errors (misaligned layers, schema mismatch, too little
    /// training data) are returned before any model is trained; failures of
    /// individual classifiers or scenarios are collected in the report.
    pub fn run_species(&self, species: &SpeciesInput, catalog: &ScenarioCatalog) -> Result<SpeciesReport> {
        log::info!("Processing species '{}'", species.name);
        let specs = self.selected_classifiers()?;
        let prepared = self.prepare(species, catalog)?;
        log::info!(
            "Species '{}': {} training rows, {} scenario(s), {} classifier(s)",
            species.name,
            prepared.training.n_rows(),
            prepared.targets.len(),
            specs.len()
        );

        let outcomes: Vec<ClassifierOutcome> = if self.config.parallel {
            specs
                .par_iter()
                .map(|spec| self.run_classifier(&species.name, spec, &prepared))
                .collect()
        } else {
            specs
                .iter()
                .map(|spec| self.run_classifier(&species.name, spec, &prepared))
                .collect()
        };

        let mut report = SpeciesReport::new(species.name.clone());
        for outcome in outcomes {
            report.cross_validation.extend(outcome.cross_validation);
            report.imputations.extend(outcome.imputations);
            report.failures.extend(outcome.failures);
        }

        if !report.cross_validation.is_empty() {
            let path = self.config.output_dir.join(&species.name).join(SUMMARY_FILE);
            if let Err(error) = self.sink.write_text(&path, &report.summary_text()) {
                report.failures.push(TaskFailure {
                    species: species.name.clone(),
                    classifier: None,
                    scenario: None,
                    stage: Stage::Report,
                    error,
                });
            }
        }

        for failure in &report.failures {
            log::error!("{}", failure);
        }
        log::info!(
            "Finished species '{}': {} raster set(s), {} failure(s)",
            species.name,
            report.imputations.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn run_classifier(&self, species: &str, spec: &ClassifierSpec, prepared: &PreparedSpecies) -> ClassifierOutcome {
        let mut outcome = ClassifierOutcome {
            cross_validation: None,
            imputations: Vec::new(),
            failures: Vec::new(),
        };
        let failure = |stage: Stage, scenario: Option<Scenario>, error: HabitatError| TaskFailure {
            species: species.to_string(),
            classifier: Some(spec.name.clone()),
            scenario,
            stage,
            error,
        };

        log::info!("Species '{}': running classifier '{}'", species, spec.name);

        match self.cross_validator().evaluate(spec, &prepared.training) {
            Ok(result) => {
                log::info!("{}", result.report_line());
                let dir = self.output_dir(species, &Scenario::present(), &spec.name);
                let text = format!("{}\n", result.report_line());
                if let Err(e) = self.sink.write_text(&dir.join(METRICS_FILE), &text) {
                    outcome.failures.push(failure(Stage::Report, None, e));
                }
                outcome.cross_validation = Some(result);
            }
            Err(e) => outcome.failures.push(failure(Stage::CrossValidation, None, e)),
        }

        let model = match spec.fit(&prepared.training) {
            Ok(model) => model,
            Err(e) => {
                outcome.failures.push(failure(Stage::Fit, None, e));
                return outcome;
            }
        };

        let imputer = self.imputer();
        for target in &prepared.targets {
            let dir = self.output_dir(species, &target.scenario, &spec.name);
            log::info!(
                "Imputing '{}' with '{}' into {}",
                target.scenario,
                spec.name,
                dir.display()
            );
            match imputer.impute_to(&model, target, self.sink, &dir) {
                Ok(_) => outcome.imputations.push(ImputationRecord {
                    classifier: spec.name.clone(),
                    scenario: target.scenario.clone(),
                    directory: dir,
                    classes: model.classes().to_vec(),
                }),
                Err(e) => outcome
                    .failures
                    .push(failure(Stage::Imputation, Some(target.scenario.clone()), e)),
            }
        }
        outcome
    }

    /// Run every species in order; a species that fails structurally is
    /// recorded and the run moves on.
    pub fn run_all(&self, species: &[SpeciesInput], catalog: &ScenarioCatalog) -> RunReport {
        let mut run = RunReport::default();
        for input in species {
            match self.run_species(input, catalog) {
                Ok(report) => run.species.push(report),
                Err(error) => {
                    let structural = error.is_structural();
                    let failure = TaskFailure {
                        species: input.name.clone(),
                        classifier: None,
                        scenario: None,
                        stage: Stage::Preparation,
                        error,
                    };
                    // Too few points or unreadable files only affect this species.
                    if structural {
                        log::error!("{}", failure);
                    } else {
                        log::warn!("{}", failure);
                    }
                    run.failed_species.push(failure);
                }
            }
        }
        run
    }
}
