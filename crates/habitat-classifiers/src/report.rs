//! Plain-text reporting of a pipeline run.
use std::fmt;
use std::path::PathBuf;

use crate::cross_validation::CrossValResult;
use crate::error::HabitatError;
use crate::stack::Scenario;

pub const METRICS_FILE: &str = "cross_validation_metrics.txt";
pub const SUMMARY_FILE: &str = "cross_validation_summary.txt";

/// Pipeline step at which a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Stack assembly, schema checks and training-set extraction.
    Preparation,
    CrossValidation,
    Fit,
    Imputation,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Preparation => "preparation",
            Stage::CrossValidation => "cross-validation",
            Stage::Fit => "fit",
            Stage::Imputation => "imputation",
            Stage::Report => "report",
        })
    }
}

/// One failed species/classifier/scenario task.
#[derive(Debug)]
pub struct TaskFailure {
    pub species: String,
    pub classifier: Option<String>,
    pub scenario: Option<Scenario>,
    pub stage: Stage,
    pub error: HabitatError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.species)?;
        if let Some(classifier) = &self.classifier {
            write!(f, "/{}", classifier)?;
        }
        if let Some(scenario) = &self.scenario {
            write!(f, "/{}", scenario)?;
        }
        write!(f, " failed during {}: {}", self.stage, self.error)
    }
}

/// Location of the rasters written for one classifier and scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputationRecord {
    pub classifier: String,
    pub scenario: Scenario,
    pub directory: PathBuf,
    pub classes: Vec<i64>,
}

/// Outcome of one species: metrics, written outputs and collected failures.
#[derive(Debug, Default)]
pub struct SpeciesReport {
    pub species: String,
    pub cross_validation: Vec<CrossValResult>,
    pub imputations: Vec<ImputationRecord>,
    pub failures: Vec<TaskFailure>,
}

impl SpeciesReport {
    pub fn new(species: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// One report line per cross-validated classifier.
    pub fn summary_text(&self) -> String {
        cross_validation_summary(&self.cross_validation)
    }
}

impl fmt::Display for SpeciesReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "species {}", self.species)?;
        for result in &self.cross_validation {
            writeln!(f, "  {}", result.report_line())?;
        }
        writeln!(f, "  {} raster sets written", self.imputations.len())?;
        for failure in &self.failures {
            writeln!(f, "  {}", failure)?;
        }
        Ok(())
    }
}

/// Outcome of a multi-species run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub species: Vec<SpeciesReport>,
    /// Species aborted before any classifier ran.
    pub failed_species: Vec<TaskFailure>,
}

impl RunReport {
    pub fn n_failures(&self) -> usize {
        self.failed_species.len() + self.species.iter().map(|s| s.failures.len()).sum::<usize>()
    }
}

pub fn cross_validation_summary(results: &[CrossValResult]) -> String {
    let mut text = String::new();
    for result in results {
        text.push_str(&result.report_line());
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_names_the_task() {
        let failure = TaskFailure {
            species: "lynx".into(),
            classifier: Some("mlp".into()),
            scenario: Some(Scenario::new("future1")),
            stage: Stage::Imputation,
            error: HabitatError::configuration("boom"),
        };
        assert_eq!(
            failure.to_string(),
            "lynx/mlp/future1 failed during imputation: configuration error: boom"
        );
    }

    #[test]
    fn summary_has_one_line_per_classifier() {
        let results = vec![
            CrossValResult::from_folds("rf", vec![1.0, 1.0]),
            CrossValResult::from_folds("et", vec![0.5, 1.0]),
        ];
        let text = cross_validation_summary(&results);
        assert_eq!(text.lines().count(), 2);
        let report = SpeciesReport {
            cross_validation: results,
            ..SpeciesReport::new("lynx")
        };
        assert_eq!(report.summary_text(), text);
        assert!(text.starts_with("rf 2-fold Cross Validation Accuracy: 100.00 (+/- 0.00)"));
    }
}
