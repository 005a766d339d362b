//! Reconstruction of per-pixel predictions into georeferenced rasters.
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::inference::NanMaskedInferer;
use crate::io::OutputSink;
use crate::models::factory::TrainedModel;
use crate::raster::RasterLayer;
use crate::target::TargetGrid;

pub const RESPONSES_FILE: &str = "responses.tif";
pub const CERTAINTY_FILE: &str = "certainty.tif";

/// File name of the probability raster of one class.
pub fn probability_file(label: i64) -> String {
    format!("probability_{}.tif", label)
}

/// Rasters produced for one model on one target grid.
#[derive(Debug, Clone)]
pub struct ImputationOutput {
    /// Most probable class label per pixel.
    pub responses: RasterLayer,
    /// One raster per class, in ascending label order.
    pub probabilities: Vec<(i64, RasterLayer)>,
    /// Maximum class probability per pixel.
    pub certainty: RasterLayer,
}

impl ImputationOutput {
    /// Every raster with the file name it is written under.
    pub fn files(&self) -> Vec<(String, &RasterLayer)> {
        let mut files = vec![(RESPONSES_FILE.to_string(), &self.responses)];
        for (label, layer) in &self.probabilities {
            files.push((probability_file(*label), layer));
        }
        files.push((CERTAINTY_FILE.to_string(), &self.certainty));
        files
    }
}

/// Applies a trained model to a target grid and shapes the result as rasters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialImputer {
    inferer: NanMaskedInferer,
}

impl SpatialImputer {
    pub fn new(inferer: NanMaskedInferer) -> Self {
        Self { inferer }
    }

    pub fn impute(&self, model: &TrainedModel, grid: &TargetGrid) -> Result<ImputationOutput> {
        let prediction = self.inferer.predict(model, grid)?;

        let responses = grid.to_layer("responses", prediction.labels)?;
        let mut probabilities = Vec::with_capacity(prediction.classes.len());
        for (col, &label) in prediction.classes.iter().enumerate() {
            let values = prediction.probabilities.column(col).to_vec();
            let layer = grid.to_layer(&format!("probability_{}", label), values)?;
            probabilities.push((label, layer));
        }
        let certainty = grid.to_layer("certainty", prediction.certainty)?;

        Ok(ImputationOutput {
            responses,
            probabilities,
            certainty,
        })
    }

    /// Persist every raster of `output` below `outdir`.
    pub fn write(
        &self,
        output: &ImputationOutput,
        sink: &dyn OutputSink,
        outdir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (file, layer) in output.files() {
            let path = outdir.join(file);
            sink.write_raster(&path, layer)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Impute and write in one step.
    pub fn impute_to(
        &self,
        model: &TrainedModel,
        grid: &TargetGrid,
        sink: &dyn OutputSink,
        outdir: &Path,
    ) -> Result<ImputationOutput> {
        let output = self.impute(model, grid)?;
        let written = self.write(&output, sink, outdir)?;
        log::debug!("Wrote {} rasters to {}", written.len(), outdir.display());
        Ok(output)
    }
}
