//! Per-tile processing stages.
//!
//! A [`Stage`] is a pure transform from one [`MapData`] to a new one. It
//! never writes into its input; outputs are freshly allocated and ownership
//! moves downstream with the returned [`StageOutput`]. Each stage also
//! reports which part of its output changed, widening or narrowing the
//! changed area it was handed.

mod threshold;

use std::sync::Weak;

pub use threshold::ThresholdStage;

use crate::pipeline::PipelineError;
use crate::raster::{ChangedArea, MapAttr, MapData};
use crate::settings::{ChangeListener, Subscription};

/// Result of one stage or composite call.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// The produced raster.
    pub data: MapData,
    /// Part of `data` that differs from the previous output.
    pub changed: ChangedArea,
}

impl StageOutput {
    /// Bundle data with its changed area.
    pub fn new(data: MapData, changed: ChangedArea) -> Self {
        Self { data, changed }
    }
}

/// A transform applied to every tile of a pipeline.
pub trait Stage: Send + Sync {
    /// Name for logging and error messages.
    fn name(&self) -> &str;

    /// Number of inputs.
    fn input_count(&self) -> usize {
        1
    }

    /// Display name of input `index`.
    fn input_name(&self, index: usize) -> Result<&str, PipelineError> {
        if index < self.input_count() {
            Ok("input")
        } else {
            Err(PipelineError::InvalidInput {
                stage: self.name().to_string(),
                index,
            })
        }
    }

    /// Formats accepted on input `index`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidInput`] if the stage has no such input.
    fn consumes(&self, index: usize) -> Result<&[MapAttr], PipelineError>;

    /// Output format, or `None` if it depends on the input.
    fn produces(&self) -> Option<MapAttr>;

    /// Transform `input`, given the area of it that changed.
    fn process(
        &self,
        index: usize,
        input: &MapData,
        changed: ChangedArea,
    ) -> Result<StageOutput, PipelineError>;

    /// Register for changes to this stage's settings.
    ///
    /// Stages without live settings return `None`.
    fn subscribe(&self, _listener: Weak<dyn ChangeListener>) -> Option<Subscription> {
        None
    }
}

/// Fail with [`PipelineError::FormatMismatch`] unless `actual` is accepted.
pub fn ensure_accepts(
    stage: &str,
    index: usize,
    accepted: &[MapAttr],
    actual: Option<MapAttr>,
) -> Result<(), PipelineError> {
    match actual {
        Some(attr) if attr.is_accepted_by(accepted) => Ok(()),
        _ => Err(PipelineError::FormatMismatch {
            stage: stage.to_string(),
            input: index,
            expected: accepted.to_vec(),
            actual,
        }),
    }
}

/// Validate a runtime input against what a stage declares it consumes.
pub fn check_input(stage: &dyn Stage, index: usize, input: &MapData) -> Result<(), PipelineError> {
    let accepted = stage.consumes(index)?;
    ensure_accepts(stage.name(), index, accepted, Some(input.attr()))
}
