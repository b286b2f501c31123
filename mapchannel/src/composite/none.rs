//! Composite with no inputs.

use super::{invalid_input, CompositeStage};
use crate::pipeline::PipelineError;
use crate::raster::{ChangedArea, MapAttr, MapData};
use crate::stage::StageOutput;

/// Marks a pipeline as not composited.
///
/// A channel using it accepts exactly one pipeline and delivers that
/// pipeline's last stage output as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoComposite;

impl NoComposite {
    /// Create the composite.
    pub fn new() -> Self {
        Self
    }
}

impl CompositeStage for NoComposite {
    fn name(&self) -> &str {
        "no composite"
    }

    fn input_count(&self) -> usize {
        0
    }

    fn input_name(&self, index: usize) -> Result<&str, PipelineError> {
        Err(invalid_input(self.name(), index))
    }

    fn consumes(&self, index: usize) -> Result<&[MapAttr], PipelineError> {
        Err(invalid_input(self.name(), index))
    }

    fn produces(&self) -> Option<MapAttr> {
        None
    }

    fn output_attr(&self, input: MapAttr) -> MapAttr {
        input
    }

    fn process(
        &self,
        index: usize,
        _input: &MapData,
        _changed: ChangedArea,
    ) -> Result<StageOutput, PipelineError> {
        Err(invalid_input(self.name(), index))
    }
}
