//! Processing chains: one source, its stages, and the shared composite.
//!
//! [`Pipeline::build`] checks every link of the chain once, up front, so a
//! stage wired to the wrong band layout fails when the pipeline is created
//! instead of on the first tile. Data is re-checked at runtime by each stage.

mod error;
mod policy;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use error::PipelineError;
pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_MS,
};

use crate::composite::CompositeStage;
use crate::raster::{ChangedArea, MapAttr, MapData};
use crate::source::MapSource;
use crate::stage::{ensure_accepts, Stage, StageOutput};

/// Source → stages → composite.
///
/// Cheap to clone; every part is shared. A pipeline is immutable once
/// built, so a pass always sees a consistent chain.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn MapSource>,
    stages: Vec<Arc<dyn Stage>>,
    composite: Arc<dyn CompositeStage>,
    final_attr: Option<MapAttr>,
}

impl Pipeline {
    /// Assemble and validate a pipeline.
    ///
    /// # Errors
    ///
    /// [`PipelineError::FormatMismatch`] if a stage does not accept what
    /// feeds it, or [`PipelineError::InvalidInput`] if a stage has no
    /// input 0.
    pub fn build(
        source: Arc<dyn MapSource>,
        stages: Vec<Arc<dyn Stage>>,
        composite: Arc<dyn CompositeStage>,
    ) -> Result<Self, PipelineError> {
        let mut attr = Some(source.map_attr());
        for stage in &stages {
            let accepted = stage.consumes(0)?;
            // A dynamic upstream format can only be checked at runtime
            if attr.is_some() {
                ensure_accepts(stage.name(), 0, accepted, attr)?;
            }
            attr = stage.produces();
        }

        Ok(Self {
            source,
            stages,
            composite,
            final_attr: attr,
        })
    }

    /// The pipeline's source.
    pub fn source(&self) -> &Arc<dyn MapSource> {
        &self.source
    }

    /// Stages in processing order.
    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    /// The composite this pipeline feeds.
    pub fn composite(&self) -> &Arc<dyn CompositeStage> {
        &self.composite
    }

    /// Name of the pipeline (its source's name).
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Format leaving the last stage, if statically known.
    pub fn final_attr(&self) -> Option<MapAttr> {
        self.final_attr
    }

    /// Check that the composite accepts this pipeline on input `index`.
    pub fn validate_composite_input(&self, index: usize) -> Result<(), PipelineError> {
        if self.composite.input_count() == 0 {
            return Ok(());
        }
        let accepted = self.composite.consumes(index)?;
        match self.final_attr {
            Some(attr) => ensure_accepts(self.composite.name(), index, accepted, Some(attr)),
            None => Ok(()),
        }
    }

    /// True if both pipelines feed the same composite object.
    pub fn shares_composite_with(&self, other: &Pipeline) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.composite) as *const (),
            Arc::as_ptr(&other.composite) as *const (),
        )
    }

    /// Run `data` through every stage in order.
    ///
    /// `changed` is the area of `data` that is new; each stage may widen or
    /// narrow it. Stops with [`PipelineError::Cancelled`] between stages once
    /// `cancel` fires.
    pub fn run_stages(
        &self,
        data: MapData,
        changed: ChangedArea,
        cancel: &CancellationToken,
    ) -> Result<StageOutput, PipelineError> {
        let mut current = StageOutput::new(data, changed);
        for stage in &self.stages {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            current = stage.process(0, &current.data, current.changed)?;
            debug!(
                pipeline = self.name(),
                stage = stage.name(),
                changed_rects = current.changed.rects().len(),
                "Stage complete"
            );
        }
        Ok(current)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline")
            .field("source", &self.source.name())
            .field("stages", &stages)
            .field("composite", &self.composite.name())
            .finish()
    }
}
