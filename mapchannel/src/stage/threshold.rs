//! Binary thresholding of a single band.

use std::sync::{Arc, Weak};

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Primitive};
use rayon::prelude::*;
use tracing::debug;

use super::{check_input, Stage, StageOutput};
use crate::pipeline::PipelineError;
use crate::raster::{ChangedArea, MapAttr, MapData, SINGLE_BAND};
use crate::settings::{ChangeListener, Subscription, ThresholdConfig, ThresholdSettings};

/// Turns a single-band raster into a 0/255 mask.
///
/// A sample maps to 255 when it is at or above the threshold. Because a
/// one-pixel change in the input can flip pixels anywhere in the mask's
/// displayed result, every call reports the whole tile as changed.
///
/// The threshold is read from shared [`ThresholdSettings`], so editing it
/// takes effect on the next pass and notifies subscribed channels.
#[derive(Debug, Clone)]
pub struct ThresholdStage {
    settings: Arc<ThresholdSettings>,
}

impl ThresholdStage {
    /// Create a stage reading from `settings`.
    pub fn new(settings: Arc<ThresholdSettings>) -> Self {
        Self { settings }
    }

    /// Create a stage with its own settings holding `threshold`.
    pub fn with_threshold(threshold: f64) -> Self {
        Self::new(Arc::new(ThresholdSettings::new(ThresholdConfig::new(
            threshold,
        ))))
    }

    /// The live settings.
    pub fn settings(&self) -> &Arc<ThresholdSettings> {
        &self.settings
    }
}

fn mask<T>(src: &ImageBuffer<Luma<T>, Vec<T>>, threshold: f64) -> Option<GrayImage>
where
    T: Primitive + Send + Sync + Into<f64>,
{
    let samples: Vec<u8> = src
        .as_raw()
        .par_iter()
        .map(|&v| if v.into() >= threshold { 255 } else { 0 })
        .collect();
    GrayImage::from_raw(src.width(), src.height(), samples)
}

impl Stage for ThresholdStage {
    fn name(&self) -> &str {
        "threshold"
    }

    fn input_name(&self, index: usize) -> Result<&str, PipelineError> {
        match index {
            0 => Ok("band"),
            _ => Err(PipelineError::InvalidInput {
                stage: self.name().to_string(),
                index,
            }),
        }
    }

    fn consumes(&self, index: usize) -> Result<&[MapAttr], PipelineError> {
        match index {
            0 => Ok(SINGLE_BAND),
            _ => Err(PipelineError::InvalidInput {
                stage: self.name().to_string(),
                index,
            }),
        }
    }

    fn produces(&self) -> Option<MapAttr> {
        Some(MapAttr::Gray)
    }

    fn process(
        &self,
        index: usize,
        input: &MapData,
        _changed: ChangedArea,
    ) -> Result<StageOutput, PipelineError> {
        check_input(self, index, input)?;
        let threshold = self.settings.threshold();

        let output = match input.image() {
            DynamicImage::ImageLuma8(src) => mask(src, threshold),
            DynamicImage::ImageLuma16(src) => mask(src, threshold),
            _ => None,
        }
        .ok_or_else(|| PipelineError::FormatMismatch {
            stage: self.name().to_string(),
            input: index,
            expected: SINGLE_BAND.to_vec(),
            actual: Some(input.attr()),
        })?;

        debug!(
            threshold,
            width = output.width(),
            height = output.height(),
            "Thresholded tile"
        );
        let data = MapData::new(DynamicImage::ImageLuma8(output), *input.request())?;
        Ok(StageOutput::new(data, ChangedArea::full(input.request())))
    }

    fn subscribe(&self, listener: Weak<dyn ChangeListener>) -> Option<Subscription> {
        Some(self.settings.subscribe(listener))
    }
}
