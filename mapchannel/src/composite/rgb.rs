//! Three-band color composite.

use image::DynamicImage;
use parking_lot::Mutex;
use tracing::trace;

use super::{invalid_input, CompositeStage, OutputBuffer};
use crate::pipeline::PipelineError;
use crate::raster::{ChangedArea, MapAttr, MapData, SINGLE_BAND};
use crate::stage::{ensure_accepts, StageOutput};

const INPUT_NAMES: [&str; 3] = ["red", "green", "blue"];

/// Builds an RGBA image from up to three single-band pipelines.
///
/// Input 0 feeds red, 1 green and 2 blue. Each call writes its band into a
/// persistent buffer and marks the changed pixels opaque.
#[derive(Debug, Default)]
pub struct RgbComposite {
    buffer: Mutex<OutputBuffer>,
}

impl RgbComposite {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompositeStage for RgbComposite {
    fn name(&self) -> &str {
        "rgb composite"
    }

    fn input_count(&self) -> usize {
        INPUT_NAMES.len()
    }

    fn input_name(&self, index: usize) -> Result<&str, PipelineError> {
        INPUT_NAMES
            .get(index)
            .copied()
            .ok_or_else(|| invalid_input(self.name(), index))
    }

    fn consumes(&self, index: usize) -> Result<&[MapAttr], PipelineError> {
        if index < self.input_count() {
            Ok(SINGLE_BAND)
        } else {
            Err(invalid_input(self.name(), index))
        }
    }

    fn produces(&self) -> Option<MapAttr> {
        Some(MapAttr::ColorAlpha)
    }

    fn output_attr(&self, _input: MapAttr) -> MapAttr {
        MapAttr::ColorAlpha
    }

    fn process(
        &self,
        index: usize,
        input: &MapData,
        changed: ChangedArea,
    ) -> Result<StageOutput, PipelineError> {
        let accepted = self.consumes(index)?;
        ensure_accepts(self.name(), index, accepted, Some(input.attr()))?;

        let request = *input.request();
        let mut buffer = self.buffer.lock();
        let mut output = buffer.take_for(MapAttr::ColorAlpha, &request)?;
        let band = input.image().to_luma8();
        let rects = changed.pixel_rects(&request);
        trace!(band = INPUT_NAMES[index], rects = rects.len(), "Compositing band");

        if let DynamicImage::ImageRgba8(buf) = output.image_mut() {
            for (dst, s) in buf.pixels_mut().zip(band.pixels()) {
                dst.0[index] = s.0[0];
            }
            for rect in &rects {
                for y in rect.y..rect.bottom() {
                    for x in rect.x..rect.right() {
                        buf.get_pixel_mut(x, y).0[3] = u8::MAX;
                    }
                }
            }
        }

        buffer.store(&output);
        Ok(StageOutput::new(output, changed))
    }

    fn reset(&self) {
        self.buffer.lock().clear();
    }
}
