//! Single-input composite that manages an alpha channel.

use image::DynamicImage;
use parking_lot::Mutex;
use tracing::trace;

use super::{invalid_input, CompositeStage, OutputBuffer};
use crate::geo::PixelRect;
use crate::pipeline::PipelineError;
use crate::raster::{ChangedArea, MapAttr, MapData, DISPLAYABLE};
use crate::stage::{ensure_accepts, StageOutput};

#[derive(Debug, Default)]
struct SingleState {
    format: Option<MapAttr>,
    buffer: OutputBuffer,
}

/// Pass-through composite for one pipeline.
///
/// Inputs that already carry alpha are returned untouched. Otherwise the
/// input's color bands are copied into a persistent gray+alpha or RGBA
/// buffer and alpha is set opaque only inside the changed pixels, so areas
/// not refreshed by this pass keep whatever validity they had before.
///
/// The output format is fixed by the first input seen and reused after
/// that until [`CompositeStage::reset`].
#[derive(Debug, Default)]
pub struct SingleComposite {
    state: Mutex<SingleState>,
}

impl SingleComposite {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }
}

fn set_opaque<F: FnMut(u32, u32)>(rects: &[PixelRect], mut f: F) {
    for rect in rects {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                f(x, y);
            }
        }
    }
}

impl CompositeStage for SingleComposite {
    fn name(&self) -> &str {
        "single composite"
    }

    fn input_count(&self) -> usize {
        1
    }

    fn input_name(&self, index: usize) -> Result<&str, PipelineError> {
        match index {
            0 => Ok("layer"),
            _ => Err(invalid_input(self.name(), index)),
        }
    }

    fn consumes(&self, index: usize) -> Result<&[MapAttr], PipelineError> {
        match index {
            0 => Ok(DISPLAYABLE),
            _ => Err(invalid_input(self.name(), index)),
        }
    }

    fn produces(&self) -> Option<MapAttr> {
        self.state.lock().format
    }

    fn output_attr(&self, input: MapAttr) -> MapAttr {
        input.with_alpha()
    }

    fn process(
        &self,
        index: usize,
        input: &MapData,
        changed: ChangedArea,
    ) -> Result<StageOutput, PipelineError> {
        let accepted = self.consumes(index)?;
        ensure_accepts(self.name(), index, accepted, Some(input.attr()))?;

        let mut state = self.state.lock();
        let format = *state
            .format
            .get_or_insert_with(|| self.output_attr(input.attr()));

        if input.attr().has_alpha() {
            return Ok(StageOutput::new(input.clone(), changed));
        }

        let request = *input.request();
        let mut output = state.buffer.take_for(format, &request)?;
        let rects = changed.pixel_rects(&request);
        trace!(rects = rects.len(), format = %format, "Compositing single layer");

        match output.image_mut() {
            DynamicImage::ImageLumaA8(buf) => {
                let src = input.image().to_luma8();
                for (dst, s) in buf.pixels_mut().zip(src.pixels()) {
                    dst.0[0] = s.0[0];
                }
                set_opaque(&rects, |x, y| buf.get_pixel_mut(x, y).0[1] = u8::MAX);
            }
            DynamicImage::ImageRgba8(buf) => {
                let src = input.image().to_rgb8();
                for (dst, s) in buf.pixels_mut().zip(src.pixels()) {
                    dst.0[..3].copy_from_slice(&s.0);
                }
                set_opaque(&rects, |x, y| buf.get_pixel_mut(x, y).0[3] = u8::MAX);
            }
            other => {
                return Err(PipelineError::FormatMismatch {
                    stage: self.name().to_string(),
                    input: index,
                    expected: vec![format],
                    actual: Some(MapAttr::of_image(other)),
                })
            }
        }

        state.buffer.store(&output);
        Ok(StageOutput::new(output, changed))
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.format = None;
        state.buffer.clear();
    }
}
