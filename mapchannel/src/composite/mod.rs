//! Composite stages: fold the outputs of one or more pipelines into the
//! image handed to the receiver.
//!
//! A channel calls [`CompositeStage::process`] once per pipeline per pass,
//! with the pipeline's position as the input index, and delivers the output
//! of the last call. Composites that keep a persistent output buffer write
//! into it copy-on-write, so images already delivered are never touched.

mod none;
mod rgb;
mod single;

pub use none::NoComposite;
pub use rgb::RgbComposite;
pub use single::SingleComposite;

use image::DynamicImage;

use crate::geo::GeoRequest;
use crate::pipeline::PipelineError;
use crate::raster::{ChangedArea, MapAttr, MapData};
use crate::stage::StageOutput;

/// Final stage shared by every pipeline of a channel.
pub trait CompositeStage: Send + Sync {
    /// Name for logging and error messages.
    fn name(&self) -> &str;

    /// Number of pipelines this composite can fold. Zero means the channel
    /// delivers the last stage's output directly.
    fn input_count(&self) -> usize;

    /// Display name of input `index`.
    fn input_name(&self, index: usize) -> Result<&str, PipelineError>;

    /// Formats accepted on input `index`.
    fn consumes(&self, index: usize) -> Result<&[MapAttr], PipelineError>;

    /// Output format, once it is known.
    fn produces(&self) -> Option<MapAttr>;

    /// Output format for a given input format.
    ///
    /// Deterministic: the same input format always yields the same output
    /// format, independent of call history.
    fn output_attr(&self, input: MapAttr) -> MapAttr;

    /// Fold one pipeline's output into the composite image.
    fn process(
        &self,
        index: usize,
        input: &MapData,
        changed: ChangedArea,
    ) -> Result<StageOutput, PipelineError>;

    /// Drop any persistent output buffer.
    fn reset(&self) {}
}

fn invalid_input(stage: &str, index: usize) -> PipelineError {
    PipelineError::InvalidInput {
        stage: stage.to_string(),
        index,
    }
}

/// Blank, fully transparent 8-bit buffer of `attr`'s alpha layout.
fn blank_buffer(attr: MapAttr, request: &GeoRequest) -> Result<MapData, PipelineError> {
    let (w, h) = (request.width_px(), request.height_px());
    let image = match attr.with_alpha() {
        MapAttr::GrayAlpha => DynamicImage::ImageLumaA8(image::GrayAlphaImage::new(w, h)),
        _ => DynamicImage::ImageRgba8(image::RgbaImage::new(w, h)),
    };
    MapData::new(image, *request)
}

/// Persistent composite output, reallocated when the request changes.
#[derive(Debug, Default)]
struct OutputBuffer {
    data: Option<MapData>,
}

impl OutputBuffer {
    /// Take the buffer for `request`, allocating a blank one if needed.
    fn take_for(&mut self, attr: MapAttr, request: &GeoRequest) -> Result<MapData, PipelineError> {
        match self.data.take() {
            Some(data) if data.request() == request && data.attr() == attr => Ok(data),
            _ => blank_buffer(attr, request),
        }
    }

    fn store(&mut self, data: &MapData) {
        self.data = Some(data.clone());
    }

    fn clear(&mut self) {
        self.data = None;
    }
}
